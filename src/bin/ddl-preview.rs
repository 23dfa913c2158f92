//! CLI tool to preview the DDL for a content type definition
//!
//! Usage:
//!   ddl-preview author.json
//!   ddl-preview author.json author-v2.json
//!
//! With one file the CREATE TABLE statement is printed. With two files the
//! field-set diff between them is classified and the ALTER TABLE statement
//! is printed when the change can be applied.

use anyhow::Context;
use apiforge_content::registry::{ContentTypeInput, NewContentType};
use apiforge_content::schema::{FieldSetDiff, TableSpec};
use apiforge_content::storage::postgres::sql;
use std::env;
use std::fs;

fn load(path: &str) -> anyhow::Result<NewContentType> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let input: ContentTypeInput =
        serde_json::from_str(&content).with_context(|| format!("Invalid content type JSON in {}", path))?;
    Ok(input.validate()?)
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.len() {
        2 => {
            let content_type = load(&args[1])?;
            let table = TableSpec::new(&content_type.api_id, &content_type.fields);

            println!("-- {} ({})", content_type.name, content_type.api_id);
            for column in &table.columns {
                println!("--   {:<24} {}", column.name.as_str(), column.column_type.sql());
            }
            println!("{};", sql::create_table(&table));
        }
        3 => {
            let current = load(&args[1])?;
            let proposed = load(&args[2])?;
            if current.api_id != proposed.api_id {
                anyhow::bail!(
                    "apiId cannot change ({} -> {})",
                    current.api_id,
                    proposed.api_id
                );
            }

            let diff = FieldSetDiff::compute(&current.fields, &proposed.fields);
            println!("{}", serde_json::to_string_pretty(&diff)?);

            if !diff.incompatible_changes.is_empty() {
                eprintln!("Result: INCOMPATIBLE");
                eprintln!("  {}", diff.incompatible_summary());
                std::process::exit(2);
            }
            if diff.is_safe() {
                eprintln!("Result: SAFE");
            } else {
                eprintln!("Result: DATALOSS (requires allowDestructive)");
                eprintln!("  {}", diff.dataloss_summary());
            }

            let table = TableSpec::new(&proposed.api_id, &proposed.fields);
            match sql::alter_table(&table.name, &diff.added_columns, &diff.removed_columns) {
                Some(statement) => println!("{};", statement),
                None => println!("-- no storage change"),
            }
        }
        _ => {
            eprintln!("Usage:");
            eprintln!("  {} <definition.json>                  - Print CREATE TABLE", args[0]);
            eprintln!("  {} <current.json> <proposed.json>     - Print migration", args[0]);
            std::process::exit(1);
        }
    }

    Ok(())
}
