//! SQL rendering for content tables
//!
//! Structural parts of every statement (table and column names) come from
//! validated identifiers and are always double-quoted. Data values are never
//! rendered: they are returned as [`Param`]s and bound positionally, each
//! placeholder cast to the wire type of its column.

use crate::content::{FieldValue, FieldValues, Predicate};
use crate::registry::{quote_ident, FieldName, StorageName};
use crate::schema::{ColumnSpec, ColumnType, TableSpec};

/// A positional parameter of a rendered statement
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Value(FieldValue, ColumnType),
    Id(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Param>,
}

pub fn create_table(table: &TableSpec) -> String {
    let mut columns = vec!["\"id\" BIGSERIAL PRIMARY KEY".to_string()];
    columns.extend(table.columns.iter().map(ColumnSpec::definition_sql));
    columns.push("\"created_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW()".to_string());
    columns.push("\"updated_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW()".to_string());

    format!(
        "CREATE TABLE {} (\n    {}\n)",
        quote_ident(table.name.as_str()),
        columns.join(",\n    ")
    )
}

pub fn alter_table(table: &StorageName, add: &[ColumnSpec], drop: &[FieldName]) -> Option<String> {
    let actions: Vec<String> = drop
        .iter()
        .map(|name| format!("DROP COLUMN {}", quote_ident(name.as_str())))
        .chain(add.iter().map(|c| format!("ADD COLUMN {}", c.definition_sql())))
        .collect();

    if actions.is_empty() {
        return None;
    }

    Some(format!(
        "ALTER TABLE {} {}",
        quote_ident(table.as_str()),
        actions.join(", ")
    ))
}

pub fn drop_table(table: &StorageName) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(table.as_str()))
}

/// Output columns in record order. NUMERIC is read back as text.
pub fn select_list(table: &TableSpec) -> String {
    let mut columns = vec!["\"id\"".to_string()];
    for column in &table.columns {
        let ident = quote_ident(column.name.as_str());
        match column.column_type {
            ColumnType::Numeric => {
                columns.push(format!("{}::{} AS {}", ident, column.column_type.wire_sql(), ident))
            }
            _ => columns.push(ident),
        }
    }
    columns.push("\"created_at\"".to_string());
    columns.push("\"updated_at\"".to_string());
    columns.join(", ")
}

/// Text form of a NUMBER value as bound to a NUMERIC column.
/// `f64`'s `Display` is the shortest string that parses back to the same value.
pub fn numeric_text(value: f64) -> String {
    value.to_string()
}

fn column_type(table: &TableSpec, name: &FieldName) -> ColumnType {
    table
        .column(name.as_str())
        .map(|c| c.column_type)
        .unwrap_or(ColumnType::Text)
}

fn placeholder(index: usize, column_type: ColumnType) -> String {
    format!("${}::{}", index, column_type.placeholder_cast())
}

pub fn insert(table: &TableSpec, values: &FieldValues) -> Statement {
    let target = quote_ident(table.name.as_str());
    let returning = select_list(table);

    if values.is_empty() {
        return Statement {
            sql: format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", target, returning),
            params: Vec::new(),
        };
    }

    let mut columns = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    let mut params = Vec::with_capacity(values.len());

    for (i, (name, value)) in values.iter().enumerate() {
        let column_type = column_type(table, name);
        columns.push(quote_ident(name.as_str()));
        placeholders.push(placeholder(i + 1, column_type));
        params.push(Param::Value(value.clone(), column_type));
    }

    Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            target,
            columns.join(", "),
            placeholders.join(", "),
            returning
        ),
        params,
    }
}

pub fn select(table: &TableSpec, predicate: &Predicate) -> Statement {
    let mut sql = format!(
        "SELECT {} FROM {}",
        select_list(table),
        quote_ident(table.name.as_str())
    );
    let mut params = Vec::new();
    let mut conditions = Vec::with_capacity(predicate.clauses.len());

    for clause in &predicate.clauses {
        let ident = quote_ident(clause.field.as_str());
        if clause.value.is_null() {
            conditions.push(format!("{} IS NULL", ident));
        } else {
            let column_type = column_type(table, &clause.field);
            params.push(Param::Value(clause.value.clone(), column_type));
            conditions.push(format!("{} = {}", ident, placeholder(params.len(), column_type)));
        }
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY \"id\"");

    Statement { sql, params }
}

pub fn select_by_id(table: &TableSpec, id: i64) -> Statement {
    Statement {
        sql: format!(
            "SELECT {} FROM {} WHERE \"id\" = $1",
            select_list(table),
            quote_ident(table.name.as_str())
        ),
        params: vec![Param::Id(id)],
    }
}

pub fn update(table: &TableSpec, id: i64, values: &FieldValues) -> Statement {
    let mut assignments = Vec::with_capacity(values.len() + 1);
    let mut params = Vec::with_capacity(values.len() + 1);

    for (name, value) in values {
        let column_type = column_type(table, name);
        params.push(Param::Value(value.clone(), column_type));
        assignments.push(format!(
            "{} = {}",
            quote_ident(name.as_str()),
            placeholder(params.len(), column_type)
        ));
    }
    assignments.push("\"updated_at\" = NOW()".to_string());
    params.push(Param::Id(id));

    Statement {
        sql: format!(
            "UPDATE {} SET {} WHERE \"id\" = ${} RETURNING {}",
            quote_ident(table.name.as_str()),
            assignments.join(", "),
            params.len(),
            select_list(table)
        ),
        params,
    }
}

pub fn delete(table: &TableSpec, id: i64) -> Statement {
    Statement {
        sql: format!(
            "DELETE FROM {} WHERE \"id\" = $1",
            quote_ident(table.name.as_str())
        ),
        params: vec![Param::Id(id)],
    }
}
