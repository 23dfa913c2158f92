//! Field type to PostgreSQL column mapping
//!
//! The mapping is part of the on-disk contract:
//!
//! | Field type  | Column          |
//! |-------------|-----------------|
//! | SHORT_TEXT  | VARCHAR(255)    |
//! | LONG_TEXT   | TEXT            |
//! | NUMBER      | NUMERIC         |
//! | BOOLEAN     | BOOLEAN         |
//! | DATE        | TIMESTAMPTZ     |
//! | MEDIA       | BIGINT          |
//! | RELATION    | BIGINT          |
//!
//! Changing the type of an existing field is never applied in place.

use crate::registry::{quote_ident, ApiId, ContentType, FieldDefinition, FieldName, FieldType, StorageName};
use serde::Serialize;

/// Maximum length of a SHORT_TEXT value
pub const SHORT_TEXT_MAX_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnType {
    VarChar(usize),
    Text,
    Numeric,
    Boolean,
    TimestampTz,
    BigInt,
}

impl ColumnType {
    pub fn for_field(field_type: FieldType) -> Self {
        match field_type {
            FieldType::ShortText => ColumnType::VarChar(SHORT_TEXT_MAX_LEN),
            FieldType::LongText => ColumnType::Text,
            FieldType::Number => ColumnType::Numeric,
            FieldType::Boolean => ColumnType::Boolean,
            FieldType::Date => ColumnType::TimestampTz,
            FieldType::Media | FieldType::Relation => ColumnType::BigInt,
        }
    }

    /// DDL spelling of the column type
    pub fn sql(&self) -> String {
        match self {
            ColumnType::VarChar(len) => format!("VARCHAR({})", len),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Numeric => "NUMERIC".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::TimestampTz => "TIMESTAMPTZ".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
        }
    }

    /// Type used when binding parameters and reading values back.
    /// NUMERIC travels in its text form so no digits are lost on the way.
    pub fn wire_sql(&self) -> &'static str {
        match self {
            ColumnType::VarChar(_) | ColumnType::Text | ColumnType::Numeric => "TEXT",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::TimestampTz => "TIMESTAMPTZ",
            ColumnType::BigInt => "BIGINT",
        }
    }

    /// Cast applied to a bound parameter before it meets the column
    pub fn placeholder_cast(&self) -> &'static str {
        match self {
            ColumnType::Numeric => "TEXT::NUMERIC",
            other => other.wire_sql(),
        }
    }
}

/// Physical description of one content column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSpec {
    pub name: FieldName,
    pub column_type: ColumnType,
    pub not_null: bool,
    pub unique: bool,
}

impl ColumnSpec {
    /// Column as materialized by `CREATE TABLE`
    pub fn from_field(field: &FieldDefinition) -> Self {
        Self {
            name: field.field_name.clone(),
            column_type: ColumnType::for_field(field.field_type),
            not_null: field.required,
            unique: field.unique,
        }
    }

    /// Column as added to an existing table: always nullable, since existing
    /// rows have no value for it
    pub fn additive(field: &FieldDefinition) -> Self {
        Self {
            not_null: false,
            ..Self::from_field(field)
        }
    }

    pub fn definition_sql(&self) -> String {
        let mut sql = format!(
            "{} {}",
            quote_ident(self.name.as_str()),
            self.column_type.sql()
        );
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        sql
    }
}

/// Physical layout of a content table: the system columns plus one column per field
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    pub api_id: ApiId,
    pub name: StorageName,
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    pub fn new(api_id: &ApiId, fields: &[FieldDefinition]) -> Self {
        Self {
            api_id: api_id.clone(),
            name: api_id.storage_name(),
            columns: fields.iter().map(ColumnSpec::from_field).collect(),
        }
    }

    pub fn for_content_type(content_type: &ContentType) -> Self {
        Self::new(&content_type.api_id, &content_type.fields)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name.as_str() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mapping_table() {
        assert_eq!(ColumnType::for_field(FieldType::ShortText).sql(), "VARCHAR(255)");
        assert_eq!(ColumnType::for_field(FieldType::LongText).sql(), "TEXT");
        assert_eq!(ColumnType::for_field(FieldType::Number).sql(), "NUMERIC");
        assert_eq!(ColumnType::for_field(FieldType::Boolean).sql(), "BOOLEAN");
        assert_eq!(ColumnType::for_field(FieldType::Date).sql(), "TIMESTAMPTZ");
        assert_eq!(ColumnType::for_field(FieldType::Media).sql(), "BIGINT");
        assert_eq!(ColumnType::for_field(FieldType::Relation).sql(), "BIGINT");
    }

    #[test]
    fn test_column_definition_sql() {
        let field = FieldDefinition {
            name: "Email".to_string(),
            field_name: FieldName::parse("email").unwrap(),
            field_type: FieldType::ShortText,
            required: true,
            unique: true,
            target_content_type: None,
            relation_type: None,
        };

        assert_eq!(
            ColumnSpec::from_field(&field).definition_sql(),
            "\"email\" VARCHAR(255) NOT NULL UNIQUE"
        );
        assert_eq!(
            ColumnSpec::additive(&field).definition_sql(),
            "\"email\" VARCHAR(255) UNIQUE"
        );
    }
}
