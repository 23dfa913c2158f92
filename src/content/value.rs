//! Typed record values
//!
//! Incoming JSON is coerced into a [`FieldValue`] according to the declared
//! [`FieldType`] of the target field before anything reaches storage.

use crate::error::{ContentError, Result};
use crate::registry::{ContentType, FieldDefinition, FieldName, FieldType};
use crate::schema::SHORT_TEXT_MAX_LEN;
use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Number(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Reference(i64),
}

impl FieldValue {
    /// Coerce a JSON value into the representation of `field`
    pub fn coerce(field: &FieldDefinition, value: &Value) -> Result<Self> {
        if value.is_null() {
            if field.required {
                return Err(invalid_value(field, "is required and cannot be null"));
            }
            return Ok(FieldValue::Null);
        }

        match field.field_type {
            FieldType::ShortText => {
                let text = value
                    .as_str()
                    .ok_or_else(|| invalid_value(field, "expects a string"))?;
                if text.chars().count() > SHORT_TEXT_MAX_LEN {
                    return Err(invalid_value(
                        field,
                        &format!("is limited to {} characters", SHORT_TEXT_MAX_LEN),
                    ));
                }
                Ok(FieldValue::Text(text.to_string()))
            }
            FieldType::LongText => value
                .as_str()
                .map(|s| FieldValue::Text(s.to_string()))
                .ok_or_else(|| invalid_value(field, "expects a string")),
            FieldType::Number => value
                .as_f64()
                .map(FieldValue::Number)
                .ok_or_else(|| invalid_value(field, "expects a number")),
            FieldType::Boolean => value
                .as_bool()
                .map(FieldValue::Boolean)
                .ok_or_else(|| invalid_value(field, "expects a boolean")),
            FieldType::Date => {
                let text = value
                    .as_str()
                    .ok_or_else(|| invalid_value(field, "expects an RFC 3339 date string"))?;
                parse_timestamp(text)
                    .map(FieldValue::Timestamp)
                    .ok_or_else(|| invalid_value(field, "expects an RFC 3339 date string"))
            }
            FieldType::Media | FieldType::Relation => value
                .as_i64()
                .map(FieldValue::Reference)
                .ok_or_else(|| invalid_value(field, "expects an integer reference id")),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Timestamp(ts) => Value::String(ts.to_rfc3339()),
            FieldValue::Reference(id) => Value::Number((*id).into()),
        }
    }
}

fn invalid_value(field: &FieldDefinition, problem: &str) -> ContentError {
    ContentError::invalid_schema(format!(
        "Field '{}' ({}) {}",
        field.field_name, field.field_type, problem
    ))
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Column/value pairs ready to be written, in field declaration order
pub type FieldValues = Vec<(FieldName, FieldValue)>;

/// How a payload is checked against a content type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Every required field must be present
    Insert,
    /// Only the keys present are validated and written
    Merge,
}

/// Validate a JSON payload against the content type's fields.
///
/// Unknown keys are rejected. The result follows field declaration order.
pub fn coerce_payload(
    content_type: &ContentType,
    payload: &Map<String, Value>,
    mode: WriteMode,
) -> Result<FieldValues> {
    if let Some(unknown) = payload
        .keys()
        .find(|key| content_type.field(key).is_none())
    {
        return Err(ContentError::invalid_schema(format!(
            "Unknown field '{}' for content type '{}'",
            unknown, content_type.api_id
        )));
    }

    let mut values = Vec::with_capacity(payload.len());

    for field in &content_type.fields {
        match payload.get(field.field_name.as_str()) {
            Some(value) => {
                values.push((field.field_name.clone(), FieldValue::coerce(field, value)?));
            }
            None if mode == WriteMode::Insert && field.required => {
                return Err(ContentError::invalid_schema(format!(
                    "Missing required field '{}'",
                    field.field_name
                )));
            }
            None => {}
        }
    }

    Ok(values)
}

/// A stored row of a content table
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: i64,
    pub values: FieldValues,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    pub fn get(&self, field_name: &str) -> Option<&FieldValue> {
        self.values
            .iter()
            .find(|(name, _)| name.as_str() == field_name)
            .map(|(_, value)| value)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 3))?;
        map.serialize_entry("id", &self.id)?;
        for (name, value) in &self.values {
            map.serialize_entry(name.as_str(), &value.to_json())?;
        }
        map.serialize_entry("created_at", &self.created_at.to_rfc3339())?;
        map.serialize_entry("updated_at", &self.updated_at.to_rfc3339())?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ApiId, ContentStatus};
    use serde_json::json;

    fn def(field_name: &str, field_type: FieldType, required: bool) -> FieldDefinition {
        FieldDefinition {
            name: field_name.to_string(),
            field_name: FieldName::parse(field_name).unwrap(),
            field_type,
            required,
            unique: false,
            target_content_type: None,
            relation_type: None,
        }
    }

    fn author() -> ContentType {
        ContentType {
            id: 1,
            name: "Author".to_string(),
            plural_name: "Authors".to_string(),
            api_id: ApiId::parse("author").unwrap(),
            description: None,
            fields: vec![
                def("name", FieldType::ShortText, true),
                def("bio", FieldType::LongText, false),
                def("age", FieldType::Number, false),
                def("born", FieldType::Date, false),
                def("avatar", FieldType::Media, false),
            ],
            status: ContentStatus::Active,
            schema_checksum: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_coerce_by_type() {
        let number = def("age", FieldType::Number, false);
        assert_eq!(FieldValue::coerce(&number, &json!(42)).unwrap(), FieldValue::Number(42.0));
        assert!(FieldValue::coerce(&number, &json!("42")).is_err());

        let flag = def("published", FieldType::Boolean, false);
        assert_eq!(FieldValue::coerce(&flag, &json!(true)).unwrap(), FieldValue::Boolean(true));
        assert!(FieldValue::coerce(&flag, &json!(1)).is_err());

        let media = def("avatar", FieldType::Media, false);
        assert_eq!(FieldValue::coerce(&media, &json!(7)).unwrap(), FieldValue::Reference(7));
        assert!(FieldValue::coerce(&media, &json!(7.5)).is_err());
    }

    #[test]
    fn test_coerce_dates() {
        let born = def("born", FieldType::Date, false);

        let full = FieldValue::coerce(&born, &json!("2024-03-01T10:30:00+02:00")).unwrap();
        match full {
            FieldValue::Timestamp(ts) => assert_eq!(ts.to_rfc3339(), "2024-03-01T08:30:00+00:00"),
            other => panic!("unexpected value {:?}", other),
        }

        let day = FieldValue::coerce(&born, &json!("2024-03-01")).unwrap();
        assert!(matches!(day, FieldValue::Timestamp(_)));

        assert!(FieldValue::coerce(&born, &json!("yesterday")).is_err());
    }

    #[test]
    fn test_short_text_limit() {
        let title = def("title", FieldType::ShortText, false);
        assert!(FieldValue::coerce(&title, &json!("a".repeat(255))).is_ok());
        assert!(FieldValue::coerce(&title, &json!("a".repeat(256))).is_err());
    }

    #[test]
    fn test_required_null_rejected() {
        let name = def("name", FieldType::ShortText, true);
        assert!(FieldValue::coerce(&name, &Value::Null).is_err());

        let bio = def("bio", FieldType::LongText, false);
        assert_eq!(FieldValue::coerce(&bio, &Value::Null).unwrap(), FieldValue::Null);
    }

    #[test]
    fn test_coerce_payload_insert() {
        let ct = author();
        let payload = json!({"bio": "writer", "name": "Jane"});
        let values = coerce_payload(&ct, payload.as_object().unwrap(), WriteMode::Insert).unwrap();

        // Declaration order, not payload order
        assert_eq!(values[0].0.as_str(), "name");
        assert_eq!(values[1].0.as_str(), "bio");

        let missing = json!({"bio": "writer"});
        let err = coerce_payload(&ct, missing.as_object().unwrap(), WriteMode::Insert).unwrap_err();
        assert!(err.to_string().contains("Missing required field 'name'"));
    }

    #[test]
    fn test_coerce_payload_merge() {
        let ct = author();
        let payload = json!({"bio": "x"});
        let values = coerce_payload(&ct, payload.as_object().unwrap(), WriteMode::Merge).unwrap();
        assert_eq!(values.len(), 1);

        let unknown = json!({"nickname": "JJ"});
        let err = coerce_payload(&ct, unknown.as_object().unwrap(), WriteMode::Merge).unwrap_err();
        assert!(matches!(err, ContentError::InvalidSchema { .. }));
    }

    #[test]
    fn test_record_serialization() {
        let ts = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = Record {
            id: 3,
            values: vec![
                (FieldName::parse("name").unwrap(), FieldValue::Text("Jane".to_string())),
                (FieldName::parse("bio").unwrap(), FieldValue::Null),
            ],
            created_at: ts,
            updated_at: ts,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["name"], "Jane");
        assert!(json["bio"].is_null());
        assert_eq!(json["created_at"], "2024-01-01T00:00:00+00:00");
    }
}
