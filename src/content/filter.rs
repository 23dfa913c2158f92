//! Filter translation
//!
//! Turns a `{fieldName: value}` map into an equality [`Predicate`] checked
//! against the content type. Keys that are not fields of the content type
//! are rejected rather than ignored.

use crate::content::value::FieldValue;
use crate::error::{ContentError, Result};
use crate::registry::{ContentType, FieldName};
use serde_json::{Map, Value};

/// One `column = value` constraint. A `Null` value means `IS NULL`.
#[derive(Debug, Clone, PartialEq)]
pub struct Equality {
    pub field: FieldName,
    pub value: FieldValue,
}

/// Conjunction of equality constraints; empty matches every row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    pub clauses: Vec<Equality>,
}

impl Predicate {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluate against in-memory values
    pub fn matches<'a>(&self, lookup: impl Fn(&str) -> Option<&'a FieldValue>) -> bool {
        self.clauses.iter().all(|clause| {
            let current = lookup(clause.field.as_str()).unwrap_or(&FieldValue::Null);
            current == &clause.value
        })
    }
}

pub struct FilterTranslator;

impl FilterTranslator {
    pub fn new() -> Self {
        Self
    }

    pub fn translate(
        &self,
        content_type: &ContentType,
        filters: Option<&Map<String, Value>>,
    ) -> Result<Predicate> {
        let filters = match filters {
            Some(f) if !f.is_empty() => f,
            _ => return Ok(Predicate::all()),
        };

        let mut clauses = Vec::with_capacity(filters.len());

        for (key, value) in filters {
            let field = content_type.field(key).ok_or_else(|| {
                ContentError::invalid_schema(format!(
                    "Cannot filter on unknown field '{}' of content type '{}'",
                    key, content_type.api_id
                ))
            })?;

            let value = if value.is_null() {
                FieldValue::Null
            } else {
                FieldValue::coerce(field, value)?
            };

            clauses.push(Equality {
                field: field.field_name.clone(),
                value,
            });
        }

        // Stable order keeps generated SQL deterministic
        clauses.sort_by(|a, b| a.field.cmp(&b.field));

        Ok(Predicate { clauses })
    }
}

impl Default for FilterTranslator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ApiId, ContentStatus, FieldDefinition, FieldType};
    use chrono::Utc;
    use serde_json::json;

    fn author() -> ContentType {
        let field = |name: &str, field_type: FieldType, required: bool| FieldDefinition {
            name: name.to_string(),
            field_name: FieldName::parse(name).unwrap(),
            field_type,
            required,
            unique: false,
            target_content_type: None,
            relation_type: None,
        };

        ContentType {
            id: 1,
            name: "Author".to_string(),
            plural_name: "Authors".to_string(),
            api_id: ApiId::parse("author").unwrap(),
            description: None,
            fields: vec![
                field("name", FieldType::ShortText, true),
                field("active", FieldType::Boolean, false),
            ],
            status: ContentStatus::Active,
            schema_checksum: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let translator = FilterTranslator::new();
        let ct = author();

        assert!(translator.translate(&ct, None).unwrap().is_empty());
        assert!(translator.translate(&ct, Some(&Map::new())).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let translator = FilterTranslator::new();
        let filters = json!({"name": "Jane", "nickname": "JJ"});

        let err = translator
            .translate(&author(), filters.as_object())
            .unwrap_err();
        assert!(matches!(err, ContentError::InvalidSchema { .. }));
        assert!(err.to_string().contains("nickname"));
    }

    #[test]
    fn test_clauses_are_typed_and_ordered() {
        let translator = FilterTranslator::new();
        let filters = json!({"name": "Jane", "active": true});

        let predicate = translator.translate(&author(), filters.as_object()).unwrap();
        assert_eq!(predicate.clauses.len(), 2);
        assert_eq!(predicate.clauses[0].field.as_str(), "active");
        assert_eq!(predicate.clauses[0].value, FieldValue::Boolean(true));
        assert_eq!(predicate.clauses[1].value, FieldValue::Text("Jane".to_string()));
    }

    #[test]
    fn test_null_filter_on_required_field() {
        // Filtering is not writing: matching null is allowed even for required fields
        let translator = FilterTranslator::new();
        let filters = json!({"name": null});
        let predicate = translator.translate(&author(), filters.as_object()).unwrap();
        assert_eq!(predicate.clauses[0].value, FieldValue::Null);
    }

    #[test]
    fn test_mistyped_filter_value_rejected() {
        let translator = FilterTranslator::new();
        let filters = json!({"active": "yes"});
        assert!(translator.translate(&author(), filters.as_object()).is_err());
    }

    #[test]
    fn test_predicate_matches() {
        let translator = FilterTranslator::new();
        let filters = json!({"name": "Jane"});
        let predicate = translator.translate(&author(), filters.as_object()).unwrap();

        let jane = FieldValue::Text("Jane".to_string());
        let john = FieldValue::Text("John".to_string());
        assert!(predicate.matches(|_| Some(&jane)));
        assert!(!predicate.matches(|_| Some(&john)));
        assert!(!predicate.matches(|_| None));
    }
}
