//! Content type metadata model
//!
//! `ContentTypeInput` / `FieldInput` / `ContentTypePatch` are the unvalidated
//! shapes accepted at the boundary. `ContentType` / `FieldDefinition` only
//! exist after [`FieldInput::validate`] and friends have run.

use crate::error::{ContentError, Result};
use crate::registry::identifier::{ApiId, FieldName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    ShortText,
    LongText,
    Number,
    Boolean,
    Date,
    Media,
    Relation,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::ShortText => "SHORT_TEXT",
            FieldType::LongText => "LONG_TEXT",
            FieldType::Number => "NUMBER",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Date => "DATE",
            FieldType::Media => "MEDIA",
            FieldType::Relation => "RELATION",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    #[serde(alias = "oneToOne")]
    OneToOne,
    #[serde(alias = "oneToMany")]
    OneToMany,
    #[serde(alias = "manyToMany")]
    ManyToMany,
}

/// Lifecycle of a content type's backing storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentStatus {
    /// Metadata persisted, storage not yet materialized
    Pending,
    Active,
    /// Storage drop in progress; record operations are refused
    Deleting,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Pending => "PENDING",
            ContentStatus::Active => "ACTIVE",
            ContentStatus::Deleting => "DELETING",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "PENDING" => Ok(ContentStatus::Pending),
            "ACTIVE" => Ok(ContentStatus::Active),
            "DELETING" => Ok(ContentStatus::Deleting),
            other => Err(ContentError::Internal(format!(
                "Unknown content type status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: String,
    pub field_name: FieldName,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub unique: bool,
    pub target_content_type: Option<ApiId>,
    pub relation_type: Option<RelationType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentType {
    pub id: i64,
    pub name: String,
    pub plural_name: String,
    pub api_id: ApiId,
    pub description: Option<String>,
    pub fields: Vec<FieldDefinition>,
    pub status: ContentStatus,
    pub schema_checksum: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentType {
    pub fn field(&self, field_name: &str) -> Option<&FieldDefinition> {
        self.fields
            .iter()
            .find(|f| f.field_name.as_str() == field_name)
    }

    pub fn is_active(&self) -> bool {
        self.status == ContentStatus::Active
    }
}

/// Validated content type that has not been persisted yet
#[derive(Debug, Clone)]
pub struct NewContentType {
    pub name: String,
    pub plural_name: String,
    pub api_id: ApiId,
    pub description: Option<String>,
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInput {
    pub name: String,
    pub field_name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub unique: Option<bool>,
    #[serde(default)]
    pub target_content_type: Option<String>,
    #[serde(default)]
    pub relation_type: Option<RelationType>,
}

impl FieldInput {
    pub fn validate(&self) -> Result<FieldDefinition> {
        let field_name = FieldName::parse(&self.field_name)?;

        if self.name.trim().is_empty() {
            return Err(ContentError::invalid_schema(format!(
                "Field '{}' must have a display name",
                field_name
            )));
        }

        let (target_content_type, relation_type) = match self.field_type {
            FieldType::Relation => {
                let target = self.target_content_type.as_deref().ok_or_else(|| {
                    ContentError::invalid_schema(format!(
                        "Relation field '{}' requires targetContentType",
                        field_name
                    ))
                })?;
                let relation_type = self.relation_type.ok_or_else(|| {
                    ContentError::invalid_schema(format!(
                        "Relation field '{}' requires relationType",
                        field_name
                    ))
                })?;
                (Some(ApiId::parse(target)?), Some(relation_type))
            }
            _ => {
                if self.target_content_type.is_some() || self.relation_type.is_some() {
                    return Err(ContentError::invalid_schema(format!(
                        "Field '{}' of type {} cannot declare a relation",
                        field_name, self.field_type
                    )));
                }
                (None, None)
            }
        };

        Ok(FieldDefinition {
            name: self.name.trim().to_string(),
            field_name,
            field_type: self.field_type,
            required: self.required.unwrap_or(false),
            unique: self.unique.unwrap_or(false),
            target_content_type,
            relation_type,
        })
    }
}

/// Validate a field list: every identifier is safe and field names are unique
pub fn validate_fields(inputs: &[FieldInput]) -> Result<Vec<FieldDefinition>> {
    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(inputs.len());

    for input in inputs {
        let field = input.validate()?;
        // Case-only differences count as duplicates
        if !seen.insert(field.field_name.as_str().to_ascii_lowercase()) {
            return Err(ContentError::invalid_schema(format!(
                "Duplicate fieldName '{}'",
                field.field_name
            )));
        }
        fields.push(field);
    }

    Ok(fields)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTypeInput {
    pub name: String,
    #[serde(default)]
    pub plural_name: Option<String>,
    pub api_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldInput>,
}

impl ContentTypeInput {
    pub fn validate(&self) -> Result<NewContentType> {
        let api_id = ApiId::parse(&self.api_id)?;

        let name = self.name.trim();
        if name.is_empty() {
            return Err(ContentError::invalid_schema("name must not be empty"));
        }

        let plural_name = match self.plural_name.as_deref().map(str::trim) {
            Some(plural) if !plural.is_empty() => plural.to_string(),
            _ => format!("{}s", name),
        };

        Ok(NewContentType {
            name: name.to_string(),
            plural_name,
            api_id,
            description: self.description.clone(),
            fields: validate_fields(&self.fields)?,
        })
    }
}

/// Partial update. Absent members keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTypePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub plural_name: Option<String>,
    #[serde(default)]
    pub api_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Option<Vec<FieldInput>>,
    /// Confirms that removing fields (and their data) is intended
    #[serde(default)]
    pub allow_destructive: bool,
}

/// Fingerprint of a field list, recorded with every structural change
pub fn fields_checksum(fields: &[FieldDefinition]) -> String {
    let canonical = serde_json::to_vec(fields).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(field_name: &str, field_type: FieldType) -> FieldInput {
        FieldInput {
            name: field_name.to_string(),
            field_name: field_name.to_string(),
            field_type,
            required: None,
            unique: None,
            target_content_type: None,
            relation_type: None,
        }
    }

    #[test]
    fn test_plural_name_defaults() {
        let input = ContentTypeInput {
            name: "Author".to_string(),
            plural_name: None,
            api_id: "author".to_string(),
            description: None,
            fields: vec![field("name", FieldType::ShortText)],
        };

        let validated = input.validate().unwrap();
        assert_eq!(validated.plural_name, "Authors");
        assert_eq!(validated.fields.len(), 1);
        assert!(!validated.fields[0].required);
    }

    #[test]
    fn test_duplicate_field_names_rejected() {
        let fields = vec![field("name", FieldType::ShortText), field("Name", FieldType::LongText)];
        let err = validate_fields(&fields).unwrap_err();
        assert!(matches!(err, ContentError::InvalidSchema { .. }));
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_relation_requires_target() {
        let mut relation = field("author", FieldType::Relation);
        assert!(relation.validate().is_err());

        relation.target_content_type = Some("author".to_string());
        relation.relation_type = Some(RelationType::OneToMany);
        let def = relation.validate().unwrap();
        assert_eq!(def.target_content_type.unwrap().as_str(), "author");

        let mut plain = field("title", FieldType::ShortText);
        plain.relation_type = Some(RelationType::OneToOne);
        assert!(plain.validate().is_err());
    }

    #[test]
    fn test_field_input_wire_format() {
        let json = r#"{
            "name": "Avatar",
            "fieldName": "avatar",
            "type": "MEDIA",
            "required": false,
            "unique": false,
            "targetContentType": null,
            "relationType": null
        }"#;
        let input: FieldInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.field_type, FieldType::Media);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_checksum_tracks_field_order() {
        let a = validate_fields(&[field("a", FieldType::Number), field("b", FieldType::Boolean)]).unwrap();
        let b = validate_fields(&[field("b", FieldType::Boolean), field("a", FieldType::Number)]).unwrap();
        assert_eq!(fields_checksum(&a), fields_checksum(&a.clone()));
        assert_ne!(fields_checksum(&a), fields_checksum(&b));
        assert_eq!(fields_checksum(&a).len(), 64);
    }
}
