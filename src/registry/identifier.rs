//! Validated identifiers
//!
//! `ApiId` and `FieldName` can only be built through [`validate_identifier`],
//! so everything that reaches the storage layer has already been checked.
//! `StorageName` is derived from an `ApiId` and is never parsed from input.

use crate::error::{ContentError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of every materialized content table: `ct_<apiId>`
pub const STORAGE_PREFIX: &str = "ct_";

/// PostgreSQL truncates identifiers longer than this
const MAX_IDENTIFIER_LEN: usize = 63;

/// Longest apiId that still yields a storage name within the identifier limit
pub const MAX_API_ID_LEN: usize = MAX_IDENTIFIER_LEN - STORAGE_PREFIX.len();

/// Columns every content table carries; fields may not reuse them
pub const RESERVED_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];

fn validate_identifier(kind: &str, value: &str, max_len: usize) -> Result<()> {
    if value.is_empty() {
        return Err(ContentError::invalid_schema(format!("{} must not be empty", kind)));
    }

    if value.len() > max_len {
        return Err(ContentError::invalid_schema(format!(
            "{} '{}' is longer than {} characters",
            kind, value, max_len
        )));
    }

    let mut chars = value.chars();
    let first = chars.next().unwrap_or('0');
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(ContentError::invalid_schema(format!(
            "{} '{}' must start with a letter or underscore",
            kind, value
        )));
    }

    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ContentError::invalid_schema(format!(
            "{} '{}' may only contain letters, digits and underscores",
            kind, value
        )));
    }

    Ok(())
}

/// Slug naming a content type and its physical storage
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiId(String);

impl ApiId {
    pub fn parse(value: &str) -> Result<Self> {
        validate_identifier("apiId", value, MAX_API_ID_LEN)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn storage_name(&self) -> StorageName {
        StorageName(format!("{}{}", STORAGE_PREFIX, self.0))
    }
}

impl TryFrom<String> for ApiId {
    type Error = ContentError;

    fn try_from(value: String) -> Result<Self> {
        validate_identifier("apiId", &value, MAX_API_ID_LEN)?;
        Ok(Self(value))
    }
}

impl From<ApiId> for String {
    fn from(value: ApiId) -> Self {
        value.0
    }
}

impl fmt::Display for ApiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Physical column identifier of a field
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldName(String);

impl FieldName {
    pub fn parse(value: &str) -> Result<Self> {
        Self::try_from(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FieldName {
    type Error = ContentError;

    fn try_from(value: String) -> Result<Self> {
        validate_identifier("fieldName", &value, MAX_IDENTIFIER_LEN)?;

        if RESERVED_COLUMNS.contains(&value.to_ascii_lowercase().as_str()) {
            return Err(ContentError::invalid_schema(format!(
                "fieldName '{}' is reserved",
                value
            )));
        }

        Ok(Self(value))
    }
}

impl From<FieldName> for String {
    fn from(value: FieldName) -> Self {
        value.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of the physical table backing a content type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageName(String);

impl StorageName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Render an already validated identifier for SQL
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident)
}
