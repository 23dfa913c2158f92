//! Storage backends
//!
//! Two seams separate the engine from the database:
//!
//! - [`Catalog`] persists content type metadata and the structural change log.
//! - [`StorageEngine`] owns the physical content tables: DDL for the table
//!   synthesizer and parameterized DML for the record store.
//!
//! Both are implemented for PostgreSQL ([`postgres`]) and in process
//! ([`memory`]). Identifiers reaching either seam are the validated
//! newtypes from [`crate::registry`]; raw strings never do.

mod locks;
pub mod memory;
pub mod postgres;

pub use locks::{RecordGuard, StorageLocks, StructuralGuard};

use crate::content::{FieldValues, Predicate, Record};
use crate::error::Result;
use crate::registry::{ApiId, ContentStatus, ContentType, FieldName, NewContentType, StorageName};
use crate::schema::{ColumnSpec, TableSpec};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Kinds of structural change recorded in the change log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    StorageCreated,
    StorageMigrated,
    StorageDropped,
}

impl ChangeKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "storage_created" => Some(ChangeKind::StorageCreated),
            "storage_migrated" => Some(ChangeKind::StorageMigrated),
            "storage_dropped" => Some(ChangeKind::StorageDropped),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::StorageCreated => write!(f, "storage_created"),
            ChangeKind::StorageMigrated => write!(f, "storage_migrated"),
            ChangeKind::StorageDropped => write!(f, "storage_dropped"),
        }
    }
}

/// Change log entry about to be written
#[derive(Debug, Clone)]
pub struct NewStorageChange {
    pub api_id: ApiId,
    pub kind: ChangeKind,
    /// Checksum of the field set after the change; `None` once dropped
    pub schema_checksum: Option<String>,
    pub details: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    pub id: i64,
    pub api_id: ApiId,
    pub kind: ChangeKind,
    pub schema_checksum: Option<String>,
    pub details: Option<JsonValue>,
    pub recorded_at: DateTime<Utc>,
}

/// Content type metadata store
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Persist a new content type in `Pending` state.
    /// A duplicate apiId fails with `Conflict`.
    async fn insert(&self, content_type: &NewContentType, schema_checksum: &str) -> Result<ContentType>;

    async fn get(&self, id: i64) -> Result<Option<ContentType>>;

    async fn get_by_api_id(&self, api_id: &ApiId) -> Result<Option<ContentType>>;

    /// All content types ordered by id
    async fn list(&self) -> Result<Vec<ContentType>>;

    /// Overwrite display metadata, fields, checksum and status; bumps `updated_at`
    async fn save(&self, content_type: &ContentType) -> Result<ContentType>;

    async fn set_status(&self, id: i64, status: ContentStatus) -> Result<()>;

    /// Returns false when nothing was deleted
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn record_change(&self, change: &NewStorageChange) -> Result<()>;

    /// Change log of one apiId, oldest first
    async fn changes(&self, api_id: &ApiId) -> Result<Vec<StorageChange>>;
}

/// Physical content tables
///
/// DML against a table that does not exist fails with a `NotFound` for the
/// storage (see [`crate::error::ContentError::storage_missing`]), never with a
/// storage failure.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> bool;

    async fn table_exists(&self, table: &StorageName) -> Result<bool>;

    /// Create the table. An existing table is a `Conflict`, never replaced.
    async fn create_table(&self, table: &TableSpec) -> Result<()>;

    /// Add and drop columns as one structural change
    async fn alter_table(
        &self,
        table: &StorageName,
        add: &[ColumnSpec],
        drop: &[FieldName],
    ) -> Result<()>;

    /// Drop the table if it exists
    async fn drop_table(&self, table: &StorageName) -> Result<()>;

    async fn insert(&self, table: &TableSpec, values: &FieldValues) -> Result<Record>;

    /// Rows matching `predicate`, ordered by id
    async fn select(&self, table: &TableSpec, predicate: &Predicate) -> Result<Vec<Record>>;

    async fn select_by_id(&self, table: &TableSpec, id: i64) -> Result<Option<Record>>;

    /// Overwrite the given columns only; `None` when the row does not exist
    async fn update(&self, table: &TableSpec, id: i64, values: &FieldValues) -> Result<Option<Record>>;

    /// Returns false when the row does not exist
    async fn delete(&self, table: &TableSpec, id: i64) -> Result<bool>;
}
