//! Content orchestrator
//!
//! Every record operation follows the same path:
//! 1. Take the apiId's shared lock (waits out structural changes)
//! 2. Resolve the content type; anything not ACTIVE is NotFound
//! 3. Validate the payload or filter against its fields
//! 4. Dispatch to the record store using the derived table

use crate::content::filter::FilterTranslator;
use crate::content::lookup::ContentTypeLookup;
use crate::content::store::RecordStore;
use crate::content::value::{coerce_payload, Record, WriteMode};
use crate::error::{ContentError, Result};
use crate::registry::{ApiId, ContentType};
use crate::schema::TableSpec;
use crate::storage::{RecordGuard, StorageEngine, StorageLocks};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

pub struct ContentService {
    lookup: Arc<dyn ContentTypeLookup>,
    store: RecordStore,
    filters: FilterTranslator,
    locks: Arc<StorageLocks>,
}

/// A content type resolved for the duration of one record operation
struct Resolved {
    content_type: ContentType,
    table: TableSpec,
    _guard: RecordGuard,
}

impl ContentService {
    pub fn new(
        lookup: Arc<dyn ContentTypeLookup>,
        engine: Arc<dyn StorageEngine>,
        locks: Arc<StorageLocks>,
    ) -> Self {
        Self {
            lookup,
            store: RecordStore::new(engine),
            filters: FilterTranslator::new(),
            locks,
        }
    }

    pub fn lookup_source(&self) -> &'static str {
        self.lookup.source()
    }

    async fn resolve(&self, api_id: &str) -> Result<Resolved> {
        // No content type can carry a malformed apiId
        let api_id = ApiId::parse(api_id).map_err(|_| ContentError::content_type_not_found(api_id))?;

        let guard = self.locks.read(&api_id).await?;
        let content_type = match self.lookup.find(&api_id).await {
            Ok(content_type) => content_type,
            Err(e) => {
                drop(guard);
                if e.is_not_found() {
                    self.locks.discard_idle(&api_id);
                }
                return Err(e);
            }
        };

        if !content_type.is_active() {
            debug!(
                "Content type {} is {}, refusing record operation",
                api_id,
                content_type.status.as_str()
            );
            return Err(ContentError::content_type_not_found(api_id.as_str()));
        }

        Ok(Resolved {
            table: TableSpec::for_content_type(&content_type),
            content_type,
            _guard: guard,
        })
    }

    pub async fn create(&self, api_id: &str, payload: &Value) -> Result<Record> {
        let resolved = self.resolve(api_id).await?;
        let values = coerce_payload(&resolved.content_type, as_object(payload)?, WriteMode::Insert)?;
        self.store.insert(&resolved.table, &values).await
    }

    pub async fn find_all(&self, api_id: &str) -> Result<Vec<Record>> {
        let resolved = self.resolve(api_id).await?;
        self.store.find_all(&resolved.table).await
    }

    /// Equality search; an empty or absent filter returns everything
    pub async fn search(&self, api_id: &str, filters: Option<&Map<String, Value>>) -> Result<Vec<Record>> {
        let resolved = self.resolve(api_id).await?;
        let predicate = self.filters.translate(&resolved.content_type, filters)?;
        debug!(
            "Searching {} with {} equality clauses",
            resolved.table.name,
            predicate.clauses.len()
        );
        self.store.find_where(&resolved.table, &predicate).await
    }

    pub async fn find_by_id(&self, api_id: &str, id: i64) -> Result<Record> {
        let resolved = self.resolve(api_id).await?;
        self.store.find_by_id(&resolved.table, id).await
    }

    pub async fn update(&self, api_id: &str, id: i64, payload: &Value) -> Result<Record> {
        let resolved = self.resolve(api_id).await?;
        let values = coerce_payload(&resolved.content_type, as_object(payload)?, WriteMode::Merge)?;

        self.store.find_by_id(&resolved.table, id).await?;
        self.store.update(&resolved.table, id, &values).await
    }

    pub async fn delete(&self, api_id: &str, id: i64) -> Result<()> {
        let resolved = self.resolve(api_id).await?;

        self.store.find_by_id(&resolved.table, id).await?;
        self.store.delete(&resolved.table, id).await
    }
}

fn as_object(payload: &Value) -> Result<&Map<String, Value>> {
    payload.as_object().ok_or_else(|| ContentError::InvalidRequest {
        message: "Record payload must be a JSON object".to_string(),
    })
}
