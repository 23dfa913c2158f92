//! Dynamic record store
//!
//! Generic CRUD over a content table described by a [`TableSpec`]. The table
//! only carries validated identifiers, and values travel as typed
//! [`FieldValue`](crate::content::FieldValue)s that the engine binds as
//! parameters.

use crate::content::filter::Predicate;
use crate::content::value::{FieldValues, Record};
use crate::error::{ContentError, Result};
use crate::schema::TableSpec;
use crate::storage::StorageEngine;
use std::sync::Arc;
use tracing::debug;

pub struct RecordStore {
    engine: Arc<dyn StorageEngine>,
}

impl RecordStore {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self { engine }
    }

    /// Storage vanishing underneath a record operation means the content type is gone
    fn missing_storage(table: &TableSpec) -> impl Fn(ContentError) -> ContentError + '_ {
        move |e| {
            if e.is_storage_missing() {
                ContentError::content_type_not_found(table.api_id.as_str())
            } else {
                e
            }
        }
    }

    pub async fn insert(&self, table: &TableSpec, values: &FieldValues) -> Result<Record> {
        let record = self
            .engine
            .insert(table, values)
            .await
            .map_err(Self::missing_storage(table))?;
        debug!("Inserted record {} into {}", record.id, table.name);
        Ok(record)
    }

    pub async fn find_all(&self, table: &TableSpec) -> Result<Vec<Record>> {
        self.find_where(table, &Predicate::all()).await
    }

    pub async fn find_where(&self, table: &TableSpec, predicate: &Predicate) -> Result<Vec<Record>> {
        self.engine
            .select(table, predicate)
            .await
            .map_err(Self::missing_storage(table))
    }

    pub async fn find_by_id(&self, table: &TableSpec, id: i64) -> Result<Record> {
        self.engine
            .select_by_id(table, id)
            .await
            .map_err(Self::missing_storage(table))?
            .ok_or_else(|| record_not_found(table, id))
    }

    /// Merge `values` into the record; absent fields keep their value
    pub async fn update(&self, table: &TableSpec, id: i64, values: &FieldValues) -> Result<Record> {
        self.engine
            .update(table, id, values)
            .await
            .map_err(Self::missing_storage(table))?
            .ok_or_else(|| record_not_found(table, id))
    }

    pub async fn delete(&self, table: &TableSpec, id: i64) -> Result<()> {
        let deleted = self
            .engine
            .delete(table, id)
            .await
            .map_err(Self::missing_storage(table))?;

        if !deleted {
            return Err(record_not_found(table, id));
        }
        debug!("Deleted record {} from {}", id, table.name);
        Ok(())
    }
}

fn record_not_found(table: &TableSpec, id: i64) -> ContentError {
    ContentError::record_not_found(format!("{}/{}", table.api_id, id))
}
