//! In-process catalog and storage engine
//!
//! Mirrors the PostgreSQL backend's observable behavior: apiId uniqueness,
//! `UNIQUE`/`NOT NULL` columns, loud failure on duplicate tables and
//! `NotFound` for DML against a dropped table. Used by the test suite and by
//! `STORAGE_BACKEND=memory`.

use crate::content::{FieldValue, FieldValues, Predicate, Record};
use crate::error::{ContentError, Result};
use crate::registry::{ApiId, ContentStatus, ContentType, FieldName, NewContentType, StorageName};
use crate::schema::{ColumnSpec, TableSpec};
use crate::storage::{Catalog, NewStorageChange, StorageChange, StorageEngine};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct CatalogState {
    next_id: i64,
    types: BTreeMap<i64, ContentType>,
    next_change_id: i64,
    changes: Vec<StorageChange>,
}

#[derive(Default)]
pub struct MemoryCatalog {
    state: RwLock<CatalogState>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn insert(&self, new: &NewContentType, schema_checksum: &str) -> Result<ContentType> {
        let mut state = self.state.write().await;

        if state.types.values().any(|ct| ct.api_id == new.api_id) {
            return Err(ContentError::conflict(format!(
                "Content type with apiId '{}' already exists",
                new.api_id
            )));
        }

        state.next_id += 1;
        let now = Utc::now();
        let content_type = ContentType {
            id: state.next_id,
            name: new.name.clone(),
            plural_name: new.plural_name.clone(),
            api_id: new.api_id.clone(),
            description: new.description.clone(),
            fields: new.fields.clone(),
            status: ContentStatus::Pending,
            schema_checksum: schema_checksum.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.types.insert(content_type.id, content_type.clone());

        Ok(content_type)
    }

    async fn get(&self, id: i64) -> Result<Option<ContentType>> {
        Ok(self.state.read().await.types.get(&id).cloned())
    }

    async fn get_by_api_id(&self, api_id: &ApiId) -> Result<Option<ContentType>> {
        let state = self.state.read().await;
        Ok(state.types.values().find(|ct| &ct.api_id == api_id).cloned())
    }

    async fn list(&self) -> Result<Vec<ContentType>> {
        Ok(self.state.read().await.types.values().cloned().collect())
    }

    async fn save(&self, content_type: &ContentType) -> Result<ContentType> {
        let mut state = self.state.write().await;
        let stored = state
            .types
            .get_mut(&content_type.id)
            .ok_or_else(|| ContentError::content_type_not_found(content_type.id.to_string()))?;

        stored.name = content_type.name.clone();
        stored.plural_name = content_type.plural_name.clone();
        stored.description = content_type.description.clone();
        stored.fields = content_type.fields.clone();
        stored.status = content_type.status;
        stored.schema_checksum = content_type.schema_checksum.clone();
        stored.updated_at = Utc::now();

        Ok(stored.clone())
    }

    async fn set_status(&self, id: i64, status: ContentStatus) -> Result<()> {
        let mut state = self.state.write().await;
        let stored = state
            .types
            .get_mut(&id)
            .ok_or_else(|| ContentError::content_type_not_found(id.to_string()))?;
        stored.status = status;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.state.write().await.types.remove(&id).is_some())
    }

    async fn record_change(&self, change: &NewStorageChange) -> Result<()> {
        let mut state = self.state.write().await;
        state.next_change_id += 1;
        let entry = StorageChange {
            id: state.next_change_id,
            api_id: change.api_id.clone(),
            kind: change.kind,
            schema_checksum: change.schema_checksum.clone(),
            details: change.details.clone(),
            recorded_at: Utc::now(),
        };
        state.changes.push(entry);
        Ok(())
    }

    async fn changes(&self, api_id: &ApiId) -> Result<Vec<StorageChange>> {
        let state = self.state.read().await;
        Ok(state
            .changes
            .iter()
            .filter(|c| &c.api_id == api_id)
            .cloned()
            .collect())
    }
}

struct MemoryRow {
    values: HashMap<FieldName, FieldValue>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct MemoryTable {
    columns: Vec<ColumnSpec>,
    next_id: i64,
    rows: BTreeMap<i64, MemoryRow>,
}

impl MemoryTable {
    fn record(&self, spec: &TableSpec, id: i64, row: &MemoryRow) -> Record {
        let values = spec
            .columns
            .iter()
            .map(|c| {
                let value = row.values.get(&c.name).cloned().unwrap_or(FieldValue::Null);
                (c.name.clone(), value)
            })
            .collect();

        Record {
            id,
            values,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    fn column(&self, name: &FieldName) -> Result<&ColumnSpec> {
        self.columns.iter().find(|c| &c.name == name).ok_or_else(|| {
            ContentError::conflict(format!(
                "Column '{}' does not exist, the content type changed during the request",
                name
            ))
        })
    }

    /// Check NOT NULL and UNIQUE for the row that would result from writing `values`
    fn check_constraints(&self, table: &StorageName, values: &FieldValues, row_id: Option<i64>) -> Result<()> {
        for (name, value) in values {
            let column = self.column(name)?;

            if value.is_null() {
                if column.not_null {
                    return Err(ContentError::invalid_schema(format!(
                        "Field '{}' is required and cannot be null",
                        name
                    )));
                }
                continue;
            }

            if column.unique {
                let taken = self.rows.iter().any(|(id, row)| {
                    Some(*id) != row_id && row.values.get(name) == Some(value)
                });
                if taken {
                    return Err(ContentError::conflict(format!(
                        "Value of unique field '{}' already exists in {}",
                        name, table
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryEngine {
    tables: DashMap<String, MemoryTable>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Column names currently materialized for `table`, in order
    pub fn column_names(&self, table: &StorageName) -> Option<Vec<String>> {
        self.tables.get(table.as_str()).map(|t| {
            t.columns
                .iter()
                .map(|c| c.name.as_str().to_string())
                .collect()
        })
    }
}

#[async_trait]
impl StorageEngine for MemoryEngine {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> bool {
        true
    }

    async fn table_exists(&self, table: &StorageName) -> Result<bool> {
        Ok(self.tables.contains_key(table.as_str()))
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<()> {
        match self.tables.entry(spec.name.as_str().to_string()) {
            Entry::Occupied(_) => Err(ContentError::conflict(format!(
                "Storage {} already exists",
                spec.name
            ))),
            Entry::Vacant(slot) => {
                slot.insert(MemoryTable {
                    columns: spec.columns.clone(),
                    next_id: 0,
                    rows: BTreeMap::new(),
                });
                debug!("Created in-memory table {}", spec.name);
                Ok(())
            }
        }
    }

    async fn alter_table(&self, table: &StorageName, add: &[ColumnSpec], drop: &[FieldName]) -> Result<()> {
        let mut stored = self
            .tables
            .get_mut(table.as_str())
            .ok_or_else(|| ContentError::storage_missing(table.as_str()))?;

        // Validate everything before touching anything
        for column in add {
            if stored.columns.iter().any(|c| c.name == column.name) {
                return Err(ContentError::conflict(format!(
                    "Column '{}' already exists in {}",
                    column.name, table
                )));
            }
        }
        for name in drop {
            stored.column(name)?;
        }

        stored.columns.retain(|c| !drop.contains(&c.name));
        for row in stored.rows.values_mut() {
            for name in drop {
                row.values.remove(name);
            }
        }
        stored.columns.extend(add.iter().cloned());

        Ok(())
    }

    async fn drop_table(&self, table: &StorageName) -> Result<()> {
        self.tables.remove(table.as_str());
        Ok(())
    }

    async fn insert(&self, spec: &TableSpec, values: &FieldValues) -> Result<Record> {
        let mut table = self
            .tables
            .get_mut(spec.name.as_str())
            .ok_or_else(|| ContentError::storage_missing(spec.name.as_str()))?;

        table.check_constraints(&spec.name, values, None)?;
        for column in table.columns.iter().filter(|c| c.not_null) {
            if !values.iter().any(|(name, _)| name == &column.name) {
                return Err(ContentError::invalid_schema(format!(
                    "Field '{}' is required and cannot be null",
                    column.name
                )));
            }
        }

        table.next_id += 1;
        let id = table.next_id;
        let now = Utc::now();
        let row = MemoryRow {
            values: values.iter().cloned().collect(),
            created_at: now,
            updated_at: now,
        };
        let record = table.record(spec, id, &row);
        table.rows.insert(id, row);

        Ok(record)
    }

    async fn select(&self, spec: &TableSpec, predicate: &Predicate) -> Result<Vec<Record>> {
        let table = self
            .tables
            .get(spec.name.as_str())
            .ok_or_else(|| ContentError::storage_missing(spec.name.as_str()))?;

        Ok(table
            .rows
            .iter()
            .filter(|(_, row)| {
                predicate.matches(|name| {
                    row.values
                        .iter()
                        .find(|(column, _)| column.as_str() == name)
                        .map(|(_, value)| value)
                })
            })
            .map(|(id, row)| table.record(spec, *id, row))
            .collect())
    }

    async fn select_by_id(&self, spec: &TableSpec, id: i64) -> Result<Option<Record>> {
        let table = self
            .tables
            .get(spec.name.as_str())
            .ok_or_else(|| ContentError::storage_missing(spec.name.as_str()))?;

        Ok(table.rows.get(&id).map(|row| table.record(spec, id, row)))
    }

    async fn update(&self, spec: &TableSpec, id: i64, values: &FieldValues) -> Result<Option<Record>> {
        let mut table = self
            .tables
            .get_mut(spec.name.as_str())
            .ok_or_else(|| ContentError::storage_missing(spec.name.as_str()))?;

        if !table.rows.contains_key(&id) {
            return Ok(None);
        }
        table.check_constraints(&spec.name, values, Some(id))?;

        let table = &mut *table;
        let Some(row) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        for (name, value) in values {
            row.values.insert(name.clone(), value.clone());
        }
        row.updated_at = Utc::now();

        let row = &table.rows[&id];
        Ok(Some(table.record(spec, id, row)))
    }

    async fn delete(&self, spec: &TableSpec, id: i64) -> Result<bool> {
        let mut table = self
            .tables
            .get_mut(spec.name.as_str())
            .ok_or_else(|| ContentError::storage_missing(spec.name.as_str()))?;

        Ok(table.rows.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FieldDefinition, FieldType};

    fn def(name: &str, field_type: FieldType, required: bool, unique: bool) -> FieldDefinition {
        FieldDefinition {
            name: name.to_string(),
            field_name: FieldName::parse(name).unwrap(),
            field_type,
            required,
            unique,
            target_content_type: None,
            relation_type: None,
        }
    }

    fn author_spec() -> TableSpec {
        TableSpec::new(
            &ApiId::parse("author").unwrap(),
            &[
                def("name", FieldType::ShortText, true, false),
                def("email", FieldType::ShortText, false, true),
            ],
        )
    }

    fn text(name: &str, value: &str) -> (FieldName, FieldValue) {
        (FieldName::parse(name).unwrap(), FieldValue::Text(value.to_string()))
    }

    fn new_type(api_id: &str) -> NewContentType {
        NewContentType {
            name: api_id.to_string(),
            plural_name: format!("{}s", api_id),
            api_id: ApiId::parse(api_id).unwrap(),
            description: None,
            fields: vec![],
        }
    }

    #[tokio::test]
    async fn test_catalog_rejects_duplicate_api_id() {
        let catalog = MemoryCatalog::new();
        let first = catalog.insert(&new_type("author"), "abc").await.unwrap();
        assert_eq!(first.status, ContentStatus::Pending);

        let err = catalog.insert(&new_type("author"), "abc").await.unwrap_err();
        assert!(matches!(err, ContentError::Conflict { .. }));
        assert_eq!(catalog.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_table_twice_fails_loudly() {
        let engine = MemoryEngine::new();
        engine.create_table(&author_spec()).await.unwrap();

        let err = engine.create_table(&author_spec()).await.unwrap_err();
        assert!(matches!(err, ContentError::Conflict { .. }));
        assert_eq!(engine.table_count(), 1);
    }

    #[tokio::test]
    async fn test_unique_and_not_null_enforced() {
        let engine = MemoryEngine::new();
        let spec = author_spec();
        engine.create_table(&spec).await.unwrap();

        engine
            .insert(&spec, &vec![text("name", "Jane"), text("email", "jane@example.com")])
            .await
            .unwrap();

        let dup = engine
            .insert(&spec, &vec![text("name", "Janet"), text("email", "jane@example.com")])
            .await
            .unwrap_err();
        assert!(matches!(dup, ContentError::Conflict { .. }));

        let missing = engine.insert(&spec, &vec![text("email", "x@example.com")]).await.unwrap_err();
        assert!(matches!(missing, ContentError::InvalidSchema { .. }));
    }

    #[tokio::test]
    async fn test_update_keeps_own_unique_value() {
        let engine = MemoryEngine::new();
        let spec = author_spec();
        engine.create_table(&spec).await.unwrap();

        let record = engine
            .insert(&spec, &vec![text("name", "Jane"), text("email", "jane@example.com")])
            .await
            .unwrap();

        let updated = engine
            .update(&spec, record.id, &vec![text("email", "jane@example.com")])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.get("name"), Some(&FieldValue::Text("Jane".to_string())));

        assert!(engine.update(&spec, 99, &vec![]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dml_after_drop_is_not_found() {
        let engine = MemoryEngine::new();
        let spec = author_spec();
        engine.create_table(&spec).await.unwrap();
        engine.drop_table(&spec.name).await.unwrap();

        let err = engine.select(&spec, &Predicate::all()).await.unwrap_err();
        assert!(err.is_storage_missing());
        // Dropping again is harmless
        engine.drop_table(&spec.name).await.unwrap();
    }

    #[tokio::test]
    async fn test_alter_table_adds_and_drops() {
        let engine = MemoryEngine::new();
        let spec = author_spec();
        engine.create_table(&spec).await.unwrap();
        engine
            .insert(&spec, &vec![text("name", "Jane"), text("email", "jane@example.com")])
            .await
            .unwrap();

        let bio = ColumnSpec::additive(&def("bio", FieldType::LongText, true, false));
        engine
            .alter_table(&spec.name, &[bio.clone()], &[FieldName::parse("email").unwrap()])
            .await
            .unwrap();
        assert_eq!(
            engine.column_names(&spec.name).unwrap(),
            vec!["name".to_string(), "bio".to_string()]
        );

        // Adding an existing column changes nothing
        let err = engine.alter_table(&spec.name, &[bio], &[]).await.unwrap_err();
        assert!(matches!(err, ContentError::Conflict { .. }));
        assert_eq!(engine.column_names(&spec.name).unwrap().len(), 2);
    }
}
