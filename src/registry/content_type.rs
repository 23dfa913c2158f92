//! Content type registry
//!
//! Owns the lifecycle of a content type: metadata in the [`Catalog`],
//! physical storage through the [`TableSynthesizer`]. The two are not covered
//! by one transaction, so every structural operation is a compensated
//! sequence:
//!
//! - create: insert PENDING metadata, materialize, mark ACTIVE.
//!   If materialization fails the metadata is removed again.
//! - update: migrate storage, then save metadata.
//!   If the save fails the table is put back into its previous shape.
//! - delete: mark DELETING, drop storage, retire the lock, remove metadata.
//!   If the drop fails the status goes back to ACTIVE.
//!
//! A crash inside one of these windows leaves a PENDING or DELETING row
//! behind; [`ContentTypeRegistry::recover_stale`] sweeps those at startup.
//!
//! Structural steps run under the apiId's exclusive [`StorageLocks`] guard,
//! so they never overlap record operations on the same content type.

use crate::error::{ContentError, Result};
use crate::registry::identifier::ApiId;
use crate::registry::model::{
    fields_checksum, validate_fields, ContentStatus, ContentType, ContentTypeInput, ContentTypePatch,
};
use crate::schema::{MigrationResult, TableSynthesizer};
use crate::storage::{Catalog, ChangeKind, NewStorageChange, StorageChange, StorageEngine, StorageLocks};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub struct ContentTypeRegistry {
    catalog: Arc<dyn Catalog>,
    synthesizer: TableSynthesizer,
    locks: Arc<StorageLocks>,
}

impl ContentTypeRegistry {
    pub fn new(catalog: Arc<dyn Catalog>, engine: Arc<dyn StorageEngine>, locks: Arc<StorageLocks>) -> Self {
        Self {
            catalog,
            synthesizer: TableSynthesizer::new(engine),
            locks,
        }
    }

    pub fn engine(&self) -> Arc<dyn StorageEngine> {
        self.synthesizer.engine().clone()
    }

    pub async fn create(&self, input: ContentTypeInput) -> Result<ContentType> {
        let new = input.validate()?;
        let checksum = fields_checksum(&new.fields);

        // The unique apiId constraint decides racing creates
        let mut content_type = self.catalog.insert(&new, &checksum).await?;
        debug!("Content type {} registered as pending (id={})", new.api_id, content_type.id);

        let guard = match self.locks.write(&new.api_id).await {
            Ok(guard) => guard,
            Err(e) => {
                self.forget(content_type.id, &new.api_id).await;
                return Err(e);
            }
        };

        if let Err(e) = self.synthesizer.create_storage(&new.api_id, &new.fields).await {
            warn!("Materializing {} failed, removing its metadata: {}", new.api_id, e);
            self.forget(content_type.id, &new.api_id).await;
            return Err(e);
        }

        if let Err(e) = self.catalog.set_status(content_type.id, ContentStatus::Active).await {
            error!("Activating {} failed, rolling back its storage: {}", new.api_id, e);
            if let Err(drop_err) = self.synthesizer.drop_storage(&new.api_id).await {
                error!("Rollback of storage for {} failed: {}", new.api_id, drop_err);
            }
            self.forget(content_type.id, &new.api_id).await;
            return Err(e);
        }
        drop(guard);

        content_type.status = ContentStatus::Active;
        self.log_change(NewStorageChange {
            api_id: new.api_id.clone(),
            kind: ChangeKind::StorageCreated,
            schema_checksum: Some(checksum),
            details: Some(json!({ "fields": content_type.fields.len() })),
        })
        .await;

        info!("Created content type {} (id={})", content_type.api_id, content_type.id);
        Ok(content_type)
    }

    /// Compensation: remove metadata whose storage never became usable
    async fn forget(&self, id: i64, api_id: &ApiId) {
        if let Err(e) = self.catalog.delete(id).await {
            error!("Failed to remove metadata of {} (id={}): {}", api_id, id, e);
        }
    }

    async fn log_change(&self, change: NewStorageChange) {
        if let Err(e) = self.catalog.record_change(&change).await {
            warn!("Failed to record {} for {}: {}", change.kind, change.api_id, e);
        }
    }

    pub async fn get(&self, id: i64) -> Result<ContentType> {
        self.catalog
            .get(id)
            .await?
            .ok_or_else(|| ContentError::content_type_not_found(id.to_string()))
    }

    /// Resolve by apiId. A malformed apiId cannot name a content type, so it is NotFound too.
    pub async fn get_by_api_id(&self, api_id: &str) -> Result<ContentType> {
        let parsed = ApiId::parse(api_id).map_err(|_| ContentError::content_type_not_found(api_id))?;
        self.catalog
            .get_by_api_id(&parsed)
            .await?
            .ok_or_else(|| ContentError::content_type_not_found(api_id))
    }

    pub async fn list(&self) -> Result<Vec<ContentType>> {
        self.catalog.list().await
    }

    pub async fn update(&self, id: i64, patch: ContentTypePatch) -> Result<ContentType> {
        let proposed_fields = patch.fields.as_deref().map(validate_fields).transpose()?;

        let current = self.get(id).await?;
        if let Some(api_id) = patch.api_id.as_deref() {
            if api_id != current.api_id.as_str() {
                return Err(ContentError::invalid_schema(format!(
                    "apiId '{}' is immutable; create a new content type instead",
                    current.api_id
                )));
            }
        }

        let _guard = self.locks.write(&current.api_id).await?;

        // Re-read under the lock: a concurrent update or delete may have won
        let mut updated = self.get(id).await?;
        if !updated.is_active() {
            return Err(ContentError::conflict(format!(
                "Content type '{}' is {} and cannot be updated",
                updated.api_id,
                updated.status.as_str()
            )));
        }

        if let Some(name) = patch.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            updated.name = name.to_string();
        }
        if let Some(plural) = patch.plural_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            updated.plural_name = plural.to_string();
        }
        if patch.description.is_some() {
            updated.description = patch.description.clone();
        }

        let mut migration: Option<MigrationResult> = None;
        if let Some(fields) = proposed_fields {
            let result = self
                .synthesizer
                .migrate_storage(&updated.api_id, &updated.fields, &fields, patch.allow_destructive)
                .await?;
            updated.fields = fields;
            updated.schema_checksum = fields_checksum(&updated.fields);
            migration = Some(result);
        }

        let saved = match self.catalog.save(&updated).await {
            Ok(saved) => saved,
            Err(e) => {
                if let Some(result) = &migration {
                    warn!("Saving {} failed after migration, reverting: {}", updated.api_id, e);
                    if let Err(revert_err) = self.synthesizer.revert_migration(&updated.api_id, result).await {
                        error!("Reverting migration of {} failed: {}", updated.api_id, revert_err);
                    }
                }
                return Err(e);
            }
        };

        if let Some(result) = migration.filter(|m| m.diff.has_changes()) {
            self.log_change(NewStorageChange {
                api_id: saved.api_id.clone(),
                kind: ChangeKind::StorageMigrated,
                schema_checksum: Some(saved.schema_checksum.clone()),
                details: serde_json::to_value(&result.diff).ok(),
            })
            .await;
        }

        info!("Updated content type {} (id={})", saved.api_id, saved.id);
        Ok(saved)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let current = self.get(id).await?;
        let guard = self.locks.write(&current.api_id).await?;

        // In-flight record operations have drained; re-check under the lock
        let current = self.get(id).await?;

        self.catalog.set_status(id, ContentStatus::Deleting).await?;

        if let Err(e) = self.synthesizer.drop_storage(&current.api_id).await {
            error!("Dropping storage of {} failed: {}", current.api_id, e);
            if let Err(restore_err) = self.catalog.set_status(id, current.status).await {
                error!("Restoring status of {} failed: {}", current.api_id, restore_err);
            }
            return Err(e);
        }

        // Record operations queued behind the guard now observe NotFound
        self.locks.retire(guard);

        if !self.catalog.delete(id).await? {
            warn!("Metadata of {} was already removed", current.api_id);
        }

        self.log_change(NewStorageChange {
            api_id: current.api_id.clone(),
            kind: ChangeKind::StorageDropped,
            schema_checksum: None,
            details: None,
        })
        .await;

        info!("Deleted content type {} (id={})", current.api_id, id);
        Ok(())
    }

    /// Finish the structural operations a crashed process left half done.
    ///
    /// Content types stuck in PENDING or DELETING for longer than `grace` lose
    /// their storage and metadata, which frees the apiId again. A PENDING row
    /// never served records, so nothing user-visible is lost with it. Returns
    /// the apiIds that were swept.
    pub async fn recover_stale(&self, grace: Duration) -> Result<Vec<ApiId>> {
        let cutoff = chrono::Duration::from_std(grace)
            .ok()
            .and_then(|grace| Utc::now().checked_sub_signed(grace))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut swept = Vec::new();
        for stale in self.catalog.list().await? {
            if stale.is_active() || stale.updated_at > cutoff {
                continue;
            }

            let guard = self.locks.write(&stale.api_id).await?;
            // Re-check under the lock: the operation may have finished meanwhile
            match self.catalog.get(stale.id).await? {
                Some(current) if !current.is_active() && current.updated_at <= cutoff => {}
                _ => continue,
            }

            warn!(
                "Sweeping content type {} left {} (id={})",
                stale.api_id,
                stale.status.as_str(),
                stale.id
            );
            self.synthesizer.drop_storage(&stale.api_id).await?;
            self.locks.retire(guard);
            self.catalog.delete(stale.id).await?;

            self.log_change(NewStorageChange {
                api_id: stale.api_id.clone(),
                kind: ChangeKind::StorageDropped,
                schema_checksum: None,
                details: Some(json!({ "recoveredFrom": stale.status.as_str() })),
            })
            .await;
            swept.push(stale.api_id);
        }

        if !swept.is_empty() {
            info!("Recovered {} content types left mid-operation", swept.len());
        }
        Ok(swept)
    }

    /// Structural change log of a content type, oldest first
    pub async fn changes(&self, id: i64) -> Result<Vec<StorageChange>> {
        let content_type = self.get(id).await?;
        self.catalog.changes(&content_type.api_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::model::{FieldInput, FieldType, NewContentType};
    use crate::storage::memory::{MemoryCatalog, MemoryEngine};
    use async_trait::async_trait;

    fn field(name: &str, field_type: FieldType) -> FieldInput {
        FieldInput {
            name: name.to_string(),
            field_name: name.to_string(),
            field_type,
            required: None,
            unique: None,
            target_content_type: None,
            relation_type: None,
        }
    }

    fn author_input() -> ContentTypeInput {
        ContentTypeInput {
            name: "Author".to_string(),
            plural_name: None,
            api_id: "author".to_string(),
            description: Some("People who write".to_string()),
            fields: vec![field("name", FieldType::ShortText), field("bio", FieldType::LongText)],
        }
    }

    fn setup() -> (Arc<MemoryEngine>, ContentTypeRegistry) {
        let (engine, _, registry) = setup_with_locks();
        (engine, registry)
    }

    fn setup_with_locks() -> (Arc<MemoryEngine>, Arc<StorageLocks>, ContentTypeRegistry) {
        let engine = Arc::new(MemoryEngine::new());
        let locks = Arc::new(StorageLocks::new(Duration::from_secs(2)));
        let registry = ContentTypeRegistry::new(Arc::new(MemoryCatalog::new()), engine.clone(), locks.clone());
        (engine, locks, registry)
    }

    #[tokio::test]
    async fn test_create_then_get_by_api_id_preserves_fields() {
        let (engine, registry) = setup();
        let created = registry.create(author_input()).await.unwrap();

        assert_eq!(created.status, ContentStatus::Active);
        assert_eq!(created.plural_name, "Authors");

        let fetched = registry.get_by_api_id("author").await.unwrap();
        let names: Vec<_> = fetched.fields.iter().map(|f| f.field_name.as_str()).collect();
        assert_eq!(names, vec!["name", "bio"]);
        assert_eq!(fetched.fields, created.fields);
        assert_eq!(fetched.status, ContentStatus::Active);
        assert!(engine.table_exists(&created.api_id.storage_name()).await.unwrap());

        let changes = registry.changes(created.id).await.unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::StorageCreated);
    }

    #[tokio::test]
    async fn test_duplicate_api_id_conflicts() {
        let (engine, registry) = setup();
        registry.create(author_input()).await.unwrap();

        let err = registry.create(author_input()).await.unwrap_err();
        assert!(matches!(err, ContentError::Conflict { .. }));
        assert_eq!(registry.list().await.unwrap().len(), 1);
        assert_eq!(engine.table_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_creates_one_winner() {
        let (engine, registry) = setup();
        let registry = Arc::new(registry);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.create(author_input()).await })
            })
            .collect();

        let mut ok = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(ContentError::Conflict { .. }) => conflicts += 1,
                Err(other) => panic!("unexpected error: {}", other),
            }
        }

        assert_eq!(ok, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(engine.table_count(), 1);
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_definitions_rejected() {
        let (engine, registry) = setup();

        let mut bad_api_id = author_input();
        bad_api_id.api_id = "author; DROP TABLE x".to_string();
        assert!(matches!(
            registry.create(bad_api_id).await.unwrap_err(),
            ContentError::InvalidSchema { .. }
        ));

        let mut duplicate_fields = author_input();
        duplicate_fields.fields.push(field("name", FieldType::LongText));
        assert!(matches!(
            registry.create(duplicate_fields).await.unwrap_err(),
            ContentError::InvalidSchema { .. }
        ));

        assert!(registry.list().await.unwrap().is_empty());
        assert_eq!(engine.table_count(), 0);
    }

    #[tokio::test]
    async fn test_existing_storage_rolls_back_metadata() {
        let (engine, registry) = setup();
        // Orphaned table left behind by someone else
        engine
            .create_table(&crate::schema::TableSpec::new(&ApiId::parse("author").unwrap(), &[]))
            .await
            .unwrap();

        let err = registry.create(author_input()).await.unwrap_err();
        assert!(matches!(err, ContentError::Conflict { .. }));
        assert!(registry.get_by_api_id("author").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let (_, registry) = setup();
        assert!(registry.get(42).await.unwrap_err().is_not_found());
        assert!(registry.get_by_api_id("nobody").await.unwrap_err().is_not_found());
        assert!(registry.get_by_api_id("not-an-id").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_update_display_metadata() {
        let (_, registry) = setup();
        let created = registry.create(author_input()).await.unwrap();

        let patch = ContentTypePatch {
            name: Some("Writer".to_string()),
            description: Some("Updated".to_string()),
            api_id: Some("author".to_string()),
            ..Default::default()
        };
        let updated = registry.update(created.id, patch).await.unwrap();

        assert_eq!(updated.name, "Writer");
        assert_eq!(updated.plural_name, "Authors");
        assert_eq!(updated.description.as_deref(), Some("Updated"));
        assert_eq!(updated.fields, created.fields);
        assert_eq!(updated.schema_checksum, created.schema_checksum);
    }

    #[tokio::test]
    async fn test_update_api_id_is_immutable() {
        let (_, registry) = setup();
        let created = registry.create(author_input()).await.unwrap();

        let patch = ContentTypePatch {
            api_id: Some("writer".to_string()),
            ..Default::default()
        };
        let err = registry.update(created.id, patch).await.unwrap_err();
        assert!(matches!(err, ContentError::InvalidSchema { .. }));
        assert_eq!(registry.get(created.id).await.unwrap().api_id.as_str(), "author");
    }

    #[tokio::test]
    async fn test_update_adds_fields() {
        let (engine, registry) = setup();
        let created = registry.create(author_input()).await.unwrap();

        let patch = ContentTypePatch {
            fields: Some(vec![
                field("name", FieldType::ShortText),
                field("bio", FieldType::LongText),
                field("born", FieldType::Date),
            ]),
            ..Default::default()
        };
        let updated = registry.update(created.id, patch).await.unwrap();

        assert_eq!(updated.fields.len(), 3);
        assert_ne!(updated.schema_checksum, created.schema_checksum);
        assert_eq!(
            engine.column_names(&created.api_id.storage_name()).unwrap(),
            vec!["name".to_string(), "bio".to_string(), "born".to_string()]
        );

        let kinds: Vec<_> = registry
            .changes(created.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.kind)
            .collect();
        assert_eq!(kinds, vec![ChangeKind::StorageCreated, ChangeKind::StorageMigrated]);
    }

    #[tokio::test]
    async fn test_update_removing_fields_needs_confirmation() {
        let (engine, registry) = setup();
        let created = registry.create(author_input()).await.unwrap();

        let mut patch = ContentTypePatch {
            fields: Some(vec![field("name", FieldType::ShortText)]),
            ..Default::default()
        };
        let err = registry.update(created.id, patch.clone()).await.unwrap_err();
        assert!(matches!(err, ContentError::InvalidSchema { .. }));
        assert_eq!(registry.get(created.id).await.unwrap().fields.len(), 2);

        patch.allow_destructive = true;
        let updated = registry.update(created.id, patch).await.unwrap();
        assert_eq!(updated.fields.len(), 1);
        assert_eq!(
            engine.column_names(&created.api_id.storage_name()).unwrap(),
            vec!["name".to_string()]
        );
    }

    #[tokio::test]
    async fn test_update_type_change_rejected() {
        let (_, registry) = setup();
        let created = registry.create(author_input()).await.unwrap();

        let patch = ContentTypePatch {
            fields: Some(vec![field("name", FieldType::Number), field("bio", FieldType::LongText)]),
            allow_destructive: true,
            ..Default::default()
        };
        let err = registry.update(created.id, patch).await.unwrap_err();
        assert!(matches!(err, ContentError::InvalidSchema { .. }));
        assert_eq!(
            registry.get(created.id).await.unwrap().fields[0].field_type,
            FieldType::ShortText
        );
    }

    #[tokio::test]
    async fn test_delete_drops_storage_and_metadata() {
        let (engine, registry) = setup();
        let created = registry.create(author_input()).await.unwrap();

        registry.delete(created.id).await.unwrap();

        assert_eq!(engine.table_count(), 0);
        assert!(registry.get(created.id).await.unwrap_err().is_not_found());
        assert!(registry.delete(created.id).await.unwrap_err().is_not_found());

        // The apiId is free again and gets fresh storage
        let again = registry.create(author_input()).await.unwrap();
        assert_ne!(again.id, created.id);
        assert_eq!(engine.table_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_waits_for_in_flight_record_operation() {
        let (engine, locks, registry) = setup_with_locks();
        let registry = Arc::new(registry);
        let created = registry.create(author_input()).await.unwrap();
        let (id, table) = (created.id, created.api_id.storage_name());

        let record_guard = locks.read(&created.api_id).await.unwrap();
        let deleting = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.delete(id).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!deleting.is_finished());
        assert!(engine.table_exists(&table).await.unwrap());
        assert_eq!(registry.get(id).await.unwrap().status, ContentStatus::Active);

        drop(record_guard);
        deleting.await.unwrap().unwrap();
        assert!(!engine.table_exists(&table).await.unwrap());
    }

    #[tokio::test]
    async fn test_migration_waits_for_in_flight_record_operation() {
        let (engine, locks, registry) = setup_with_locks();
        let registry = Arc::new(registry);
        let created = registry.create(author_input()).await.unwrap();
        let (id, table) = (created.id, created.api_id.storage_name());

        let record_guard = locks.read(&created.api_id).await.unwrap();
        let migrating = {
            let registry = registry.clone();
            let patch = ContentTypePatch {
                fields: Some(vec![
                    field("name", FieldType::ShortText),
                    field("bio", FieldType::LongText),
                    field("born", FieldType::Date),
                ]),
                ..Default::default()
            };
            tokio::spawn(async move { registry.update(id, patch).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!migrating.is_finished());
        assert_eq!(
            engine.column_names(&table).unwrap(),
            vec!["name".to_string(), "bio".to_string()]
        );

        drop(record_guard);
        let updated = migrating.await.unwrap().unwrap();
        assert_eq!(updated.fields.len(), 3);
        assert_eq!(
            engine.column_names(&table).unwrap(),
            vec!["name".to_string(), "bio".to_string(), "born".to_string()]
        );
    }

    #[tokio::test]
    async fn test_recover_stale_sweeps_interrupted_operations() {
        let (engine, registry) = setup();
        let author = registry.create(author_input()).await.unwrap();

        // Crashed after materializing, before activation
        let mut book = author_input();
        book.api_id = "book".to_string();
        let book = book.validate().unwrap();
        registry.catalog.insert(&book, &fields_checksum(&book.fields)).await.unwrap();
        registry.synthesizer.create_storage(&book.api_id, &book.fields).await.unwrap();

        // Crashed after marking DELETING
        let mut tag = author_input();
        tag.api_id = "tag".to_string();
        let tag = registry.create(tag).await.unwrap();
        registry.catalog.set_status(tag.id, ContentStatus::Deleting).await.unwrap();

        assert!(registry.recover_stale(Duration::from_secs(3600)).await.unwrap().is_empty());
        assert_eq!(engine.table_count(), 3);

        let swept = registry.recover_stale(Duration::ZERO).await.unwrap();
        let swept: Vec<_> = swept.iter().map(|a| a.as_str()).collect();
        assert_eq!(swept, vec!["book", "tag"]);

        assert_eq!(engine.table_count(), 1);
        let remaining = registry.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, author.id);

        // The apiId is usable again
        let mut again = author_input();
        again.api_id = "book".to_string();
        assert_eq!(registry.create(again).await.unwrap().status, ContentStatus::Active);
    }

    /// Catalog whose saves always fail, to exercise compensation
    struct FailingSaveCatalog {
        inner: MemoryCatalog,
    }

    #[async_trait]
    impl Catalog for FailingSaveCatalog {
        async fn insert(&self, c: &NewContentType, s: &str) -> Result<ContentType> {
            self.inner.insert(c, s).await
        }
        async fn get(&self, id: i64) -> Result<Option<ContentType>> {
            self.inner.get(id).await
        }
        async fn get_by_api_id(&self, api_id: &ApiId) -> Result<Option<ContentType>> {
            self.inner.get_by_api_id(api_id).await
        }
        async fn list(&self) -> Result<Vec<ContentType>> {
            self.inner.list().await
        }
        async fn save(&self, _: &ContentType) -> Result<ContentType> {
            Err(ContentError::storage("save", "content_types", "connection reset"))
        }
        async fn set_status(&self, id: i64, status: ContentStatus) -> Result<()> {
            self.inner.set_status(id, status).await
        }
        async fn delete(&self, id: i64) -> Result<bool> {
            self.inner.delete(id).await
        }
        async fn record_change(&self, change: &NewStorageChange) -> Result<()> {
            self.inner.record_change(change).await
        }
        async fn changes(&self, api_id: &ApiId) -> Result<Vec<StorageChange>> {
            self.inner.changes(api_id).await
        }
    }

    fn failing_save_setup() -> (Arc<MemoryEngine>, ContentTypeRegistry) {
        let engine = Arc::new(MemoryEngine::new());
        let registry = ContentTypeRegistry::new(
            Arc::new(FailingSaveCatalog {
                inner: MemoryCatalog::new(),
            }),
            engine.clone(),
            Arc::new(StorageLocks::default()),
        );
        (engine, registry)
    }

    #[tokio::test]
    async fn test_failed_save_reverts_added_columns() {
        let (engine, registry) = failing_save_setup();
        let created = registry.create(author_input()).await.unwrap();

        let patch = ContentTypePatch {
            fields: Some(vec![
                field("name", FieldType::ShortText),
                field("bio", FieldType::LongText),
                field("born", FieldType::Date),
            ]),
            ..Default::default()
        };
        let err = registry.update(created.id, patch).await.unwrap_err();
        assert!(matches!(err, ContentError::StorageFailure { .. }));
        assert_eq!(
            engine.column_names(&created.api_id.storage_name()).unwrap(),
            vec!["name".to_string(), "bio".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_save_restores_dropped_columns() {
        let (engine, registry) = failing_save_setup();
        let created = registry.create(author_input()).await.unwrap();

        let patch = ContentTypePatch {
            fields: Some(vec![field("name", FieldType::ShortText), field("born", FieldType::Date)]),
            allow_destructive: true,
            ..Default::default()
        };
        let err = registry.update(created.id, patch).await.unwrap_err();
        assert!(matches!(err, ContentError::StorageFailure { .. }));

        // Metadata still lists name and bio, and so does the table again
        let current = registry.get(created.id).await.unwrap();
        let listed: Vec<_> = current.fields.iter().map(|f| f.field_name.as_str().to_string()).collect();
        assert_eq!(listed, vec!["name".to_string(), "bio".to_string()]);
        assert_eq!(engine.column_names(&created.api_id.storage_name()).unwrap(), listed);
    }
}
