//! Table synthesizer
//!
//! Materializes, migrates and drops the physical table backing a content
//! type. The table is always named from the apiId (`ct_<apiId>`).
//!
//! Process for a field set change:
//! 1. Diff the current and proposed field lists
//! 2. Refuse incompatible changes outright
//! 3. Refuse data loss unless the caller confirmed it
//! 4. Apply column additions and drops as one structural change

use crate::error::{ContentError, Result};
use crate::registry::{ApiId, FieldDefinition};
use crate::schema::diff::FieldSetDiff;
use crate::schema::types::{ColumnSpec, TableSpec};
use crate::storage::StorageEngine;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a migration
#[derive(Debug, Clone)]
pub struct MigrationResult {
    pub diff: FieldSetDiff,
    /// Whether the physical table was altered
    pub applied: bool,
    /// Nullable stand-ins for the dropped columns, used to restore the shape
    /// of the table when the migration has to be reverted
    pub dropped: Vec<ColumnSpec>,
}

pub struct TableSynthesizer {
    engine: Arc<dyn StorageEngine>,
}

impl TableSynthesizer {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.engine
    }

    /// Create the table for `api_id`. Existing storage is an error, never reused.
    pub async fn create_storage(&self, api_id: &ApiId, fields: &[FieldDefinition]) -> Result<TableSpec> {
        let spec = TableSpec::new(api_id, fields);

        if self.engine.table_exists(&spec.name).await? {
            warn!("Refusing to create {}: storage already exists", spec.name);
            return Err(ContentError::conflict(format!(
                "Storage {} already exists",
                spec.name
            )));
        }

        self.engine.create_table(&spec).await?;
        info!("Materialized storage {} for content type {}", spec.name, api_id);

        Ok(spec)
    }

    /// Irreversibly drop the table for `api_id`. Missing storage is not an error.
    pub async fn drop_storage(&self, api_id: &ApiId) -> Result<()> {
        let table = api_id.storage_name();
        self.engine.drop_table(&table).await?;
        info!("Dropped storage {} for content type {}", table, api_id);
        Ok(())
    }

    /// Bring the table in line with `proposed`.
    ///
    /// Incompatible changes are always rejected; removed fields require
    /// `allow_destructive`. Nothing is altered when the check fails.
    pub async fn migrate_storage(
        &self,
        api_id: &ApiId,
        current: &[FieldDefinition],
        proposed: &[FieldDefinition],
        allow_destructive: bool,
    ) -> Result<MigrationResult> {
        let diff = FieldSetDiff::compute(current, proposed);

        if !diff.incompatible_changes.is_empty() {
            return Err(ContentError::invalid_schema(format!(
                "Unsupported field changes for '{}': {}",
                api_id,
                diff.incompatible_summary()
            )));
        }

        if !diff.dataloss_changes.is_empty() && !allow_destructive {
            return Err(ContentError::invalid_schema(format!(
                "Field changes for '{}' would delete data ({}); resend with allowDestructive=true to confirm",
                api_id,
                diff.dataloss_summary()
            )));
        }

        if !diff.alters_storage() {
            return Ok(MigrationResult {
                diff,
                applied: false,
                dropped: Vec::new(),
            });
        }

        let table = api_id.storage_name();
        self.engine
            .alter_table(&table, &diff.added_columns, &diff.removed_columns)
            .await?;

        if diff.removed_columns.is_empty() {
            info!("Migrated {}: {} columns added", table, diff.added_columns.len());
        } else {
            warn!(
                "Migrated {} destructively: {} columns added, dropped {:?}",
                table,
                diff.added_columns.len(),
                diff.removed_columns
            );
        }

        let dropped = current
            .iter()
            .filter(|f| diff.removed_columns.contains(&f.field_name))
            .map(ColumnSpec::additive)
            .collect();

        Ok(MigrationResult {
            diff,
            applied: true,
            dropped,
        })
    }

    /// Put the table back into the shape it had before `migration`.
    ///
    /// Added columns are dropped. Dropped columns come back empty and
    /// nullable: their data is gone, but the table matches the previous
    /// field list again.
    pub async fn revert_migration(&self, api_id: &ApiId, migration: &MigrationResult) -> Result<()> {
        if !migration.applied {
            return Ok(());
        }

        let added: Vec<_> = migration
            .diff
            .added_columns
            .iter()
            .map(|c| c.name.clone())
            .collect();

        let table = api_id.storage_name();
        self.engine.alter_table(&table, &migration.dropped, &added).await?;
        warn!(
            "Reverted migration of {}: {} columns removed, {} restored empty",
            table,
            added.len(),
            migration.dropped.len()
        );
        Ok(())
    }
}
