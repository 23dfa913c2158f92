use super::map_db_error;
use crate::error::{ContentError, Result};
use crate::pool::PoolManager;
use crate::registry::{ApiId, ContentStatus, ContentType, FieldDefinition, NewContentType};
use crate::storage::{Catalog, ChangeKind, NewStorageChange, StorageChange};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio_postgres::error::SqlState;
use tokio_postgres::Row;
use tracing::{debug, info, warn};

const CONTENT_TYPES: &str = "content_types";
const CONTENT_TYPE_CHANGES: &str = "content_type_changes";

const CONTENT_TYPE_COLUMNS: &str = "id, name, plural_name, api_id, description, fields, status, \
     schema_checksum, created_at, updated_at";

/// Content type metadata in PostgreSQL
pub struct PgCatalog {
    pool: Arc<PoolManager>,
}

impl PgCatalog {
    pub fn new(pool: Arc<PoolManager>) -> Self {
        Self { pool }
    }

    /// Ensure the metadata and change log tables exist
    pub async fn ensure_tables(&self) -> Result<()> {
        let client = self.pool.client().await?;

        client
            .batch_execute(
                r#"
                CREATE TABLE IF NOT EXISTS content_types (
                    id BIGSERIAL PRIMARY KEY,
                    name TEXT NOT NULL,
                    plural_name TEXT NOT NULL,
                    api_id VARCHAR(60) NOT NULL UNIQUE,
                    description TEXT,
                    fields JSONB NOT NULL DEFAULT '[]'::jsonb,
                    status TEXT NOT NULL DEFAULT 'PENDING',
                    schema_checksum TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE TABLE IF NOT EXISTS content_type_changes (
                    id BIGSERIAL PRIMARY KEY,
                    api_id VARCHAR(60) NOT NULL,
                    change_kind TEXT NOT NULL,
                    schema_checksum TEXT,
                    details JSONB,
                    recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );
                "#,
            )
            .await
            .map_err(|e| map_db_error("ensure_tables", CONTENT_TYPES, e))?;

        // Index for change log lookups by apiId; the catalog works without it
        if let Err(e) = client
            .execute(
                "CREATE INDEX IF NOT EXISTS idx_content_type_changes_api_id ON content_type_changes (api_id)",
                &[],
            )
            .await
        {
            warn!("Failed to create change log index on {}: {}", CONTENT_TYPE_CHANGES, e);
        }

        info!("Content type catalog tables ensured");
        Ok(())
    }
}

fn content_type_from_row(row: &Row) -> Result<ContentType> {
    let decode_err = |e: tokio_postgres::Error| ContentError::storage("decode", CONTENT_TYPES, e);

    let api_id: String = row.try_get("api_id").map_err(decode_err)?;
    let fields: JsonValue = row.try_get("fields").map_err(decode_err)?;
    let fields: Vec<FieldDefinition> = serde_json::from_value(fields).map_err(|e| {
        ContentError::Internal(format!("Stored fields of '{}' are invalid: {}", api_id, e))
    })?;
    let status: String = row.try_get("status").map_err(decode_err)?;

    Ok(ContentType {
        id: row.try_get("id").map_err(decode_err)?,
        name: row.try_get("name").map_err(decode_err)?,
        plural_name: row.try_get("plural_name").map_err(decode_err)?,
        api_id: ApiId::parse(&api_id)?,
        description: row.try_get("description").map_err(decode_err)?,
        fields,
        status: ContentStatus::parse(&status)?,
        schema_checksum: row.try_get("schema_checksum").map_err(decode_err)?,
        created_at: row.try_get("created_at").map_err(decode_err)?,
        updated_at: row.try_get("updated_at").map_err(decode_err)?,
    })
}

fn change_from_row(row: &Row) -> Result<StorageChange> {
    let decode_err =
        |e: tokio_postgres::Error| ContentError::storage("decode", CONTENT_TYPE_CHANGES, e);

    let api_id: String = row.try_get("api_id").map_err(decode_err)?;
    let kind: String = row.try_get("change_kind").map_err(decode_err)?;
    let kind = ChangeKind::parse(&kind)
        .ok_or_else(|| ContentError::Internal(format!("Unknown change kind: {}", kind)))?;

    Ok(StorageChange {
        id: row.try_get("id").map_err(decode_err)?,
        api_id: ApiId::parse(&api_id)?,
        kind,
        schema_checksum: row.try_get("schema_checksum").map_err(decode_err)?,
        details: row.try_get("details").map_err(decode_err)?,
        recorded_at: row.try_get("recorded_at").map_err(decode_err)?,
    })
}

fn fields_json(fields: &[FieldDefinition]) -> Result<JsonValue> {
    serde_json::to_value(fields)
        .map_err(|e| ContentError::Internal(format!("Failed to serialize fields: {}", e)))
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn insert(&self, new: &NewContentType, schema_checksum: &str) -> Result<ContentType> {
        let client = self.pool.client().await?;
        let fields = fields_json(&new.fields)?;

        let sql = format!(
            "INSERT INTO content_types (name, plural_name, api_id, description, fields, status, schema_checksum) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            CONTENT_TYPE_COLUMNS
        );

        let row = client
            .query_one(
                &sql,
                &[
                    &new.name,
                    &new.plural_name,
                    &new.api_id.as_str(),
                    &new.description,
                    &fields,
                    &ContentStatus::Pending.as_str(),
                    &schema_checksum,
                ],
            )
            .await
            .map_err(|e| match e.code() {
                Some(code) if *code == SqlState::UNIQUE_VIOLATION => ContentError::conflict(format!(
                    "Content type with apiId '{}' already exists",
                    new.api_id
                )),
                _ => map_db_error("insert", CONTENT_TYPES, e),
            })?;

        debug!("Inserted pending content type {}", new.api_id);
        content_type_from_row(&row)
    }

    async fn get(&self, id: i64) -> Result<Option<ContentType>> {
        let client = self.pool.client().await?;
        let sql = format!("SELECT {} FROM content_types WHERE id = $1", CONTENT_TYPE_COLUMNS);

        let row = client
            .query_opt(&sql, &[&id])
            .await
            .map_err(|e| map_db_error("get", CONTENT_TYPES, e))?;

        row.as_ref().map(content_type_from_row).transpose()
    }

    async fn get_by_api_id(&self, api_id: &ApiId) -> Result<Option<ContentType>> {
        let client = self.pool.client().await?;
        let sql = format!("SELECT {} FROM content_types WHERE api_id = $1", CONTENT_TYPE_COLUMNS);

        let row = client
            .query_opt(&sql, &[&api_id.as_str()])
            .await
            .map_err(|e| map_db_error("get_by_api_id", CONTENT_TYPES, e))?;

        row.as_ref().map(content_type_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<ContentType>> {
        let client = self.pool.client().await?;
        let sql = format!("SELECT {} FROM content_types ORDER BY id", CONTENT_TYPE_COLUMNS);

        let rows = client
            .query(&sql, &[])
            .await
            .map_err(|e| map_db_error("list", CONTENT_TYPES, e))?;

        rows.iter().map(content_type_from_row).collect()
    }

    async fn save(&self, content_type: &ContentType) -> Result<ContentType> {
        let client = self.pool.client().await?;
        let fields = fields_json(&content_type.fields)?;

        let sql = format!(
            "UPDATE content_types SET name = $1, plural_name = $2, description = $3, fields = $4, \
             status = $5, schema_checksum = $6, updated_at = NOW() WHERE id = $7 RETURNING {}",
            CONTENT_TYPE_COLUMNS
        );

        let row = client
            .query_opt(
                &sql,
                &[
                    &content_type.name,
                    &content_type.plural_name,
                    &content_type.description,
                    &fields,
                    &content_type.status.as_str(),
                    &content_type.schema_checksum,
                    &content_type.id,
                ],
            )
            .await
            .map_err(|e| map_db_error("save", CONTENT_TYPES, e))?
            .ok_or_else(|| ContentError::content_type_not_found(content_type.id.to_string()))?;

        content_type_from_row(&row)
    }

    async fn set_status(&self, id: i64, status: ContentStatus) -> Result<()> {
        let client = self.pool.client().await?;

        let updated = client
            .execute(
                "UPDATE content_types SET status = $1, updated_at = NOW() WHERE id = $2",
                &[&status.as_str(), &id],
            )
            .await
            .map_err(|e| map_db_error("set_status", CONTENT_TYPES, e))?;

        if updated == 0 {
            return Err(ContentError::content_type_not_found(id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let client = self.pool.client().await?;

        let deleted = client
            .execute("DELETE FROM content_types WHERE id = $1", &[&id])
            .await
            .map_err(|e| map_db_error("delete", CONTENT_TYPES, e))?;

        Ok(deleted > 0)
    }

    async fn record_change(&self, change: &NewStorageChange) -> Result<()> {
        let client = self.pool.client().await?;
        let kind = change.kind.to_string();

        client
            .execute(
                "INSERT INTO content_type_changes (api_id, change_kind, schema_checksum, details) \
                 VALUES ($1, $2, $3, $4)",
                &[
                    &change.api_id.as_str(),
                    &kind,
                    &change.schema_checksum,
                    &change.details,
                ],
            )
            .await
            .map_err(|e| map_db_error("record_change", CONTENT_TYPE_CHANGES, e))?;

        debug!("Recorded {} for {}", kind, change.api_id);
        Ok(())
    }

    async fn changes(&self, api_id: &ApiId) -> Result<Vec<StorageChange>> {
        let client = self.pool.client().await?;

        let rows = client
            .query(
                "SELECT id, api_id, change_kind, schema_checksum, details, recorded_at \
                 FROM content_type_changes WHERE api_id = $1 ORDER BY id",
                &[&api_id.as_str()],
            )
            .await
            .map_err(|e| map_db_error("changes", CONTENT_TYPE_CHANGES, e))?;

        rows.iter().map(change_from_row).collect()
    }
}
