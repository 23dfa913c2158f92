use super::sql::{self, Param, Statement};
use super::map_db_error;
use crate::content::{FieldValue, FieldValues, Predicate, Record};
use crate::error::{ContentError, Result};
use crate::pool::PoolManager;
use crate::registry::{FieldName, StorageName};
use crate::schema::{ColumnSpec, ColumnType, TableSpec};
use crate::storage::StorageEngine;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postgres_types::ToSql;
use std::sync::Arc;
use tokio_postgres::{Client, Row};
use tracing::{debug, info};

type BoxedParam = Box<dyn ToSql + Sync + Send>;

/// Content tables in PostgreSQL
///
/// Every statement runs in its own transaction holding an advisory lock on
/// the table name: shared for DML, exclusive for DDL. This serializes
/// structural changes against record traffic across processes too.
pub struct PgEngine {
    pool: Arc<PoolManager>,
}

impl PgEngine {
    pub fn new(pool: Arc<PoolManager>) -> Self {
        Self { pool }
    }

    async fn execute_ddl(&self, operation: &str, table: &StorageName, statement: &str) -> Result<()> {
        let mut conn = self.pool.client().await?;
        let client: &mut Client = &mut conn;
        let tx = client
            .transaction()
            .await
            .map_err(|e| map_db_error(operation, table.as_str(), e))?;

        tx.execute("SELECT pg_advisory_xact_lock(hashtext($1))", &[&table.as_str()])
            .await
            .map_err(|e| map_db_error(operation, table.as_str(), e))?;

        debug!("Executing DDL: {}", statement);
        tx.batch_execute(statement)
            .await
            .map_err(|e| map_db_error(operation, table.as_str(), e))?;

        tx.commit()
            .await
            .map_err(|e| map_db_error(operation, table.as_str(), e))
    }

    async fn query(&self, operation: &str, table: &TableSpec, statement: Statement) -> Result<Vec<Row>> {
        let target = table.name.as_str();
        let params: Vec<BoxedParam> = statement.params.iter().map(to_sql).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let mut conn = self.pool.client().await?;
        let client: &mut Client = &mut conn;
        let tx = client
            .transaction()
            .await
            .map_err(|e| map_db_error(operation, target, e))?;

        tx.execute("SELECT pg_advisory_xact_lock_shared(hashtext($1))", &[&target])
            .await
            .map_err(|e| map_db_error(operation, target, e))?;

        debug!("Executing {} on {} with {} params", operation, target, refs.len());
        let rows = tx
            .query(&statement.sql, &refs)
            .await
            .map_err(|e| map_db_error(operation, target, e))?;

        tx.commit()
            .await
            .map_err(|e| map_db_error(operation, target, e))?;

        Ok(rows)
    }
}

#[async_trait]
impl StorageEngine for PgEngine {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> bool {
        self.pool.is_connected().await
    }

    async fn table_exists(&self, table: &StorageName) -> Result<bool> {
        let client = self.pool.client().await?;
        let row = client
            .query_opt(
                "SELECT 1 FROM information_schema.tables WHERE table_schema = current_schema() AND table_name = $1",
                &[&table.as_str()],
            )
            .await
            .map_err(|e| map_db_error("table_exists", table.as_str(), e))?;

        Ok(row.is_some())
    }

    async fn create_table(&self, table: &TableSpec) -> Result<()> {
        self.execute_ddl("create_table", &table.name, &sql::create_table(table))
            .await?;
        info!("Created table {} with {} field columns", table.name, table.columns.len());
        Ok(())
    }

    async fn alter_table(&self, table: &StorageName, add: &[ColumnSpec], drop: &[FieldName]) -> Result<()> {
        let Some(statement) = sql::alter_table(table, add, drop) else {
            return Ok(());
        };
        self.execute_ddl("alter_table", table, &statement).await?;
        info!(
            "Altered table {}: {} columns added, {} dropped",
            table,
            add.len(),
            drop.len()
        );
        Ok(())
    }

    async fn drop_table(&self, table: &StorageName) -> Result<()> {
        self.execute_ddl("drop_table", table, &sql::drop_table(table))
            .await?;
        info!("Dropped table {}", table);
        Ok(())
    }

    async fn insert(&self, table: &TableSpec, values: &FieldValues) -> Result<Record> {
        let rows = self
            .query("insert", table, sql::insert(table, values))
            .await?;
        let row = rows.first().ok_or_else(|| {
            ContentError::storage("insert", table.name.as_str(), "INSERT returned no row")
        })?;
        decode_record(table, row)
    }

    async fn select(&self, table: &TableSpec, predicate: &Predicate) -> Result<Vec<Record>> {
        let rows = self
            .query("select", table, sql::select(table, predicate))
            .await?;
        rows.iter().map(|row| decode_record(table, row)).collect()
    }

    async fn select_by_id(&self, table: &TableSpec, id: i64) -> Result<Option<Record>> {
        let rows = self
            .query("select_by_id", table, sql::select_by_id(table, id))
            .await?;
        rows.first().map(|row| decode_record(table, row)).transpose()
    }

    async fn update(&self, table: &TableSpec, id: i64, values: &FieldValues) -> Result<Option<Record>> {
        let rows = self
            .query("update", table, sql::update(table, id, values))
            .await?;
        rows.first().map(|row| decode_record(table, row)).transpose()
    }

    async fn delete(&self, table: &TableSpec, id: i64) -> Result<bool> {
        let target = table.name.as_str();
        let statement = sql::delete(table, id);

        let mut conn = self.pool.client().await?;
        let client: &mut Client = &mut conn;
        let tx = client
            .transaction()
            .await
            .map_err(|e| map_db_error("delete", target, e))?;

        tx.execute("SELECT pg_advisory_xact_lock_shared(hashtext($1))", &[&target])
            .await
            .map_err(|e| map_db_error("delete", target, e))?;

        let affected = tx
            .execute(&statement.sql, &[&id])
            .await
            .map_err(|e| map_db_error("delete", target, e))?;

        tx.commit()
            .await
            .map_err(|e| map_db_error("delete", target, e))?;

        Ok(affected > 0)
    }
}

/// Bind a parameter with the Rust type matching its placeholder cast.
/// Nulls are typed too, so the server never has to guess.
fn to_sql(param: &Param) -> BoxedParam {
    match param {
        Param::Id(id) => Box::new(*id),
        Param::Value(value, column_type) => match (value, column_type) {
            (FieldValue::Text(s), _) => Box::new(s.clone()),
            (FieldValue::Number(n), _) => Box::new(sql::numeric_text(*n)),
            (FieldValue::Boolean(b), _) => Box::new(*b),
            (FieldValue::Timestamp(ts), _) => Box::new(*ts),
            (FieldValue::Reference(id), _) => Box::new(*id),
            (FieldValue::Null, ColumnType::VarChar(_) | ColumnType::Text | ColumnType::Numeric) => {
                Box::new(None::<String>)
            }
            (FieldValue::Null, ColumnType::Boolean) => Box::new(None::<bool>),
            (FieldValue::Null, ColumnType::TimestampTz) => Box::new(None::<DateTime<Utc>>),
            (FieldValue::Null, ColumnType::BigInt) => Box::new(None::<i64>),
        },
    }
}

/// Decode a row produced by [`sql::select_list`]
fn decode_record(table: &TableSpec, row: &Row) -> Result<Record> {
    let decode_err = |e: tokio_postgres::Error| ContentError::storage("decode", table.name.as_str(), e);

    let id: i64 = row.try_get("id").map_err(decode_err)?;

    let mut values = Vec::with_capacity(table.columns.len());
    for column in &table.columns {
        let name = column.name.as_str();
        let value = match column.column_type {
            ColumnType::VarChar(_) | ColumnType::Text => row
                .try_get::<_, Option<String>>(name)
                .map(|v| v.map(FieldValue::Text)),
            ColumnType::Numeric => match row.try_get::<_, Option<String>>(name) {
                Ok(Some(text)) => {
                    let number = text.parse::<f64>().map_err(|e| {
                        ContentError::storage("decode", table.name.as_str(), format!("{}: {}", name, e))
                    })?;
                    Ok(Some(FieldValue::Number(number)))
                }
                Ok(None) => Ok(None),
                Err(e) => Err(e),
            },
            ColumnType::Boolean => row
                .try_get::<_, Option<bool>>(name)
                .map(|v| v.map(FieldValue::Boolean)),
            ColumnType::TimestampTz => row
                .try_get::<_, Option<DateTime<Utc>>>(name)
                .map(|v| v.map(FieldValue::Timestamp)),
            ColumnType::BigInt => row
                .try_get::<_, Option<i64>>(name)
                .map(|v| v.map(FieldValue::Reference)),
        }
        .map_err(decode_err)?;

        values.push((column.name.clone(), value.unwrap_or(FieldValue::Null)));
    }

    Ok(Record {
        id,
        values,
        created_at: row.try_get("created_at").map_err(decode_err)?,
        updated_at: row.try_get("updated_at").map_err(decode_err)?,
    })
}
