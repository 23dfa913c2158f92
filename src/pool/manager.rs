use crate::config::Config;
use crate::error::{ContentError, Result};
use deadpool_postgres::{Config as PoolConfig, Object, Pool, Runtime};
use std::time::Duration;
use tokio_postgres::NoTls;
use tracing::{debug, info};

/// Single connection pool to the content database
pub struct PoolManager {
    pool: Pool,
    database: String,
}

impl PoolManager {
    pub async fn new(config: &Config) -> Result<Self> {
        let pool = create_pool(&config.database_url, config.max_connections)?;
        let database = database_name(&config.database_url);

        let client = pool
            .get()
            .await
            .map_err(|e| ContentError::storage("connect", database.clone(), e))?;

        // Simple ping query
        client
            .execute("SELECT 1", &[])
            .await
            .map_err(|e| ContentError::storage("ping", database.clone(), e))?;

        info!("Connected to PostgreSQL database {}", database);

        Ok(Self { pool, database })
    }

    pub async fn client(&self) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| ContentError::storage("connect", self.database.clone(), e))
    }

    pub async fn is_connected(&self) -> bool {
        match self.pool.get().await {
            Ok(client) => client.execute("SELECT 1", &[]).await.is_ok(),
            Err(e) => {
                debug!("Health ping on {} failed: {}", self.database, e);
                false
            }
        }
    }
}

fn create_pool(database_url: &str, max_size: u32) -> Result<Pool> {
    let mut cfg = PoolConfig::new();
    cfg.url = Some(database_url.to_string());

    cfg.pool = Some(deadpool_postgres::PoolConfig {
        max_size: max_size as usize,
        timeouts: deadpool_postgres::Timeouts {
            wait: Some(Duration::from_secs(5)),
            create: Some(Duration::from_secs(5)),
            recycle: Some(Duration::from_secs(5)),
        },
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| ContentError::Internal(format!("Failed to create pool: {}", e)))
}

/// Database name for log lines; never includes credentials
fn database_name(database_url: &str) -> String {
    let without_query = database_url.split('?').next().unwrap_or(database_url);
    match without_query.rfind('/') {
        Some(idx) if idx + 1 < without_query.len() && !without_query[..idx].ends_with('/') => {
            without_query[idx + 1..].to_string()
        }
        _ => "postgres".to_string(),
    }
}
