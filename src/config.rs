use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Where content types and records are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl StorageBackend {
    fn parse(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(anyhow::anyhow!(
                "Unknown STORAGE_BACKEND '{}': expected 'postgres' or 'memory'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub service_host: String,
    pub service_port: u16,
    pub max_connections: u32,
    pub storage_backend: StorageBackend,
    pub content_type_service_url: Option<String>,
    pub lookup_timeout: Duration,
    pub lock_timeout: Duration,
    /// Age after which PENDING or DELETING content types are swept at startup
    pub recovery_grace: Duration,
    pub seed_file: Option<PathBuf>,
    pub cors_allowed_origins: Vec<String>,
    pub log_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // Build database_url from individual fields or use DATABASE_URL if provided
        let database_url = if let Ok(url) = env::var("DATABASE_URL") {
            url
        } else {
            let db_host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
            let db_port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
            let db_name = env::var("DB_NAME").unwrap_or_else(|_| "apiforge".to_string());
            let db_user = env::var("DB_USER").unwrap_or_else(|_| "apiforge".to_string());
            let db_password = env::var("DB_PASSWORD").unwrap_or_else(|_| "password".to_string());

            // URL-encode password to handle special characters
            let encoded_password = urlencoding::encode(&db_password);

            format!("postgres://{}:{}@{}:{}/{}", db_user, encoded_password, db_host, db_port, db_name)
        };

        let service_host = env::var("SERVICE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let service_port = env::var("SERVICE_PORT")
            .unwrap_or_else(|_| "8083".to_string())
            .parse()
            .unwrap_or(8083);

        let max_connections = env::var("MAX_CONNECTIONS")
            .unwrap_or_else(|_| "16".to_string())
            .parse()
            .unwrap_or(16);

        let storage_backend =
            StorageBackend::parse(&env::var("STORAGE_BACKEND").unwrap_or_else(|_| "postgres".to_string()))?;

        let content_type_service_url = env::var("CONTENT_TYPE_SERVICE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let lookup_timeout_ms: u64 = env::var("LOOKUP_TIMEOUT_MS")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);

        let lock_timeout_ms: u64 = env::var("LOCK_TIMEOUT_MS")
            .unwrap_or_else(|_| "10000".to_string())
            .parse()
            .unwrap_or(10000);

        let recovery_grace_secs: u64 = env::var("RECOVERY_GRACE_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .unwrap_or(300);

        let seed_file = env::var("SEED_FILE").ok().map(PathBuf::from);

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let log_dir = env::var("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./logs"));

        Ok(Config {
            database_url,
            service_host,
            service_port,
            max_connections,
            storage_backend,
            content_type_service_url,
            lookup_timeout: Duration::from_millis(lookup_timeout_ms),
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            recovery_grace: Duration::from_secs(recovery_grace_secs),
            seed_file,
            cors_allowed_origins,
            log_dir,
        })
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.service_host, self.service_port);
        addr.parse().map_err(|e| anyhow::anyhow!("Invalid socket address: {}", e))
    }
}
