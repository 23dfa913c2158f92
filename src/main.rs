use apiforge_content::api::{cors_layer, router, AppState};
use apiforge_content::config::{Config, StorageBackend};
use apiforge_content::content::{ContentService, ContentTypeLookup, LocalLookup, RemoteLookup};
use apiforge_content::pool::PoolManager;
use apiforge_content::registry::{seed_content_types, ContentTypeRegistry};
use apiforge_content::storage::memory::{MemoryCatalog, MemoryEngine};
use apiforge_content::storage::postgres::{PgCatalog, PgEngine};
use apiforge_content::storage::{Catalog, StorageEngine, StorageLocks};

use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env file if present
    let dotenv = dotenvy::dotenv();

    let config = Config::from_env()?;

    // Create log directory if it doesn't exist
    std::fs::create_dir_all(&config.log_dir).unwrap_or_else(|e| {
        eprintln!("Warning: Could not create log directory {:?}: {}", config.log_dir, e);
    });

    // Create file appender with daily rotation
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, "apiforge-content.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,apiforge_content=debug")),
        )
        // Console output
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        // File output with JSON format for easy parsing
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_writer(non_blocking),
        )
        .init();

    debug!("Logging initialized - log directory: {:?}", config.log_dir);
    if let Err(e) = dotenv {
        warn!("No .env file found or error loading it: {}", e);
    }

    let socket_addr = config.socket_addr()?;
    info!("Starting content service on {}", socket_addr);
    info!("Storage backend: {:?}", config.storage_backend);
    info!("Lock timeout: {:?}", config.lock_timeout);

    let (catalog, engine): (Arc<dyn Catalog>, Arc<dyn StorageEngine>) = match config.storage_backend {
        StorageBackend::Postgres => {
            let pool = Arc::new(PoolManager::new(&config).await?);
            let catalog = PgCatalog::new(pool.clone());
            catalog.ensure_tables().await?;
            (Arc::new(catalog), Arc::new(PgEngine::new(pool)))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; content types and records are lost on shutdown");
            (Arc::new(MemoryCatalog::new()), Arc::new(MemoryEngine::new()))
        }
    };

    let locks = Arc::new(StorageLocks::new(config.lock_timeout));
    let registry = Arc::new(ContentTypeRegistry::new(catalog, engine.clone(), locks.clone()));

    registry.recover_stale(config.recovery_grace).await?;

    let lookup: Arc<dyn ContentTypeLookup> = match &config.content_type_service_url {
        Some(url) => {
            info!(
                "Resolving content types remotely via {} (timeout {:?})",
                url, config.lookup_timeout
            );
            Arc::new(RemoteLookup::new(url, config.lookup_timeout)?)
        }
        None => Arc::new(LocalLookup::new(registry.clone())),
    };
    let content = Arc::new(ContentService::new(lookup, engine, locks));

    if let Some(seed_file) = &config.seed_file {
        let seeded = seed_content_types(&registry, seed_file).await?;
        if !seeded.created.is_empty() {
            info!("Seeded content types: {}", seeded.created.join(", "));
        }
    }

    let mut app = router(Arc::new(AppState::new(registry, content)));
    if let Some(cors) = cors_layer(&config.cors_allowed_origins) {
        info!("CORS enabled for: {:?}", config.cors_allowed_origins);
        app = app.layer(cors);
    }
    let app = app.layer(TraceLayer::new_for_http());

    // Create listener
    let listener = tokio::net::TcpListener::bind(&socket_addr).await?;
    info!("Server listening on {}", socket_addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
