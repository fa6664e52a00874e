use anyhow::Result;
use std::{io::ErrorKind, sync::Arc};
use textbook_service::{
    config::{AppConfig, StorageBackend},
    db,
    services::local_store::LocalObjectStore,
    state::AppState,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;
    tracing::info!("Starting textbook-service with config: {:?}", cfg);

    // --- Initialize SQLite connection + schema ---
    tracing::debug!("Connecting using raw URL => {}", cfg.database_url);
    let pool = db::connect(&cfg.database_url, cfg.db_max_connections).await?;
    db::run_migrations(&pool).await?;
    tracing::info!("Database migration complete.");

    if migrate {
        return Ok(()); // exit after migration
    }

    // --- Initialize object store + shared state ---
    let cfg = Arc::new(cfg);
    let state = match cfg.storage.backend {
        StorageBackend::Local => {
            let store = LocalObjectStore::new(
                &cfg.storage.storage_dir,
                cfg.storage.public_url.clone(),
                cfg.storage.presign_secret.clone(),
            )
            .await?;
            tracing::info!("Local object store at {}", cfg.storage.storage_dir);
            AppState::with_local_store(pool, store, cfg.clone())
        }
        StorageBackend::S3 => s3_state(pool, cfg.clone()).await?,
    };

    // --- Build router ---
    let app = textbook_service::app(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[cfg(feature = "s3")]
async fn s3_state(pool: Arc<sqlx::SqlitePool>, cfg: Arc<AppConfig>) -> Result<AppState> {
    use textbook_service::services::s3_store::S3ObjectStore;

    let bucket = cfg
        .storage
        .s3_bucket
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("TEXTBOOK_S3_BUCKET is required for the s3 backend"))?;
    let store = S3ObjectStore::new(bucket, &cfg.storage.s3_region).await;
    Ok(AppState::new(pool, Arc::new(store), None, cfg))
}

#[cfg(not(feature = "s3"))]
async fn s3_state(_pool: Arc<sqlx::SqlitePool>, _cfg: Arc<AppConfig>) -> Result<AppState> {
    anyhow::bail!("storage backend `s3` requires building with `--features s3`")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
