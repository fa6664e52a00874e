//! SQLite pool construction and embedded migrations.

use sqlx::{
    SqlitePool,
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{path::Path, str::FromStr, sync::Arc};

/// Open a pool for `database_url`, creating the database file (and its
/// parent directory) when missing.
///
/// In-memory URLs get a single, never-recycled connection: every SQLite
/// connection to `:memory:` is its own database.
pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Arc<SqlitePool>> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
    if !in_memory {
        let db_path = database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:")
            .trim_start_matches("file:");
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                tracing::info!("Created missing directory {:?}", parent);
            }
        }
    }

    let pool = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?
    };

    Ok(Arc::new(pool))
}

/// Apply the embedded `migrations/` to `pool`.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// In-memory pool with migrations applied, for tests.
#[cfg(test)]
pub(crate) async fn test_pool() -> Arc<SqlitePool> {
    let pool = connect("sqlite::memory:", 1).await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}
