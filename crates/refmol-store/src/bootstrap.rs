//! Database bootstrap: pool construction and migrations.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::{StoreError, StoreResult};

/// Embedded migrations for the curated-store schema.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Connect a pool to the curated store.
pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await
        .map_err(StoreError::ConnectionFailed)
}

/// Apply pending migrations.
pub async fn run_migrations(pool: &PgPool) -> StoreResult<()> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(StoreError::MigrationFailed)?;
    tracing::debug!("curated-store migrations applied");
    Ok(())
}
