//! Connection pool + migration bootstrap. Grounded on
//! `crates/server/src/db.rs`'s `init_pg_pool` (connect, then run
//! `sqlx::migrate!`, masking the password in the startup log line).

use kb_core::config::PostgresConfig;
use sqlx::PgPool;
use tracing::info;

use crate::error::StoreError;

/// Connect to Postgres and apply pending migrations from the workspace
/// `migrations/` directory. A migration failure is a startup error — unlike
/// the runtime Fingerprint/Atom operations, this one is allowed to be fatal
/// because it only runs once, before any session work.
pub async fn connect(config: &PostgresConfig) -> Result<PgPool, StoreError> {
    let url = config.connection_string();
    info!(host = %config.host, database = %config.database, "connecting to postgres");
    let pool = PgPool::connect(&url).await?;
    sqlx::migrate!("../../migrations").run(&pool).await.map_err(|e| {
        StoreError::Database(sqlx::Error::Migrate(Box::new(e)))
    })?;
    info!("database migrations applied");
    Ok(pool)
}
