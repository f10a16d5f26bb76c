//! Postgres adapters.
//!
//! Every query is a plain `sqlx::query` with positional binds; rows are decoded
//! through small `FromRow` structs and converted into domain types, so a
//! malformed stored value surfaces as `RepositoryError::Storage` instead of a
//! panic.
//!
//! Multi-row writes (`apply_movements`, `complete_batch`) run in one
//! transaction and lock the touched item rows with `SELECT ... FOR UPDATE`.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{RepositoryError, RepositoryResult, map_sqlx_error};

mod inventory;
mod notifications;
mod users;
mod worklogs;

pub use inventory::PostgresInventoryRepository;
pub use notifications::PostgresNotificationRepository;
pub use users::PostgresUserDirectory;
pub use worklogs::PostgresWorkLogRepository;

const SCHEMA: &str = include_str!("../../../migrations/0001_init.sql");

/// Open a pool for `cfg.url` and apply the schema when enabled.
pub async fn connect(cfg: &DatabaseConfig) -> RepositoryResult<PgPool> {
    let url = cfg
        .url
        .as_deref()
        .ok_or_else(|| RepositoryError::storage("database.url is not configured"))?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .connect(url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))?;

    if cfg.run_migrations {
        migrate(&pool).await?;
    }
    Ok(pool)
}

/// Apply the bundled schema. Statements are idempotent (`IF NOT EXISTS`).
pub async fn migrate(pool: &PgPool) -> RepositoryResult<()> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("migrate", e))?;
    info!("database schema applied");
    Ok(())
}

/// Decode failure for a stored value that no longer satisfies the domain.
pub(crate) fn corrupt(what: &str, err: impl core::fmt::Display) -> RepositoryError {
    RepositoryError::Storage(format!("failed to decode {what} row: {err}"))
}
