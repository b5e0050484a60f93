// SQLite Connection Pool Setup

use garage_core::error::{AppError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::error::map_sqlx_error;

/// Create SQLite connection pool with WAL mode and foreign keys
///
/// In-memory databases get a single connection: every new connection to
/// `sqlite::memory:` would otherwise open its own empty database.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let in_memory = database_url.contains(":memory:");

    let mut options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| AppError::Config(format!("Invalid database URL {}: {}", database_url, e)))?
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true)
        .create_if_missing(true);
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { 10 })
        .connect_with(options)
        .await
        .map_err(map_sqlx_error)?;

    Ok(pool)
}
