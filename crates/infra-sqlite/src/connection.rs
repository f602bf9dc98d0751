//! SQLite connection pool setup.
//!
//! WAL journal mode, an env-configurable pool size/busy-timeout, and
//! foreign keys enabled unconditionally.

use ripcore_core::error::{AppError, Result, StorageError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// # Configuration
/// - `RIPCORE_POOL_SIZE`: max connections (default: 10)
/// - `RIPCORE_POOL_TIMEOUT`: busy-timeout in seconds (default: 5)
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let max_connections: u32 = std::env::var("RIPCORE_POOL_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);

    let busy_timeout_secs: u64 = std::env::var("RIPCORE_POOL_TIMEOUT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| AppError::Storage(StorageError::ConnectionFailed(e.to_string())))?
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(busy_timeout_secs))
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(|e| AppError::Storage(StorageError::PoolCreation(e.to_string())))?;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .map_err(|e| AppError::Storage(StorageError::ConnectionFailed(e.to_string())))?;

    Ok(pool)
}
