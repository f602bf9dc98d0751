//! Embedded migration runner.
//!
//! A `schema_version`-tracked, `include_str!`-embedded sequence of SQL
//! files executed inside a transaction, applied in lexicographic
//! filename order so a new migration only needs a correctly-named file.

use ripcore_core::error::{AppError, Result, StorageError};
use sqlx::SqlitePool;
use tracing::info;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

// Lexicographic order matches the filenames themselves.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "001_jobs.sql",
        sql: include_str!("../migrations/001_jobs.sql"),
    },
    Migration {
        name: "002_config.sql",
        sql: include_str!("../migrations/002_config.sql"),
    },
];

/// Returns true if migrations have already been applied (used by
/// `app create` to reject re-creation).
pub async fn schema_already_initialized(pool: &SqlitePool) -> Result<bool> {
    let table_exists: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_migrations'",
    )
    .fetch_one(pool)
    .await
    .map_err(|e| AppError::Storage(StorageError::QueryFailed(e.to_string())))?;

    if table_exists == 0 {
        return Ok(false);
    }

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::Storage(StorageError::QueryFailed(e.to_string())))?;

    Ok(applied > 0)
}

/// Apply every embedded migration not yet recorded in `schema_migrations`,
/// in lexicographic filename order, each inside its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (name TEXT PRIMARY KEY, applied_at TEXT NOT NULL)",
    )
    .execute(pool)
    .await
    .map_err(|e| AppError::Storage(StorageError::MigrationFailed(e.to_string())))?;

    for migration in MIGRATIONS {
        let already: Option<String> =
            sqlx::query_scalar("SELECT name FROM schema_migrations WHERE name = ?")
                .bind(migration.name)
                .fetch_optional(pool)
                .await
                .map_err(|e| AppError::Storage(StorageError::MigrationFailed(e.to_string())))?;

        if already.is_some() {
            continue;
        }

        info!(migration = migration.name, "applying migration");
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| AppError::Storage(StorageError::MigrationFailed(e.to_string())))?;

        for statement in migration.sql.split(';') {
            let clean: String = statement
                .lines()
                .filter(|line| !line.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string();

            if clean.is_empty() {
                continue;
            }

            sqlx::query(&clean)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Storage(StorageError::MigrationFailed(e.to_string())))?;
        }

        sqlx::query("INSERT INTO schema_migrations (name, applied_at) VALUES (?, datetime('now'))")
            .bind(migration.name)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Storage(StorageError::MigrationFailed(e.to_string())))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Storage(StorageError::MigrationFailed(e.to_string())))?;
    }

    Ok(())
}
