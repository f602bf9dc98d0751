//! `sqlx::Error` -> `AppError` classification.
//!
//! A single SQLite error-code classifier (UNIQUE/FK/BUSY/FULL) shared
//! by both the job queue and the config store since both live in this
//! crate and share one pool.

use ripcore_core::error::{AppError, StorageError};

pub fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();
                let message = match code_str {
                    // https://www.sqlite.org/rescode.html
                    "2067" | "1555" => format!("unique constraint violation: {}", db_err.message()),
                    "787" | "3850" => format!("foreign key violation: {}", db_err.message()),
                    "5" => format!("database locked (SQLITE_BUSY): {}", db_err.message()),
                    "13" => format!("database full: {}", db_err.message()),
                    _ => format!("database error [{code_str}]: {}", db_err.message()),
                };
                AppError::Storage(StorageError::QueryFailed(message))
            } else {
                AppError::Storage(StorageError::QueryFailed(db_err.message().to_string()))
            }
        }
        sqlx::Error::RowNotFound => {
            AppError::Storage(StorageError::QueryFailed("row not found".to_string()))
        }
        other => AppError::Storage(StorageError::QueryFailed(other.to_string())),
    }
}
