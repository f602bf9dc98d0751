// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("invalid job state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("invalid generation: {0}")]
    InvalidGeneration(i64),

    #[error("{0}")]
    ValidationError(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
