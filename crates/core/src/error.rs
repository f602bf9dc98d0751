// Central Error Type for the Application
//
// Seven kinds, matching the taxonomy each component's failure modes are
// classified into: input-validation, state, storage, crypto, serialisation,
// job-runtime, output.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("missing argument: {0}")]
    MissingArgument(String),
    #[error("too many arguments")]
    TooManyArguments,
    #[error("invalid flag: {0}")]
    InvalidFlag(String),
    #[error("not a number: {0}")]
    NotANumber(String),
    #[error("missing command")]
    MissingCommand,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("max_attempts must be >= 1")]
    InvalidMaxAttempts,
    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum StateError {
    #[error("database file not found: {0}")]
    DatabaseNotFound(String),
    #[error("database already exists: {0}")]
    DatabaseAlreadyExists(String),
    #[error("scope not found: {0}")]
    ScopeNotFound(String),
    #[error("oauth provider already exists: {0}")]
    ProviderAlreadyExists(String),
    #[error("oauth provider not found: {0}")]
    ProviderNotFound(String),
    #[error("path not found in config: {0}")]
    PathNotFound(String),
    #[error("invalid generation: {0}")]
    InvalidGeneration(i64),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to create pool: {0}")]
    PoolCreation(String),
    #[error("failed to open connection: {0}")]
    ConnectionFailed(String),
    #[error("query failed: {0}")]
    QueryFailed(String),
    #[error("migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("failed to read identity: {0}")]
    IdentityRead(String),
    #[error("failed to parse identity: {0}")]
    IdentityParse(String),
    #[error("unsupported identity type: {0}")]
    UnsupportedIdentity(String),
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
}

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("failed to marshal ({format}): {source}")]
    Marshal {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("failed to unmarshal ({format}): {source}")]
    Unmarshal {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Error, Debug)]
pub enum JobRuntimeError {
    #[error("unknown job type: {0}")]
    UnknownJobType(String),
    #[error("handler error: {0}")]
    HandlerError(String),
    #[error("job execution timed out")]
    DeadlineExceeded,
    #[error("job execution canceled")]
    Canceled,
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("failed to write to stdout: {0}")]
    Stdout(String),
    #[error("failed to write to file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Application-level error type. Each variant wraps one of the seven
/// distinguishable error kinds; `Display` renders the tagged message the
/// CLI prints as `Error: <tagged message>`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    State(#[from] StateError),

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Crypto(#[from] CryptoError),

    #[error("{0}")]
    Serialization(#[from] SerializationError),

    #[error("{0}")]
    JobRuntime(#[from] JobRuntimeError),

    #[error("{0}")]
    Output(#[from] OutputError),

    #[error("domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
