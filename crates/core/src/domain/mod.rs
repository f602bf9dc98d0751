// Domain Layer - Pure business logic and entities

pub mod config;
pub mod error;
pub mod job;

// Re-exports
pub use config::{
    ConfigRecord, ConfigSnapshot, HttpParams, IdentitySecrets, MailParams, OAuthProvider,
    RateLimitParams, SchedulerParams, LATEST_GENERATION,
};
pub use error::DomainError;
pub use job::{Job, JobId, JobStatus, JobType, NewJob};
