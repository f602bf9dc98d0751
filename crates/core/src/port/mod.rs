// Port Layer - Interfaces for external dependencies

pub mod config_store;
pub mod id_provider;
pub mod job_handler;
pub mod job_queue;
pub mod time_provider;

// Re-exports
pub use config_store::SecureConfigStore;
pub use id_provider::{IdProvider, UuidProvider};
pub use job_handler::{JobContext, JobHandler};
pub use job_queue::JobQueue;
pub use time_provider::TimeProvider;

#[cfg(feature = "mocks")]
pub use config_store::MockSecureConfigStore;
#[cfg(feature = "mocks")]
pub use job_queue::MockJobQueue;
