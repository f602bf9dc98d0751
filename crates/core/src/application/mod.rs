// Application Layer - Use Cases and Business Logic

pub mod admin_ops;
pub mod config_provider;
pub mod executor;
pub mod scheduler;
pub mod supervisor;

// Re-exports
pub use config_provider::ConfigProvider;
pub use executor::ExecutorRegistry;
pub use scheduler::{Scheduler, SchedulerDaemon, SnapshotSource};
pub use supervisor::{
    Daemon, ExitFn, HttpHandler, ReloadCallback, SignalSource, Supervisor, SupervisorSignal,
};
