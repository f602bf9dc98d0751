//! Job executor - job_type -> handler dispatch table

use crate::domain::{Job, JobType};
use crate::error::{AppError, JobRuntimeError, Result};
use crate::port::{JobContext, JobHandler};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Concurrent-safe mapping from `job_type` to handler capability.
/// Registration is additive and last-write-wins; it is not expected to
/// race with `execute` once the supervisor has finished startup.
pub struct ExecutorRegistry {
    handlers: RwLock<HashMap<JobType, Arc<dyn JobHandler>>>,
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Adds or replaces the handler for `job_type` (last-write-wins).
    pub fn register(&self, job_type: JobType, handler: Arc<dyn JobHandler>) {
        self.handlers
            .write()
            .expect("executor registry lock poisoned")
            .insert(job_type, handler);
    }

    /// Looks up the handler for `job.job_type` and invokes it, propagating
    /// `ctx` (cancellation). Returns `JobRuntimeError::UnknownJobType` when
    /// no handler is registered.
    pub async fn execute(&self, ctx: JobContext, job: &Job) -> Result<()> {
        let handler = {
            let handlers = self.handlers.read().expect("executor registry lock poisoned");
            handlers.get(&job.job_type).cloned()
        };

        match handler {
            Some(handler) => handler.handle(ctx, job).await,
            None => Err(AppError::JobRuntime(JobRuntimeError::UnknownJobType(
                job.job_type.as_str().to_string(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;

    struct AlwaysOk;

    #[async_trait]
    impl JobHandler for AlwaysOk {
        async fn handle(&self, _ctx: JobContext, _job: &Job) -> Result<()> {
            Ok(())
        }
    }

    fn sample_job(job_type: &str) -> Job {
        Job {
            id: uuid::Uuid::new_v4(),
            job_type: JobType::new(job_type),
            payload: Vec::new(),
            payload_extra: Vec::new(),
            status: crate::domain::JobStatus::Processing,
            attempts: 1,
            max_attempts: 3,
            scheduled_for: Utc::now(),
            interval_secs: 0,
            recurrent: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            locked_at: Some(Utc::now()),
            completed_at: None,
            locked_by: "worker-1".to_string(),
            last_error: String::new(),
        }
    }

    #[tokio::test]
    async fn unregistered_job_type_is_an_unknown_type_error() {
        let registry = ExecutorRegistry::new();
        let job = sample_job("noop");
        let ctx = JobContext::new(tokio_util::sync::CancellationToken::new());

        let err = registry.execute(ctx, &job).await.unwrap_err();
        match err {
            AppError::JobRuntime(JobRuntimeError::UnknownJobType(t)) => assert_eq!(t, "noop"),
            other => panic!("expected UnknownJobType, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn registration_is_last_write_wins() {
        let registry = ExecutorRegistry::new();
        registry.register(JobType::new("noop"), Arc::new(AlwaysOk));
        registry.register(JobType::new("noop"), Arc::new(AlwaysOk));

        let job = sample_job("noop");
        let ctx = JobContext::new(tokio_util::sync::CancellationToken::new());
        registry.execute(ctx, &job).await.unwrap();
    }
}
