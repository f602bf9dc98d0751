// Job handler port

use crate::domain::Job;
use crate::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Carries cancellation and deadline information down to a handler
/// invocation, mirroring the cancellation context tree: supervisor -> scheduler -> batch
/// group -> per-job timeout.
#[derive(Clone)]
pub struct JobContext {
    pub cancellation: CancellationToken,
}

impl JobContext {
    pub fn new(cancellation: CancellationToken) -> Self {
        Self { cancellation }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// An opaque handler registered against a `job_type` tag. Handlers are
/// intentionally unspecified beyond this boundary ("specific job
/// handlers... treated as opaque functions").
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, ctx: JobContext, job: &Job) -> Result<()>;
}
