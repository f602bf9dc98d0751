//! Stub job handlers registered at startup.
//!
//! Handlers are an opaque collaborator: specific job handlers are
//! treated as opaque functions registered against job-type tags.
//! `ripcored` ships one concrete handler, `backup_local`, because
//! `AdminOps::add_backup_job` always targets that type and an
//! unregistered type would otherwise fail every tick with
//! `JobRuntimeError::UnknownJobType`. The handler itself does no real
//! backup work; a deployment wires in its own implementation by
//! registering a different `JobHandler` under the same type.

use async_trait::async_trait;
use ripcore_core::domain::Job;
use ripcore_core::error::Result;
use ripcore_core::port::{JobContext, JobHandler};
use tracing::info;

pub struct LoggingBackupHandler;

#[async_trait]
impl JobHandler for LoggingBackupHandler {
    async fn handle(&self, ctx: JobContext, job: &Job) -> Result<()> {
        if ctx.is_cancelled() {
            return Err(ripcore_core::error::AppError::JobRuntime(
                ripcore_core::error::JobRuntimeError::Canceled,
            ));
        }
        info!(job_id = %job.id, job_type = %job.job_type, "running stub backup_local handler");
        Ok(())
    }
}
