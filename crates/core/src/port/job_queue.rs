// Durable queue port

use crate::domain::{Job, JobId, NewJob};
use crate::error::Result;
use async_trait::async_trait;

/// The durable, transactional job queue. All mutual exclusion between
/// concurrent claimers is delegated to the implementation's storage layer
/// (no explicit locks in the scheduler).
#[cfg_attr(feature = "mocks", mockall::automock)]
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Append a new job with `status = pending`, `attempts = 0`.
    async fn insert(&self, job: NewJob) -> Result<Job>;

    /// Atomically select up to `limit` claimable jobs (the claimable
    /// predicate), transition each to `processing`, increment `attempts`,
    /// stamp `locked_at`/`locked_by`, and return their post-claim snapshots.
    ///
    /// Tie-break when more than `limit` jobs are claimable: earliest
    /// `scheduled_for`, then smallest `id`. Two concurrent `claim` calls
    /// never return intersecting batches.
    async fn claim(&self, limit: u32, locked_by: &str) -> Result<Vec<Job>>;

    /// Transition `processing -> completed`, set `completed_at`.
    async fn mark_completed(&self, id: JobId) -> Result<()>;

    /// Atomic: transition `id` to `completed` AND insert `next`. If either
    /// step fails, neither takes effect.
    async fn mark_recurrent_completed(&self, id: JobId, next: NewJob) -> Result<Job>;

    /// Transition `processing -> pending` if `attempts < max_attempts`,
    /// else `processing -> failed`. Records `last_error`.
    async fn mark_failed(&self, id: JobId, error_message: &str) -> Result<()>;

    /// Admin: list up to `limit` jobs, most recently created first.
    async fn list(&self, limit: u32) -> Result<Vec<Job>>;

    /// Admin: remove a job outright.
    async fn delete(&self, id: JobId) -> Result<()>;
}
