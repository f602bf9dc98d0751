//! End-to-end scheduler scenarios driven against a real SQLite-backed
//! queue and a real `Scheduler` tick loop, not the in-process unit
//! doubles in `ripcore-core`'s own test modules.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use ripcore_core::application::{ConfigProvider, ExecutorRegistry, Scheduler};
use ripcore_core::domain::{ConfigSnapshot, Job, JobStatus, JobType, NewJob};
use ripcore_core::error::{AppError, JobRuntimeError, Result};
use ripcore_core::port::{JobContext, JobHandler, JobQueue};
use ripcore_sqlite::{create_pool, run_migrations, SqliteJobQueue};
use std::sync::Arc;
use std::time::Duration as StdDuration;

fn fast_snapshot(job_timeout: StdDuration) -> ConfigSnapshot {
    let mut snapshot = ConfigSnapshot::default();
    snapshot.scheduler.tick_interval = StdDuration::from_millis(20);
    snapshot.scheduler.max_jobs_per_tick = 10;
    snapshot.scheduler.concurrency_multiplier = 2;
    snapshot.scheduler.job_timeout = job_timeout;
    snapshot
}

async fn setup_queue() -> Arc<SqliteJobQueue> {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    let time = Arc::new(ripcore_core::port::time_provider::SystemTimeProvider);
    Arc::new(SqliteJobQueue::new(pool, time))
}

struct AlwaysOk;

#[async_trait]
impl JobHandler for AlwaysOk {
    async fn handle(&self, _ctx: JobContext, _job: &Job) -> Result<()> {
        Ok(())
    }
}

/// Ignores cancellation entirely so the per-job timeout is the only way
/// the scheduler can observe a deadline-exceeded outcome.
struct SlowHandler {
    sleep_for: StdDuration,
}

#[async_trait]
impl JobHandler for SlowHandler {
    async fn handle(&self, _ctx: JobContext, _job: &Job) -> Result<()> {
        tokio::time::sleep(self.sleep_for).await;
        Ok(())
    }
}

struct AlwaysCanceled;

#[async_trait]
impl JobHandler for AlwaysCanceled {
    async fn handle(&self, _ctx: JobContext, _job: &Job) -> Result<()> {
        Err(AppError::JobRuntime(JobRuntimeError::Canceled))
    }
}

/// One-shot job happy path: after the scheduler observes the job it
/// completes, and a subsequent claim sees nothing left to do.
#[tokio::test]
async fn one_shot_job_completes_and_drains() {
    let queue = setup_queue().await;
    let now = Utc::now();
    queue
        .insert(NewJob::one_shot(JobType::new("noop"), Vec::new(), now - Duration::seconds(1)))
        .await
        .unwrap();

    let executor = Arc::new(ExecutorRegistry::new());
    executor.register(JobType::new("noop"), Arc::new(AlwaysOk));

    let provider = Arc::new(ConfigProvider::new(fast_snapshot(StdDuration::from_secs(5))));
    let scheduler = Arc::new(Scheduler::new(queue.clone(), executor, provider, "worker-test"));

    let handle = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    };

    tokio::time::sleep(StdDuration::from_millis(150)).await;
    scheduler.stop(StdDuration::from_secs(2)).await.unwrap();
    handle.abort();

    let jobs = queue.list(10).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Completed);

    let empty = queue.claim(10, "worker-test").await.unwrap();
    assert!(empty.is_empty());
}

/// Recurrent job reschedules: exactly one pending successor appears,
/// anchored on the prior `scheduled_for` plus the interval, and the
/// original transitions to completed.
#[tokio::test]
async fn recurrent_job_produces_one_successor_anchored_on_prior_schedule() {
    let queue = setup_queue().await;
    let t = Utc::now() - Duration::seconds(1);
    let original = queue
        .insert(NewJob::recurrent(JobType::new("tick"), t, Duration::seconds(60), 3).unwrap())
        .await
        .unwrap();

    let executor = Arc::new(ExecutorRegistry::new());
    executor.register(JobType::new("tick"), Arc::new(AlwaysOk));

    let provider = Arc::new(ConfigProvider::new(fast_snapshot(StdDuration::from_secs(5))));
    let scheduler = Arc::new(Scheduler::new(queue.clone(), executor, provider, "worker-test"));

    let handle = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    };
    tokio::time::sleep(StdDuration::from_millis(150)).await;
    scheduler.stop(StdDuration::from_secs(2)).await.unwrap();
    handle.abort();

    let jobs = queue.list(10).await.unwrap();
    assert_eq!(jobs.len(), 2, "exactly one successor, no catch-up coalescing");

    let completed = jobs.iter().find(|j| j.id == original.id).unwrap();
    assert_eq!(completed.status, JobStatus::Completed);

    let successor = jobs.iter().find(|j| j.id != original.id).unwrap();
    assert_eq!(successor.status, JobStatus::Pending);
    assert!(successor.recurrent);
    assert_eq!(successor.interval_secs, 60);
    assert_eq!(successor.scheduled_for, t + Duration::seconds(60));
    assert_eq!(successor.created_at, original.created_at, "audit trail preserves original creation time");
}

/// Handler timeout: a handler that outlives the per-job timeout
/// fails with `"job execution timed out"` and is retried until
/// `max_attempts` is exhausted, then transitions to `failed`.
#[tokio::test]
async fn slow_handler_retries_then_fails_on_timeout() {
    let queue = setup_queue().await;
    let now = Utc::now();
    let job = queue
        .insert(NewJob {
            job_type: JobType::new("slow"),
            payload: Vec::new(),
            payload_extra: Vec::new(),
            max_attempts: 2,
            scheduled_for: now - Duration::seconds(1),
            interval_secs: 0,
            created_at: None,
        })
        .await
        .unwrap();

    let executor = Arc::new(ExecutorRegistry::new());
    executor.register(
        JobType::new("slow"),
        Arc::new(SlowHandler { sleep_for: StdDuration::from_millis(500) }),
    );

    // job_timeout << handler sleep time, tick_interval << job_timeout, so
    // two ticks happen well before the handler would ever finish.
    let provider = Arc::new(ConfigProvider::new(fast_snapshot(StdDuration::from_millis(50))));
    let scheduler = Arc::new(Scheduler::new(queue.clone(), executor, provider, "worker-test"));

    let handle = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    };

    tokio::time::sleep(StdDuration::from_millis(120)).await;
    let after_first_tick = queue.list(10).await.unwrap();
    let observed = after_first_tick.iter().find(|j| j.id == job.id).unwrap();
    assert_eq!(observed.status, JobStatus::Pending);
    assert_eq!(observed.attempts, 1);
    assert_eq!(observed.last_error, "job execution timed out");

    tokio::time::sleep(StdDuration::from_millis(150)).await;
    scheduler.stop(StdDuration::from_secs(2)).await.unwrap();
    handle.abort();

    let after_second_tick = queue.list(10).await.unwrap();
    let observed = after_second_tick.iter().find(|j| j.id == job.id).unwrap();
    assert_eq!(observed.status, JobStatus::Failed);
    assert_eq!(observed.attempts, 2);
}

/// A handler error that is itself `JobRuntimeError::Canceled` (e.g. a
/// handler observing its own context) is recorded with the cancellation
/// message distinct from a timeout.
#[tokio::test]
async fn handler_reported_cancellation_is_recorded_distinctly_from_timeout() {
    let queue = setup_queue().await;
    let now = Utc::now();
    queue
        .insert(NewJob {
            job_type: JobType::new("canceled"),
            payload: Vec::new(),
            payload_extra: Vec::new(),
            max_attempts: 5,
            scheduled_for: now - Duration::seconds(1),
            interval_secs: 0,
            created_at: None,
        })
        .await
        .unwrap();

    let executor = Arc::new(ExecutorRegistry::new());
    executor.register(JobType::new("canceled"), Arc::new(AlwaysCanceled));

    let provider = Arc::new(ConfigProvider::new(fast_snapshot(StdDuration::from_secs(5))));
    let scheduler = Arc::new(Scheduler::new(queue.clone(), executor, provider, "worker-test"));

    let handle = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    };
    tokio::time::sleep(StdDuration::from_millis(150)).await;
    scheduler.stop(StdDuration::from_secs(2)).await.unwrap();
    handle.abort();

    let jobs = queue.list(10).await.unwrap();
    assert_eq!(jobs[0].status, JobStatus::Pending);
    assert_eq!(jobs[0].last_error, "job execution canceled");
}

/// Two concurrent `claim` calls never return intersecting batches, and
/// every claimed job is already `processing` in the store by the time
/// its snapshot is handed back.
#[tokio::test]
async fn concurrent_claims_never_intersect() {
    let queue = setup_queue().await;
    let now = Utc::now();
    for i in 0..20 {
        queue
            .insert(NewJob::one_shot(
                JobType::new("noop"),
                Vec::new(),
                now - Duration::seconds(20 - i),
            ))
            .await
            .unwrap();
    }

    let (batch_a, batch_b) = tokio::join!(queue.claim(10, "a"), queue.claim(10, "b"));
    let batch_a = batch_a.unwrap();
    let batch_b = batch_b.unwrap();

    assert_eq!(batch_a.len() + batch_b.len(), 20);
    let ids_a: std::collections::HashSet<_> = batch_a.iter().map(|j| j.id).collect();
    let ids_b: std::collections::HashSet<_> = batch_b.iter().map(|j| j.id).collect();
    assert!(ids_a.is_disjoint(&ids_b));

    for job in batch_a.iter().chain(batch_b.iter()) {
        assert_eq!(job.status, JobStatus::Processing);
    }
}

/// When more jobs are due than `max_jobs_per_tick`, exactly that many
/// are claimed in one call.
#[tokio::test]
async fn claim_respects_max_jobs_per_tick() {
    let queue = setup_queue().await;
    let now = Utc::now();
    for i in 0..7 {
        queue
            .insert(NewJob::one_shot(JobType::new("noop"), Vec::new(), now - Duration::seconds(7 - i)))
            .await
            .unwrap();
    }

    let batch = queue.claim(3, "worker-test").await.unwrap();
    assert_eq!(batch.len(), 3);
    let remaining = queue.list(10).await.unwrap();
    assert_eq!(remaining.iter().filter(|j| j.status == JobStatus::Pending).count(), 4);
}
