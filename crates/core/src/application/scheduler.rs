//! Scheduler - periodic claim, bounded execution, outcome recording
//!
//! The hardest subsystem: a single control task owns a ticker; each tick
//! claims a bounded batch from the durable queue and runs it under a
//! bounded worker pool, classifying every outcome and recording the
//! resulting transition back onto the queue.

use crate::application::executor::ExecutorRegistry;
use crate::application::supervisor::Daemon;
use crate::domain::{ConfigSnapshot, Job, NewJob};
use crate::error::{AppError, JobRuntimeError};
use crate::port::{JobContext, JobQueue};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Current snapshot provider seam: the scheduler re-reads parameters every
/// tick rather than caching them, so a config reload takes effect on the
/// next tick without restarting the scheduler.
pub trait SnapshotSource: Send + Sync {
    fn current(&self) -> Arc<ConfigSnapshot>;
}

pub struct Scheduler {
    queue: Arc<dyn JobQueue>,
    executor: Arc<ExecutorRegistry>,
    snapshots: Arc<dyn SnapshotSource>,
    root_token: CancellationToken,
    worker_id: String,
    running: AtomicBool,
}

impl Scheduler {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        executor: Arc<ExecutorRegistry>,
        snapshots: Arc<dyn SnapshotSource>,
        worker_id: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            executor,
            snapshots,
            root_token: CancellationToken::new(),
            worker_id: worker_id.into(),
            running: AtomicBool::new(false),
        }
    }

    /// Run the tick loop until `stop` is called. Matches the Daemon
    /// lifecycle's `start()` contract: returns once cancelled.
    pub async fn run(&self) -> crate::error::Result<()> {
        self.running.store(true, Ordering::SeqCst);
        info!("scheduler started");

        // The ticker is built once and kept across iterations: a new
        // `tokio::time::interval` always fires its first tick immediately,
        // so rebuilding it every loop iteration would turn this into a
        // busy loop instead of honoring `tick_interval`. It is only
        // rebuilt when a config reload actually changes the interval.
        let mut current_interval = self.snapshots.current().scheduler.tick_interval;
        let mut ticker = tokio::time::interval(current_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.root_token.cancelled() => {
                    info!("scheduler stopping");
                    break;
                }
            }

            let snapshot = self.snapshots.current();
            if snapshot.scheduler.tick_interval != current_interval {
                current_interval = snapshot.scheduler.tick_interval;
                ticker = tokio::time::interval(current_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            }

            if let Err(e) = self.run_tick().await {
                error!(err = %e, "scheduler tick failed");
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("scheduler stopped");
        Ok(())
    }

    /// Cancel the scheduler's root context and wait for the current batch
    /// to drain, bounded by the caller's context deadline.
    pub async fn stop(&self, timeout: std::time::Duration) -> crate::error::Result<()> {
        self.root_token.cancel();
        let deadline = tokio::time::Instant::now() + timeout;
        while self.running.load(Ordering::SeqCst) {
            if tokio::time::Instant::now() >= deadline {
                warn!("scheduler stop timed out waiting for batch to drain");
                return Ok(());
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        Ok(())
    }

    async fn run_tick(&self) -> crate::error::Result<()> {
        let snapshot = self.snapshots.current();
        let batch = self
            .queue
            .claim(snapshot.scheduler.max_jobs_per_tick, &self.worker_id)
            .await?;

        if batch.is_empty() {
            return Ok(());
        }

        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let concurrency = (cpu_count * snapshot.scheduler.concurrency_multiplier as usize).max(1);
        let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency));
        let group_token = self.root_token.child_token();
        let job_timeout = snapshot.scheduler.job_timeout;

        let mut joinset: JoinSet<()> = JoinSet::new();
        for job in batch {
            let permit = Arc::clone(&semaphore);
            let executor = Arc::clone(&self.executor);
            let queue = Arc::clone(&self.queue);
            let job_token = group_token.child_token();

            joinset.spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore closed");
                process_claimed_job(queue, executor, job, job_token, job_timeout).await;
            });
        }

        while joinset.join_next().await.is_some() {}
        Ok(())
    }
}

async fn process_claimed_job(
    queue: Arc<dyn JobQueue>,
    executor: Arc<ExecutorRegistry>,
    job: Job,
    token: CancellationToken,
    timeout: std::time::Duration,
) {
    let ctx = JobContext::new(token.clone());
    let job_id = job.id;

    let outcome = tokio::select! {
        result = tokio::time::timeout(timeout, executor.execute(ctx, &job)) => {
            match result {
                Ok(inner) => Outcome::from_handler_result(inner),
                Err(_elapsed) => Outcome::TimedOut,
            }
        }
        _ = token.cancelled() => Outcome::Canceled,
    };

    let record_result = match outcome {
        Outcome::Success if job.recurrent => {
            let next = build_successor(&job);
            queue.mark_recurrent_completed(job_id, next).await.map(|_| ())
        }
        Outcome::Success => queue.mark_completed(job_id).await,
        Outcome::TimedOut => queue.mark_failed(job_id, "job execution timed out").await,
        Outcome::Canceled => queue.mark_failed(job_id, "job execution canceled").await,
        Outcome::Error(ref e) => queue.mark_failed(job_id, &e.to_string()).await,
    };

    if let Err(e) = record_result {
        // The job remains in `processing` and is reclaimed after restart
        // (at-least-once semantics).
        error!(job_id = %job_id, job_type = %job.job_type, err = %e, "failed to record job outcome");
    }
}

enum Outcome {
    Success,
    TimedOut,
    Canceled,
    Error(AppError),
}

impl Outcome {
    fn from_handler_result(result: crate::error::Result<()>) -> Self {
        match result {
            Ok(()) => Outcome::Success,
            Err(AppError::JobRuntime(JobRuntimeError::Canceled)) => Outcome::Canceled,
            Err(AppError::JobRuntime(JobRuntimeError::DeadlineExceeded)) => Outcome::TimedOut,
            Err(e) => Outcome::Error(e),
        }
    }
}

/// Build the recurrent successor of a completed job. The
/// successor's schedule is anchored on the prior schedule, not completion
/// time, so a late-running scheduler produces an immediately-claimable
/// successor rather than catching up on missed intervals.
pub fn build_successor(job: &Job) -> NewJob {
    debug_assert!(job.interval_secs > 0, "recurrent job must carry a positive interval");
    let next_scheduled_for = job.scheduled_for + job.interval();

    let payload = serde_json::to_vec(&serde_json::json!({
        "scheduled_for": next_scheduled_for,
    }))
    .expect("recurrent successor payload is always representable as JSON");

    NewJob {
        job_type: job.job_type.clone(),
        payload,
        payload_extra: job.payload_extra.clone(),
        max_attempts: job.max_attempts,
        scheduled_for: next_scheduled_for,
        interval_secs: job.interval_secs,
        created_at: Some(job.created_at),
    }
}

/// Adapts `Scheduler` to the supervisor's `Daemon` contract: `start`
/// spawns the tick loop as a background task and returns immediately;
/// `stop` delegates to `Scheduler::stop`'s bounded drain.
pub struct SchedulerDaemon {
    scheduler: Arc<Scheduler>,
}

impl SchedulerDaemon {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Daemon for SchedulerDaemon {
    fn name(&self) -> &str {
        "scheduler"
    }

    async fn start(&self) -> crate::error::Result<()> {
        let scheduler = Arc::clone(&self.scheduler);
        tokio::spawn(async move {
            if let Err(e) = scheduler.run().await {
                error!(err = %e, "scheduler exited with error");
            }
        });
        Ok(())
    }

    async fn stop(&self, _ctx: CancellationToken, timeout: std::time::Duration) -> crate::error::Result<()> {
        self.scheduler.stop(timeout).await
    }
}
