// Job Domain Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job ID (UUID v4)
pub type JobId = uuid::Uuid;

/// Job status. Transitions are described in the scheduler (application layer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Job type tag (opaque, selects an executor handler).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobType(String);

impl JobType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A durable unit of work: one-shot or recurrent.
///
/// `id` is immutable once assigned; every other field mutates only through
/// the claim/complete/fail transitions owned by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: JobType,
    pub payload: Vec<u8>,
    pub payload_extra: Vec<u8>,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub scheduled_for: DateTime<Utc>,
    /// Zero for one-shot jobs; strictly positive (seconds) for recurrent jobs.
    pub interval_secs: i64,
    pub recurrent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub locked_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub locked_by: String,
    pub last_error: String,
}

impl Job {
    pub fn interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.interval_secs)
    }
}

/// Fields required to insert a new job; the queue assigns `id`, `status`,
/// `attempts`, `updated_at`, and (absent an explicit `created_at`) stamps
/// `created_at` with the insert-time "now".
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_type: JobType,
    pub payload: Vec<u8>,
    pub payload_extra: Vec<u8>,
    pub max_attempts: i32,
    pub scheduled_for: DateTime<Utc>,
    /// Zero for one-shot jobs; strictly positive (seconds) for recurrent jobs.
    pub interval_secs: i64,
    /// Set by `Scheduler::build_successor` to preserve a recurrent job's
    /// original creation time across re-enqueues (§4.5.1: "original
    /// creation preserved for audit"). `None` means stamp with "now".
    pub created_at: Option<DateTime<Utc>>,
}

impl NewJob {
    pub fn one_shot(job_type: JobType, payload: Vec<u8>, scheduled_for: DateTime<Utc>) -> Self {
        Self {
            job_type,
            payload,
            payload_extra: Vec::new(),
            max_attempts: 3,
            scheduled_for,
            interval_secs: 0,
            created_at: None,
        }
    }

    /// Returns a validation error if `interval` is not strictly positive,
    /// rather than panicking on caller-supplied input.
    pub fn recurrent(
        job_type: JobType,
        scheduled_for: DateTime<Utc>,
        interval: chrono::Duration,
        max_attempts: i32,
    ) -> Result<Self, crate::error::ValidationError> {
        if interval <= chrono::Duration::zero() {
            return Err(crate::error::ValidationError::Other(
                "recurrent jobs require interval > 0".to_string(),
            ));
        }
        Ok(Self {
            job_type,
            payload: Vec::new(),
            payload_extra: Vec::new(),
            max_attempts,
            scheduled_for,
            interval_secs: interval.num_seconds(),
            created_at: None,
        })
    }

    pub fn is_recurrent(&self) -> bool {
        self.interval_secs > 0
    }
}

impl Job {
    /// Is this job eligible for `claim` right now?
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending
            && self.scheduled_for <= now
            && self.attempts < self.max_attempts
    }
}
