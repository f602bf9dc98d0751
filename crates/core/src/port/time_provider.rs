// Time Provider Port (for testability)

use chrono::{DateTime, Utc};

/// Time provider interface (allows mocking in tests, e.g. to drive recurrent
/// job scheduling deterministically).
pub trait TimeProvider: Send + Sync {
    /// Get the current time. The queue uses a single logical "now" per
    /// transaction; callers should read this once per tick/claim.
    fn now(&self) -> DateTime<Utc>;
}

/// System time provider (production). Uses UTC as the clock source.
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
