use crate::domain::entities::SyncAttempt;
use crate::domain::value_objects::FailureKind;
use chrono::{DateTime, Utc};
use std::time::Duration;

const MAX_DOUBLINGS: u32 = 16;

/// Per-item exponential backoff for submissions the server rejected.
///
/// Transient failures are never deferred; they are retried on the next pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base: Duration,
    max: Duration,
}

impl RetryPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }

    /// Retries rejected items on every pass.
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn backoff_for(&self, attempts: u32) -> Duration {
        if attempts == 0 {
            return Duration::ZERO;
        }
        let doublings = (attempts - 1).min(MAX_DOUBLINGS);
        self.base.saturating_mul(1u32 << doublings).min(self.max)
    }

    pub fn next_eligible_at(&self, attempt: &SyncAttempt) -> Option<DateTime<Utc>> {
        if attempt.last_error_kind != Some(FailureKind::Rejected) {
            return None;
        }
        let last = attempt.last_attempt_at?;
        let backoff = chrono::Duration::from_std(self.backoff_for(attempt.attempt_count)).ok()?;
        Some(last + backoff)
    }

    pub fn is_deferred(&self, attempt: &SyncAttempt, now: DateTime<Utc>) -> bool {
        self.next_eligible_at(attempt)
            .map(|eligible| eligible > now)
            .unwrap_or(false)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), Duration::from_secs(3_600))
    }
}
