use crate::domain::entities::SyncSummary;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    Clean,
    Partial,
    Error,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetricsSnapshot {
    pub total_passes: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
    pub consecutive_unclean_passes: u64,
    pub last_clean_ms: Option<u64>,
    pub last_unclean_ms: Option<u64>,
    pub last_outcome: Option<PassOutcome>,
    pub last_total: Option<u32>,
    pub last_not_attempted: Option<u32>,
    pub last_duration_ms: Option<u64>,
    pub last_error: Option<String>,
}

#[derive(Default, Clone)]
struct LastPass {
    outcome: Option<PassOutcome>,
    total: Option<u32>,
    not_attempted: Option<u32>,
    duration_ms: Option<u64>,
    error: Option<String>,
}

/// Counters for the sync passes of one orchestrator instance.
pub struct SyncMetrics {
    passes: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    consecutive_unclean: AtomicU64,
    last_clean_ms: AtomicU64,
    last_unclean_ms: AtomicU64,
    last: Mutex<LastPass>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self {
            passes: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            consecutive_unclean: AtomicU64::new(0),
            last_clean_ms: AtomicU64::new(0),
            last_unclean_ms: AtomicU64::new(0),
            last: Mutex::new(LastPass::default()),
        }
    }

    pub fn record_pass(&self, summary: &SyncSummary) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.succeeded
            .fetch_add(summary.succeeded as u64, Ordering::Relaxed);
        self.failed.fetch_add(summary.failed as u64, Ordering::Relaxed);

        let outcome = if summary.is_complete_success() {
            PassOutcome::Clean
        } else {
            PassOutcome::Partial
        };
        self.mark(outcome);

        if let Ok(mut guard) = self.last.lock() {
            *guard = LastPass {
                outcome: Some(outcome),
                total: Some(summary.total),
                not_attempted: Some(summary.not_attempted()),
                duration_ms: Some(summary.duration_ms()),
                error: None,
            };
        }
    }

    pub fn record_error(&self, message: &str) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.mark(PassOutcome::Error);

        if let Ok(mut guard) = self.last.lock() {
            *guard = LastPass {
                outcome: Some(PassOutcome::Error),
                error: Some(message.to_string()),
                ..LastPass::default()
            };
        }
    }

    fn mark(&self, outcome: PassOutcome) {
        match outcome {
            PassOutcome::Clean => {
                self.last_clean_ms.store(current_unix_ms(), Ordering::Relaxed);
                self.consecutive_unclean.store(0, Ordering::Relaxed);
            }
            PassOutcome::Partial | PassOutcome::Error => {
                self.last_unclean_ms
                    .store(current_unix_ms(), Ordering::Relaxed);
                self.consecutive_unclean.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        let last = self
            .last
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default();

        SyncMetricsSnapshot {
            total_passes: self.passes.load(Ordering::Relaxed),
            total_succeeded: self.succeeded.load(Ordering::Relaxed),
            total_failed: self.failed.load(Ordering::Relaxed),
            consecutive_unclean_passes: self.consecutive_unclean.load(Ordering::Relaxed),
            last_clean_ms: to_option(self.last_clean_ms.load(Ordering::Relaxed)),
            last_unclean_ms: to_option(self.last_unclean_ms.load(Ordering::Relaxed)),
            last_outcome: last.outcome,
            last_total: last.total,
            last_not_attempted: last.not_attempted,
            last_duration_ms: last.duration_ms,
            last_error: last.error,
        }
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn to_option(value: u64) -> Option<u64> {
    if value == 0 {
        None
    } else {
        Some(value)
    }
}

fn current_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn summary(succeeded: u32, failed: u32, total: u32) -> SyncSummary {
        let now = Utc::now();
        SyncSummary {
            succeeded,
            failed,
            total,
            rejected: vec![],
            aborted_offline: false,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn record_clean_and_partial_passes() {
        let metrics = SyncMetrics::new();

        metrics.record_pass(&summary(2, 1, 3));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_passes, 1);
        assert_eq!(snapshot.total_succeeded, 2);
        assert_eq!(snapshot.total_failed, 1);
        assert_eq!(snapshot.consecutive_unclean_passes, 1);
        assert_eq!(snapshot.last_outcome, Some(PassOutcome::Partial));

        metrics.record_error("offline");
        assert_eq!(metrics.snapshot().consecutive_unclean_passes, 2);
        assert_eq!(metrics.snapshot().last_error.as_deref(), Some("offline"));

        metrics.record_pass(&summary(1, 0, 1));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_passes, 3);
        assert_eq!(snapshot.consecutive_unclean_passes, 0);
        assert_eq!(snapshot.last_outcome, Some(PassOutcome::Clean));
        assert!(snapshot.last_clean_ms.is_some());
        assert_eq!(snapshot.last_not_attempted, Some(0));
    }
}
