use crate::domain::value_objects::SubmissionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedItem {
    pub item_id: SubmissionId,
    pub reason: String,
}

/// Outcome of one sync pass. Every snapshot item is succeeded, failed or not attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub succeeded: u32,
    pub failed: u32,
    pub total: u32,
    pub rejected: Vec<RejectedItem>,
    /// The pass stopped early because connectivity was lost.
    pub aborted_offline: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncSummary {
    pub fn not_attempted(&self) -> u32 {
        self.total.saturating_sub(self.succeeded + self.failed)
    }

    pub fn is_complete_success(&self) -> bool {
        self.succeeded == self.total
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub processed: u32,
    pub total: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_attempted_accounts_for_the_rest() {
        let now = Utc::now();
        let summary = SyncSummary {
            succeeded: 1,
            failed: 0,
            total: 3,
            rejected: vec![],
            aborted_offline: true,
            started_at: now,
            finished_at: now,
        };
        assert_eq!(summary.not_attempted(), 2);
        assert!(!summary.is_complete_success());
    }
}
