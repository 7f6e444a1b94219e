use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Client-owned transport state of a submission. Only ever moves `Local -> Synced`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Local,
    Synced,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Local => "local",
            SyncStatus::Synced => "synced",
        }
    }

    pub fn can_transition_to(&self, next: SyncStatus) -> bool {
        !matches!((self, next), (SyncStatus::Synced, SyncStatus::Local))
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(SyncStatus::Local),
            "synced" => Ok(SyncStatus::Synced),
            other => Err(format!("Unknown sync status: {other}")),
        }
    }
}
