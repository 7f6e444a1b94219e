use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Why the last push of a submission failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Network error or 5xx; eligible again on the next pass.
    Transient,
    /// Validation failure; waits for correction and is retried with backoff.
    Rejected,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transient => "transient",
            FailureKind::Rejected => "rejected",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FailureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transient" => Ok(FailureKind::Transient),
            "rejected" => Ok(FailureKind::Rejected),
            other => Err(format!("Unknown failure kind: {other}")),
        }
    }
}
