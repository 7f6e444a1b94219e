use crate::domain::entities::{ImageBlob, Submission};
use crate::domain::value_objects::{ImageId, SubmissionId, SubmissionStatus};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Network failure, timeout or 5xx. The submission is retried on a later pass.
    #[error("transient remote failure: {0}")]
    Transient(String),

    /// Validation failure (4xx). Needs user correction before it can succeed.
    #[error("submission {item_id} rejected: {reason}")]
    Rejected { item_id: String, reason: String },

    #[error("invalid remote response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAck {
    pub id: SubmissionId,
    pub status: SubmissionStatus,
}

/// Server-side write API for submissions.
///
/// Precondition relied upon by the sync service: `create_or_update_submission`
/// is an upsert keyed by `submission.id`. A crash between the push and the local
/// status update replays the same id on a later pass, which must not create a
/// second record.
#[async_trait]
pub trait RemoteSubmissionApi: Send + Sync {
    async fn create_or_update_submission(
        &self,
        submission: &Submission,
    ) -> Result<RemoteAck, RemoteError>;
}

/// Uploads queued photo blobs and returns their public URL.
#[async_trait]
pub trait PhotoUploader: Send + Sync {
    async fn upload(&self, id: &ImageId, blob: &ImageBlob) -> Result<String, RemoteError>;
}
