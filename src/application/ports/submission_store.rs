use crate::domain::entities::{ImageBlob, Submission};
use crate::domain::value_objects::{
    FailureKind, ImageId, PhotoRef, SubmissionId, SyncStatus, UserId,
};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable client-side storage for submissions that are not yet acknowledged.
///
/// Listing operations return rows in insertion order. Writes to the same id
/// serialize with last-writer-wins semantics.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Inserts or overwrites by id. A `synced` row is never downgraded to `local`.
    /// Overwriting clears the attempt bookkeeping.
    async fn put(&self, submission: &Submission) -> Result<(), AppError>;
    async fn get(&self, id: &SubmissionId) -> Result<Submission, AppError>;
    async fn get_all_by_status(&self, status: SyncStatus) -> Result<Vec<Submission>, AppError>;
    async fn get_all_by_user(&self, user_id: &UserId) -> Result<Vec<Submission>, AppError>;
    async fn count_by_status(&self, status: SyncStatus) -> Result<u32, AppError>;
    async fn update_status(&self, id: &SubmissionId, status: SyncStatus) -> Result<(), AppError>;
    /// Flips the row to `synced` only while it still holds exactly what was pushed.
    /// Returns `false` when it was edited or synced in the meantime.
    async fn mark_synced_if_unchanged(&self, pushed: &Submission) -> Result<bool, AppError>;
    /// Swaps the photo list of a `local` row while it still equals `expected`.
    async fn replace_photo_proof(
        &self,
        id: &SubmissionId,
        expected: &[PhotoRef],
        replacement: &[PhotoRef],
    ) -> Result<bool, AppError>;
    async fn record_attempt_failure(
        &self,
        id: &SubmissionId,
        kind: FailureKind,
        reason: &str,
    ) -> Result<(), AppError>;
    /// Idempotent.
    async fn remove(&self, id: &SubmissionId) -> Result<(), AppError>;
    async fn put_image(&self, blob: &ImageBlob) -> Result<(), AppError>;
    async fn get_image(&self, id: &ImageId) -> Result<ImageBlob, AppError>;
    async fn remove_image(&self, id: &ImageId) -> Result<(), AppError>;
    async fn purge_synced(&self, older_than: DateTime<Utc>) -> Result<u64, AppError>;
    async fn close(&self);
}
