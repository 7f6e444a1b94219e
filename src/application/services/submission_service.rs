use crate::application::ports::SubmissionStore;
use crate::domain::entities::{ImageBlob, Submission, SubmissionDraft};
use crate::domain::value_objects::{ImageId, PhotoRef, SubmissionId, SyncStatus, UserId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const MAX_KEY_ISSUES_LEN: usize = 10_000;

#[async_trait]
pub trait SubmissionServiceTrait: Send + Sync {
    async fn create_submission(&self, draft: SubmissionDraft) -> Result<Submission, AppError>;
    async fn attach_photo(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<PhotoRef, AppError>;
    async fn get_submission(&self, id: &SubmissionId) -> Result<Submission, AppError>;
    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Submission>, AppError>;
    async fn pending_count(&self) -> Result<u32, AppError>;
    async fn delete_submission(&self, id: &SubmissionId) -> Result<(), AppError>;
}

/// Write side of the offline queue: everything captured in the field lands here first.
pub struct SubmissionService {
    store: Arc<dyn SubmissionStore>,
}

impl SubmissionService {
    pub fn new(store: Arc<dyn SubmissionStore>) -> Self {
        Self { store }
    }

    fn validate_draft(draft: &SubmissionDraft) -> Result<(), AppError> {
        if draft.community_group_type.trim().is_empty() {
            return Err(AppError::ValidationError(
                "community_group_type is required".to_string(),
            ));
        }
        if draft.key_issues.len() > MAX_KEY_ISSUES_LEN {
            return Err(AppError::ValidationError(format!(
                "key_issues exceeds {MAX_KEY_ISSUES_LEN} bytes"
            )));
        }
        if draft
            .photo_proof
            .iter()
            .any(|photo| matches!(photo, PhotoRef::Remote(url) if url.trim().is_empty()))
        {
            return Err(AppError::ValidationError(
                "photo reference must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SubmissionServiceTrait for SubmissionService {
    async fn create_submission(&self, draft: SubmissionDraft) -> Result<Submission, AppError> {
        Self::validate_draft(&draft)?;

        for image_id in draft.photo_proof.iter().filter_map(PhotoRef::local_image) {
            // Surfaces a dangling blob handle now rather than at upload time.
            self.store.get_image(image_id).await?;
        }

        let submission = Submission::from_draft(draft, Utc::now());
        self.store.put(&submission).await?;
        tracing::info!(
            target: "sync::store",
            submission_id = %submission.id,
            submitted_by = %submission.submitted_by,
            "submission queued locally"
        );
        Ok(submission)
    }

    async fn attach_photo(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<PhotoRef, AppError> {
        if bytes.is_empty() {
            return Err(AppError::ValidationError("photo is empty".to_string()));
        }
        let blob = ImageBlob::new(ImageId::generate(), bytes, content_type);
        self.store.put_image(&blob).await?;
        tracing::debug!(
            target: "sync::store",
            image_id = %blob.id,
            bytes = blob.byte_len(),
            "photo stored for later upload"
        );
        Ok(PhotoRef::Local(blob.id))
    }

    async fn get_submission(&self, id: &SubmissionId) -> Result<Submission, AppError> {
        self.store.get(id).await
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Submission>, AppError> {
        self.store.get_all_by_user(user_id).await
    }

    async fn pending_count(&self) -> Result<u32, AppError> {
        self.store.count_by_status(SyncStatus::Local).await
    }

    async fn delete_submission(&self, id: &SubmissionId) -> Result<(), AppError> {
        let submission = match self.store.get(id).await {
            Ok(submission) => submission,
            Err(AppError::NotFound(_)) => return Ok(()),
            Err(err) => return Err(err),
        };
        self.store.remove(id).await?;
        for image_id in submission.local_images() {
            self.store.remove_image(image_id).await?;
        }
        Ok(())
    }
}
