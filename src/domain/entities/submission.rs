use crate::domain::value_objects::{
    FailureKind, ImageId, PhotoRef, SubmissionId, SubmissionStatus, SyncStatus, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Field input for a new submission, before an id is assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionDraft {
    pub campaign_id: Option<String>,
    pub location_id: Option<String>,
    pub community_group_id: Option<String>,
    pub community_group_type: String,
    pub participant_count: u32,
    pub key_issues: String,
    pub photo_proof: Vec<PhotoRef>,
    pub status: SubmissionStatus,
    pub submitted_by: UserId,
}

/// Client-side bookkeeping of push attempts. Never sent to the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAttempt {
    pub attempt_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_kind: Option<FailureKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub campaign_id: Option<String>,
    pub location_id: Option<String>,
    pub community_group_id: Option<String>,
    pub community_group_type: String,
    pub participant_count: u32,
    pub key_issues: String,
    pub photo_proof: Vec<PhotoRef>,
    pub status: SubmissionStatus,
    pub sync_status: SyncStatus,
    pub submitted_by: UserId,
    pub submitted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub attempt: SyncAttempt,
}

impl Submission {
    /// Assigns the permanent id and queues the submission as `local`.
    pub fn from_draft(draft: SubmissionDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: SubmissionId::generate(),
            campaign_id: draft.campaign_id,
            location_id: draft.location_id,
            community_group_id: draft.community_group_id,
            community_group_type: draft.community_group_type,
            participant_count: draft.participant_count,
            key_issues: draft.key_issues,
            photo_proof: draft.photo_proof,
            status: draft.status,
            sync_status: SyncStatus::Local,
            submitted_by: draft.submitted_by,
            submitted_at: now,
            created_at: now,
            updated_at: now,
            attempt: SyncAttempt::default(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.sync_status == SyncStatus::Local
    }

    pub fn local_images(&self) -> impl Iterator<Item = &ImageId> {
        self.photo_proof.iter().filter_map(PhotoRef::local_image)
    }

    pub fn has_local_photos(&self) -> bool {
        self.photo_proof.iter().any(PhotoRef::is_local)
    }

    /// Swaps a local blob handle for its uploaded URL, keeping the photo order.
    pub fn replace_photo(&mut self, from: &PhotoRef, to: PhotoRef) -> bool {
        match self.photo_proof.iter_mut().find(|photo| *photo == from) {
            Some(slot) => {
                *slot = to;
                true
            }
            None => false,
        }
    }
}
