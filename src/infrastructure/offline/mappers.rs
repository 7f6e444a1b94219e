use super::rows::{ImageRow, SubmissionRow};
use crate::domain::entities::{ImageBlob, Submission, SyncAttempt};
use crate::domain::value_objects::{ImageId, PhotoRef, SubmissionId, UserId};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};

pub fn submission_from_row(row: SubmissionRow) -> Result<Submission, AppError> {
    let photo_proof: Vec<PhotoRef> = serde_json::from_str(&row.photo_proof)?;
    let attempt = SyncAttempt {
        attempt_count: u32::try_from(row.attempt_count).unwrap_or(0),
        last_attempt_at: row.last_attempt_at.map(timestamp_from_millis).transpose()?,
        last_error: row.last_error,
        last_error_kind: row
            .last_error_kind
            .map(|kind| kind.parse().map_err(AppError::DeserializationError))
            .transpose()?,
    };

    Ok(Submission {
        id: SubmissionId::new(row.id).map_err(AppError::DeserializationError)?,
        campaign_id: row.campaign_id,
        location_id: row.location_id,
        community_group_id: row.community_group_id,
        community_group_type: row.community_group_type,
        participant_count: u32::try_from(row.participant_count).map_err(|_| {
            AppError::DeserializationError(format!(
                "participant_count out of range: {}",
                row.participant_count
            ))
        })?,
        key_issues: row.key_issues,
        photo_proof,
        status: row.status.parse().map_err(AppError::DeserializationError)?,
        sync_status: row
            .sync_status
            .parse()
            .map_err(AppError::DeserializationError)?,
        submitted_by: UserId::new(row.submitted_by).map_err(AppError::DeserializationError)?,
        submitted_at: timestamp_from_millis(row.submitted_at)?,
        created_at: timestamp_from_millis(row.created_at)?,
        updated_at: timestamp_from_millis(row.updated_at)?,
        attempt,
    })
}

pub fn image_from_row(row: ImageRow) -> Result<ImageBlob, AppError> {
    if row.byte_len != row.data.len() as i64 {
        return Err(AppError::Storage(format!(
            "image {} is truncated: expected {} bytes, found {}",
            row.id,
            row.byte_len,
            row.data.len()
        )));
    }
    Ok(ImageBlob {
        id: ImageId::new(row.id).map_err(AppError::DeserializationError)?,
        bytes: row.data,
        content_type: row.content_type,
        sha256: row.sha256,
        created_at: timestamp_from_millis(row.created_at)?,
    })
}

pub fn photo_proof_to_json(photos: &[PhotoRef]) -> Result<String, AppError> {
    Ok(serde_json::to_string(photos)?)
}

pub fn timestamp_from_millis(millis: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| AppError::DeserializationError(format!("invalid timestamp: {millis}")))
}
