use super::http::{build_client, classify_failure, transport_error};
use crate::application::ports::{RemoteAck, RemoteError, RemoteSubmissionApi};
use crate::domain::entities::Submission;
use crate::domain::value_objects::{PhotoRef, SubmissionId, SubmissionStatus};
use crate::shared::config::RemoteConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const UPSERT_PREFER: &str = "resolution=merge-duplicates,return=representation";

/// Server row shape. Client-side sync bookkeeping never leaves the device.
#[derive(Debug, Serialize)]
struct SubmissionPayload<'a> {
    id: &'a str,
    campaign_id: Option<&'a str>,
    location_id: Option<&'a str>,
    community_group_id: Option<&'a str>,
    community_group_type: &'a str,
    participant_count: u32,
    key_issues: &'a str,
    photo_proof: &'a [PhotoRef],
    status: SubmissionStatus,
    submitted_by: &'a str,
    submitted_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'a> From<&'a Submission> for SubmissionPayload<'a> {
    fn from(submission: &'a Submission) -> Self {
        Self {
            id: submission.id.as_str(),
            campaign_id: submission.campaign_id.as_deref(),
            location_id: submission.location_id.as_deref(),
            community_group_id: submission.community_group_id.as_deref(),
            community_group_type: &submission.community_group_type,
            participant_count: submission.participant_count,
            key_issues: &submission.key_issues,
            photo_proof: &submission.photo_proof,
            status: submission.status,
            submitted_by: submission.submitted_by.as_str(),
            submitted_at: submission.submitted_at,
            created_at: submission.created_at,
            updated_at: submission.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AckRow {
    id: String,
    status: String,
}

/// Upserts submissions into a PostgREST table keyed by `id`.
pub struct RestSubmissionClient {
    client: Client,
    endpoint: String,
}

impl RestSubmissionClient {
    pub fn new(config: &RemoteConfig) -> Result<Self, AppError> {
        let endpoint = format!(
            "{}/rest/v1/{}?on_conflict=id",
            config.base_url.trim_end_matches('/'),
            config.table
        );
        Ok(Self {
            client: build_client(config)?,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn parse_ack(body: &str) -> Result<RemoteAck, RemoteError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| RemoteError::InvalidResponse(format!("malformed body: {e}")))?;
        let row = match value {
            Value::Array(rows) => rows.into_iter().next(),
            object @ Value::Object(_) => Some(object),
            _ => None,
        }
        .ok_or_else(|| {
            RemoteError::InvalidResponse("upsert returned no representation".to_string())
        })?;
        let row: AckRow = serde_json::from_value(row)
            .map_err(|e| RemoteError::InvalidResponse(format!("unexpected row: {e}")))?;

        Ok(RemoteAck {
            id: SubmissionId::new(row.id).map_err(RemoteError::InvalidResponse)?,
            status: row.status.parse().map_err(RemoteError::InvalidResponse)?,
        })
    }
}

#[async_trait]
impl RemoteSubmissionApi for RestSubmissionClient {
    async fn create_or_update_submission(
        &self,
        submission: &Submission,
    ) -> Result<RemoteAck, RemoteError> {
        let payload = SubmissionPayload::from(submission);
        let response = self
            .client
            .post(&self.endpoint)
            .header("Prefer", UPSERT_PREFER)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        tracing::debug!(
            target: "sync::remote",
            submission_id = %submission.id,
            status = %status,
            "upsert answered"
        );

        if !status.is_success() {
            return Err(classify_failure(status, &body, submission.id.as_str()));
        }
        Self::parse_ack(&body)
    }
}
