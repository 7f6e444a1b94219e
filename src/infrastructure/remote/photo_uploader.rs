use super::http::{build_client, classify_failure, transport_error};
use crate::application::ports::{PhotoUploader, RemoteError};
use crate::domain::entities::ImageBlob;
use crate::domain::value_objects::ImageId;
use crate::shared::config::RemoteConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

/// Uploads photo blobs into an object-storage bucket, overwriting on retry.
pub struct RestPhotoUploader {
    client: Client,
    base_url: String,
    bucket: String,
}

impl RestPhotoUploader {
    pub fn new(config: &RemoteConfig, bucket: impl Into<String>) -> Result<Self, AppError> {
        let bucket = bucket.into();
        if bucket.trim().is_empty() || bucket.contains('/') {
            return Err(AppError::ConfigurationError(format!(
                "invalid photo bucket: {bucket:?}"
            )));
        }
        Ok(Self {
            client: build_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bucket,
        })
    }

    fn object_url(&self, id: &ImageId) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, id)
    }

    pub fn public_url(&self, id: &ImageId) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, id
        )
    }
}

#[async_trait]
impl PhotoUploader for RestPhotoUploader {
    async fn upload(&self, id: &ImageId, blob: &ImageBlob) -> Result<String, RemoteError> {
        let response = self
            .client
            .post(self.object_url(id))
            .header(CONTENT_TYPE, blob.content_type.as_str())
            .header("x-upsert", "true")
            .body(blob.bytes.clone())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body, id.as_str()));
        }

        tracing::debug!(
            target: "sync::remote",
            image_id = %id,
            bytes = blob.byte_len(),
            "photo uploaded"
        );
        Ok(self.public_url(id))
    }
}
