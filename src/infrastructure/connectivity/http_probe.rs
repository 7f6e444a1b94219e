use crate::application::ports::ConnectivityProbe;
use crate::shared::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Treats any HTTP response from the backend as "online". Connection errors
/// and timeouts read as "offline".
pub struct HttpHealthProbe {
    client: Client,
    url: String,
}

impl HttpHealthProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigurationError(format!("http client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ConnectivityProbe for HttpHealthProbe {
    async fn probe(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => {
                tracing::trace!(
                    target: "sync::connectivity",
                    url = %self.url,
                    status = %response.status(),
                    "health probe answered"
                );
                true
            }
            Err(err) => {
                tracing::debug!(
                    target: "sync::connectivity",
                    url = %self.url,
                    error = %err,
                    "health probe failed"
                );
                false
            }
        }
    }
}
