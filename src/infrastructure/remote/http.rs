use crate::application::ports::RemoteError;
use crate::shared::config::RemoteConfig;
use crate::shared::error::AppError;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Client with the backend's `apikey` and bearer headers preset.
pub(crate) fn build_client(config: &RemoteConfig) -> Result<Client, AppError> {
    let mut headers = HeaderMap::new();
    if let Some(key) = &config.api_key {
        headers.insert("apikey", header_value(key)?);
    }
    if let Some(token) = config.access_token.as_ref().or(config.api_key.as_ref()) {
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {token}"))?);
    }

    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout))
        .default_headers(headers)
        .build()
        .map_err(|e| AppError::ConfigurationError(format!("http client: {e}")))
}

fn header_value(raw: &str) -> Result<HeaderValue, AppError> {
    let mut value = HeaderValue::from_str(raw)
        .map_err(|_| AppError::ConfigurationError("credential is not a valid header".into()))?;
    value.set_sensitive(true);
    Ok(value)
}

pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

/// Maps a non-success response onto the retry taxonomy.
pub(crate) fn classify_failure(status: StatusCode, body: &str, item_id: &str) -> RemoteError {
    if status.is_client_error() && !is_transient_status(status) {
        RemoteError::Rejected {
            item_id: item_id.to_string(),
            reason: rejection_reason(status, body),
        }
    } else {
        RemoteError::Transient(format!("{status}: {}", truncate(body)))
    }
}

pub(crate) fn transport_error(err: reqwest::Error) -> RemoteError {
    RemoteError::Transient(err.to_string())
}

/// PostgREST puts the human-readable cause in `message`, sometimes with `details`.
fn rejection_reason(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        let message = map.get("message").and_then(Value::as_str);
        let details = map.get("details").and_then(Value::as_str);
        match (message, details) {
            (Some(message), Some(details)) => return format!("{message} ({details})"),
            (Some(message), None) => return message.to_string(),
            _ => {}
        }
    }
    if body.trim().is_empty() {
        status.to_string()
    } else {
        truncate(body).to_string()
    }
}

fn truncate(body: &str) -> &str {
    const MAX: usize = 512;
    if body.len() <= MAX {
        return body;
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_failure(StatusCode::SERVICE_UNAVAILABLE, "", "s-1"),
            RemoteError::Transient(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, "", "s-1"),
            RemoteError::Transient(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::REQUEST_TIMEOUT, "", "s-1"),
            RemoteError::Transient(_)
        ));

        let rejected = classify_failure(
            StatusCode::BAD_REQUEST,
            r#"{"code":"23514","message":"violates check constraint","details":"participant_count"}"#,
            "s-1",
        );
        assert_eq!(
            rejected,
            RemoteError::Rejected {
                item_id: "s-1".into(),
                reason: "violates check constraint (participant_count)".into(),
            }
        );
    }

    #[test]
    fn plain_text_bodies_become_reasons() {
        match classify_failure(StatusCode::UNPROCESSABLE_ENTITY, "bad photo", "s-2") {
            RemoteError::Rejected { reason, .. } => assert_eq!(reason, "bad photo"),
            other => panic!("unexpected {other:?}"),
        }
        match classify_failure(StatusCode::FORBIDDEN, "", "s-2") {
            RemoteError::Rejected { reason, .. } => assert_eq!(reason, "403 Forbidden"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
