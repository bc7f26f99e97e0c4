//! HTTP client construction and bounded retry for the external services.
//!
//! Retries live here and only here: the retrieval pipeline never loops on a
//! failed call, it relies on the client having already retried transient
//! errors a fixed number of times.

use crate::config::TransportSettings;
use crate::error::{Result, VidseekError};
use async_openai::{config::OpenAIConfig, Client};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for OpenAI API requests (5 minutes).
const DEFAULT_OPENAI_TIMEOUT_SECS: u64 = 300;

/// Error bodies are truncated to this many characters in messages.
const MAX_ERROR_BODY: usize = 500;

/// Attempt budget and backoff for one service client.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never below 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each one after.
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff_base: Duration::ZERO,
        }
    }

    /// Delay to wait after the given zero-based failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&TransportSettings::default())
    }
}

impl From<&TransportSettings> for RetryPolicy {
    fn from(settings: &TransportSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            backoff_base: Duration::from_millis(settings.backoff_base_ms),
        }
    }
}

/// Build a plain HTTP client honouring the configured timeout.
pub fn http_client(settings: &TransportSettings) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()
        .map_err(VidseekError::from)
}

/// Create an OpenAI client with the default 5-minute timeout.
pub fn create_openai_client() -> Result<Client<OpenAIConfig>> {
    create_openai_client_with_timeout(Duration::from_secs(DEFAULT_OPENAI_TIMEOUT_SECS))
}

/// Create an OpenAI client with a custom timeout.
pub fn create_openai_client_with_timeout(timeout: Duration) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Client::with_config(OpenAIConfig::default()).with_http_client(http_client))
}

/// Whether a status code is worth another attempt.
pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_transient_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// Send a request, re-building and re-sending it while the failure is transient.
///
/// The returned response may still carry a non-success status once the
/// attempt budget is spent; callers map it with [`service_error`].
pub async fn send_with_retry<F>(policy: RetryPolicy, mut build: F) -> Result<Response>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let last_attempt = attempt + 1 >= policy.max_attempts;
        match build().send().await {
            Ok(response) if is_transient_status(response.status()) && !last_attempt => {
                warn!(
                    "Transient HTTP {} on attempt {}, retrying",
                    response.status(),
                    attempt + 1
                );
            }
            Ok(response) => return Ok(response),
            Err(e) if is_transient_error(&e) && !last_attempt => {
                warn!("Transport error on attempt {}: {}, retrying", attempt + 1, e);
            }
            Err(e) => return Err(e.into()),
        }

        let delay = policy.backoff(attempt);
        debug!("Backing off for {:?}", delay);
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(rename = "__type", alias = "code", alias = "Code", default)]
    code: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

/// Service error code and message extracted from a JSON error body.
pub fn parse_error_body(body: &str) -> (Option<String>, String) {
    match serde_json::from_str::<ServiceErrorBody>(body) {
        Ok(parsed) => {
            // "com.amazonaws.s3vectors#NotFoundException" -> "NotFoundException"
            let code = parsed
                .code
                .map(|c| c.rsplit('#').next().unwrap_or_default().to_string());
            let message = parsed.message.unwrap_or_else(|| truncate(body));
            (code, message)
        }
        Err(_) => (None, truncate(body)),
    }
}

/// Translate a failed response into a typed error.
///
/// `not_found` picks the variant for "resource does not exist" since only
/// the caller knows whether it addressed a bucket or an index.
pub async fn service_error<F>(response: Response, not_found: F) -> VidseekError
where
    F: FnOnce(String) -> VidseekError,
{
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify_error(status, &body, not_found)
}

/// Status/body classification behind [`service_error`].
pub fn classify_error<F>(status: StatusCode, body: &str, not_found: F) -> VidseekError
where
    F: FnOnce(String) -> VidseekError,
{
    let (code, message) = parse_error_body(body);
    let code = code.unwrap_or_default();
    let detail = if code.is_empty() {
        format!("HTTP {}: {}", status.as_u16(), message)
    } else {
        format!("{} (HTTP {}): {}", code, status.as_u16(), message)
    };

    match code.as_str() {
        "ResourceNotFoundException" | "NotFoundException" | "IndexNotFound"
        | "BucketNotFound" => not_found(detail),
        "ThrottlingException" | "TooManyRequestsException" => VidseekError::Throttled(detail),
        _ if status == StatusCode::NOT_FOUND => not_found(detail),
        _ if status == StatusCode::TOO_MANY_REQUESTS => VidseekError::Throttled(detail),
        _ => VidseekError::VectorIndex(detail),
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}
