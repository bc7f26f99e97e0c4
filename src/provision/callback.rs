//! Status callback sent at the end of every lifecycle event.

use super::{HandlerOutcome, LifecycleContext, LifecycleEvent, Status};
use crate::error::{Result, VidseekError};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

/// Timeout for the callback PUT.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of the status callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleResponse {
    pub status: Status,
    pub reason: String,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    pub no_echo: bool,
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl LifecycleResponse {
    /// Build the callback body, filling in log-stream defaults.
    pub fn new(event: &LifecycleEvent, context: &LifecycleContext, outcome: HandlerOutcome) -> Self {
        Self {
            status: outcome.status,
            reason: outcome
                .reason
                .filter(|reason| !reason.is_empty())
                .unwrap_or_else(|| {
                    format!(
                        "See the details in CloudWatch Log Stream: {}",
                        context.log_stream_name
                    )
                }),
            physical_resource_id: outcome
                .physical_resource_id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| context.log_stream_name.clone()),
            stack_id: event.stack_id.clone(),
            request_id: event.request_id.clone(),
            logical_resource_id: event.logical_resource_id.clone(),
            no_echo: false,
            data: serde_json::Map::new(),
        }
    }
}

/// Parse a callback URL, accepting only HTTPS.
pub fn validate_callback_url(response_url: &str) -> Result<Url> {
    let url = Url::parse(response_url)
        .map_err(|e| VidseekError::InvalidInput(format!("Invalid response URL: {}", e)))?;
    if url.scheme() != "https" {
        return Err(VidseekError::InvalidInput(
            "Response URL must use HTTPS scheme".to_string(),
        ));
    }
    Ok(url)
}

/// Delivers lifecycle responses.
#[async_trait]
pub trait CallbackSender: Send + Sync {
    async fn send(&self, response_url: &str, response: &LifecycleResponse) -> Result<()>;
}

/// Sends the callback as an HTTPS PUT.
pub struct HttpCallbackSender {
    client: reqwest::Client,
}

impl HttpCallbackSender {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().timeout(CALLBACK_TIMEOUT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CallbackSender for HttpCallbackSender {
    #[instrument(skip(self, response), fields(status = ?response.status))]
    async fn send(&self, response_url: &str, response: &LifecycleResponse) -> Result<()> {
        let url = validate_callback_url(response_url)?;
        let body = serde_json::to_string(response)?;

        info!("Sending {:?} to {}", response.status, url);
        let reply = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?
            .error_for_status()?;

        info!("Callback status code: {}", reply.status());
        Ok(())
    }
}

/// Keeps every response instead of sending it. Used in tests and dry runs.
#[derive(Default)]
pub struct RecordingCallbackSender {
    sent: Mutex<Vec<(String, LifecycleResponse)>>,
}

impl RecordingCallbackSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responses recorded so far, oldest first.
    pub fn sent(&self) -> Vec<(String, LifecycleResponse)> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CallbackSender for RecordingCallbackSender {
    async fn send(&self, response_url: &str, response: &LifecycleResponse) -> Result<()> {
        validate_callback_url(response_url)?;
        self.sent
            .lock()
            .map_err(|e| VidseekError::Provision(format!("Failed to acquire lock: {}", e)))?
            .push((response_url.to_string(), response.clone()));
        Ok(())
    }
}
