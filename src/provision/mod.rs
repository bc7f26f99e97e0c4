//! Lifecycle handlers for the vector bucket and the vector index.
//!
//! Each event (Create, Update, Delete) is validated, applied with a small
//! retry budget, and always answered with a status callback, whether the
//! work succeeded or not.

mod bucket;
mod callback;
mod index;

pub use callback::{
    validate_callback_url, CallbackSender, HttpCallbackSender, LifecycleResponse,
    RecordingCallbackSender,
};

use crate::error::{Result, VidseekError};
use crate::transport::RetryPolicy;
use crate::vector_index::VectorIndex;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Events with less time left than this are refused.
pub const MIN_REMAINING_TIME: Duration = Duration::from_secs(10);

/// Failure reasons are cut to this many characters.
const MAX_REASON_CHARS: usize = 200;

/// A lifecycle event as delivered by the deployment engine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleEvent {
    #[serde(default)]
    pub request_type: Option<String>,
    #[serde(default)]
    pub resource_properties: Map<String, Value>,
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    #[serde(rename = "ResponseURL", default)]
    pub response_url: String,
    #[serde(default)]
    pub stack_id: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub logical_resource_id: String,
}

impl LifecycleEvent {
    /// Non-empty string property.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.resource_properties
            .get(name)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Invocation context of a lifecycle event.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleContext {
    pub remaining_time: Duration,
    pub log_stream_name: String,
}

impl LifecycleContext {
    pub fn new(remaining_time: Duration, log_stream_name: &str) -> Self {
        Self {
            remaining_time,
            log_stream_name: log_stream_name.to_string(),
        }
    }
}

/// Callback status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Success,
    Failed,
}

/// Lifecycle request kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

impl RequestType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Create" => Some(RequestType::Create),
            "Update" => Some(RequestType::Update),
            "Delete" => Some(RequestType::Delete),
            _ => None,
        }
    }
}

/// Which resource an event manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Bucket,
    Index,
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bucket" => Ok(ResourceKind::Bucket),
            "index" => Ok(ResourceKind::Index),
            _ => Err(format!("Unknown resource kind: {}", s)),
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Bucket => write!(f, "bucket"),
            ResourceKind::Index => write!(f, "index"),
        }
    }
}

/// Result of handling one event, before callback defaults are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutcome {
    pub status: Status,
    pub reason: Option<String>,
    pub physical_resource_id: Option<String>,
}

impl HandlerOutcome {
    pub fn success(reason: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            reason: Some(reason.into()),
            physical_resource_id: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            reason: Some(reason.into()),
            physical_resource_id: None,
        }
    }

    fn with_physical_id(mut self, id: Option<String>) -> Self {
        self.physical_resource_id = id;
        self
    }
}

/// Decision of a single attempt.
pub(crate) enum Attempt {
    Done(String),
    Failed(String),
    Retry(VidseekError),
}

/// Run attempts until one decides, sleeping between retried attempts.
/// The closure is told whether it is making the last attempt.
pub(crate) async fn drive<F, Fut>(retry: RetryPolicy, request_type: &str, mut attempt: F) -> HandlerOutcome
where
    F: FnMut(bool) -> Fut,
    Fut: Future<Output = Attempt>,
{
    let max_attempts = retry.max_attempts.max(1);
    for n in 0..max_attempts {
        let is_last = n + 1 >= max_attempts;
        match attempt(is_last).await {
            Attempt::Done(reason) => {
                info!("{}", reason);
                return HandlerOutcome::success(reason);
            }
            Attempt::Failed(reason) => {
                error!("{}", reason);
                return HandlerOutcome::failed(reason);
            }
            Attempt::Retry(e) if !is_last => {
                warn!("Error on attempt {}: {}, retrying...", n + 1, e);
                tokio::time::sleep(retry.backoff(n)).await;
            }
            Attempt::Retry(e) => {
                let reason = format!(
                    "Critical error during {}: {}",
                    request_type,
                    truncate_reason(&e.to_string())
                );
                error!("{}", reason);
                return HandlerOutcome::failed(reason);
            }
        }
    }
    HandlerOutcome::failed(format!("Exceeded retries for {}", request_type))
}

/// Cut a reason to the callback's length limit.
pub fn truncate_reason(reason: &str) -> String {
    reason.chars().take(MAX_REASON_CHARS).collect()
}

/// Applies lifecycle events and reports their status.
pub struct Provisioner {
    index: Arc<dyn VectorIndex>,
    callback: Arc<dyn CallbackSender>,
    retry: RetryPolicy,
    default_bucket: Option<String>,
    default_index: Option<String>,
}

impl Provisioner {
    pub fn new(index: Arc<dyn VectorIndex>, callback: Arc<dyn CallbackSender>) -> Self {
        Self {
            index,
            callback,
            retry: RetryPolicy {
                max_attempts: 3,
                backoff_base: Duration::from_secs(1),
            },
            default_bucket: None,
            default_index: None,
        }
    }

    /// Override the attempt budget and backoff.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Bucket and index used when an index event omits them.
    pub fn with_defaults(mut self, bucket: &str, index: &str) -> Self {
        self.default_bucket = Some(bucket.to_string()).filter(|b| !b.is_empty());
        self.default_index = Some(index.to_string()).filter(|i| !i.is_empty());
        self
    }

    /// Handle an event and send its callback. Returns the response that was sent.
    pub async fn handle(
        &self,
        kind: ResourceKind,
        event: &LifecycleEvent,
        context: &LifecycleContext,
    ) -> Result<LifecycleResponse> {
        info!(
            "Handling {} event {:?} for {}",
            kind, event.request_type, event.logical_resource_id
        );

        let outcome = match AssertUnwindSafe(self.apply(kind, event, context))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                error!("Unhandled panic while handling {} event", kind);
                HandlerOutcome::failed("Unhandled exception: handler panicked")
                    .with_physical_id(event.physical_resource_id.clone())
            }
        };

        let response = LifecycleResponse::new(event, context, outcome);
        self.callback.send(&event.response_url, &response).await?;
        Ok(response)
    }

    async fn apply(&self, kind: ResourceKind, event: &LifecycleEvent, context: &LifecycleContext) -> HandlerOutcome {
        let existing_id = event.physical_resource_id.clone();

        let Some(request_type) = event.request_type.as_deref().filter(|t| !t.is_empty()) else {
            error!("Missing RequestType in event");
            return HandlerOutcome::failed("Missing RequestType").with_physical_id(existing_id);
        };

        let outcome = match kind {
            ResourceKind::Bucket => {
                bucket::apply(self.index.as_ref(), self.retry, request_type, event, context).await
            }
            ResourceKind::Index => {
                index::apply(
                    self.index.as_ref(),
                    self.retry,
                    request_type,
                    event,
                    context,
                    self.default_bucket.as_deref(),
                    self.default_index.as_deref(),
                )
                .await
            }
        };

        match outcome {
            Ok(outcome) => outcome,
            Err(reason) => {
                error!("{}", reason);
                HandlerOutcome::failed(reason).with_physical_id(existing_id)
            }
        }
    }
}

/// Refuse events that arrive with too little time left.
fn check_remaining_time(context: &LifecycleContext) -> std::result::Result<(), String> {
    info!("Remaining time: {}ms", context.remaining_time.as_millis());
    if context.remaining_time < MIN_REMAINING_TIME {
        return Err("Insufficient time".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_index::{IndexSpec, MemoryVectorIndex};
    use serde_json::json;

    fn event(kind_props: Value, request_type: Option<&str>) -> LifecycleEvent {
        let mut value = json!({
            "ResponseURL": "https://callback.example.com/r",
            "StackId": "stack-1",
            "RequestId": "req-1",
            "LogicalResourceId": "Res",
            "ResourceProperties": kind_props
        });
        if let Some(t) = request_type {
            value["RequestType"] = json!(t);
        }
        serde_json::from_value(value).unwrap()
    }

    fn context(secs: u64) -> LifecycleContext {
        LifecycleContext::new(Duration::from_secs(secs), "stream-1")
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_base: Duration::ZERO,
        }
    }

    fn provisioner(index: Arc<MemoryVectorIndex>) -> (Provisioner, Arc<RecordingCallbackSender>) {
        let callback = Arc::new(RecordingCallbackSender::new());
        let provisioner = Provisioner::new(index, callback.clone())
            .with_retry(fast_retry())
            .with_defaults("talks", "transcripts");
        (provisioner, callback)
    }

    #[tokio::test]
    async fn test_bucket_lifecycle() {
        let index = Arc::new(MemoryVectorIndex::new());
        let (provisioner, callback) = provisioner(index.clone());
        let props = json!({"BucketName": "talks"});

        let created = provisioner
            .handle(ResourceKind::Bucket, &event(props.clone(), Some("Create")), &context(60))
            .await
            .unwrap();
        assert_eq!(created.status, Status::Success);
        assert_eq!(created.reason, "Created bucket talks");
        assert_eq!(created.physical_resource_id, "vector-bucket-talks");
        assert!(index.list_indexes("talks").await.is_ok());

        let updated = provisioner
            .handle(ResourceKind::Bucket, &event(props.clone(), Some("Update")), &context(60))
            .await
            .unwrap();
        assert_eq!(updated.reason, "Updated (no-op)");

        let deleted = provisioner
            .handle(ResourceKind::Bucket, &event(props.clone(), Some("Delete")), &context(60))
            .await
            .unwrap();
        assert_eq!(deleted.reason, "Deleted bucket talks");

        let again = provisioner
            .handle(ResourceKind::Bucket, &event(props, Some("Delete")), &context(60))
            .await
            .unwrap();
        assert_eq!(again.status, Status::Success);
        assert_eq!(again.reason, "Bucket talks not found, no deletion needed");

        assert_eq!(callback.sent().len(), 4);
    }

    #[tokio::test]
    async fn test_validation_failures_still_send_callback() {
        let index = Arc::new(MemoryVectorIndex::new());
        let (provisioner, callback) = provisioner(index);

        let missing_type = provisioner
            .handle(ResourceKind::Bucket, &event(json!({"BucketName": "b"}), None), &context(60))
            .await
            .unwrap();
        assert_eq!(missing_type.status, Status::Failed);
        assert_eq!(missing_type.reason, "Missing RequestType");
        assert_eq!(missing_type.physical_resource_id, "stream-1");

        let missing_bucket = provisioner
            .handle(ResourceKind::Bucket, &event(json!({}), Some("Create")), &context(60))
            .await
            .unwrap();
        assert_eq!(missing_bucket.reason, "Missing BucketName");

        let no_time = provisioner
            .handle(ResourceKind::Bucket, &event(json!({"BucketName": "b"}), Some("Create")), &context(5))
            .await
            .unwrap();
        assert_eq!(no_time.reason, "Insufficient time");

        assert_eq!(callback.sent().len(), 3);
        assert!(callback.sent().iter().all(|(_, r)| r.status == Status::Failed));
    }

    #[tokio::test]
    async fn test_index_delete_and_defaults() {
        let index = Arc::new(MemoryVectorIndex::new());
        index.create_bucket("talks").await.unwrap();
        index
            .create_index("talks", &IndexSpec::transcripts("transcripts", 3))
            .await
            .unwrap();
        let (provisioner, _) = provisioner(index.clone());

        let created = provisioner
            .handle(ResourceKind::Index, &event(json!({}), Some("Create")), &context(60))
            .await
            .unwrap();
        assert_eq!(created.reason, "Created (no-op)");
        assert_eq!(created.physical_resource_id, "index-talks-transcripts");

        let deleted = provisioner
            .handle(ResourceKind::Index, &event(json!({}), Some("Delete")), &context(60))
            .await
            .unwrap();
        assert_eq!(deleted.reason, "Deleted index transcripts");
        assert!(index.list_indexes("talks").await.unwrap().is_empty());

        let again = provisioner
            .handle(ResourceKind::Index, &event(json!({}), Some("Delete")), &context(60))
            .await
            .unwrap();
        assert_eq!(again.reason, "Index transcripts not found, no deletion needed");
    }

    #[tokio::test]
    async fn test_index_missing_parameters() {
        let callback = Arc::new(RecordingCallbackSender::new());
        let provisioner = Provisioner::new(Arc::new(MemoryVectorIndex::new()), callback);

        let response = provisioner
            .handle(ResourceKind::Index, &event(json!({"IndexName": "i"}), Some("Delete")), &context(60))
            .await
            .unwrap();
        assert_eq!(response.reason, "Missing parameters");
    }

    #[tokio::test]
    async fn test_existing_physical_id_is_kept() {
        let index = Arc::new(MemoryVectorIndex::new());
        let (provisioner, _) = provisioner(index);
        let mut e = event(json!({"BucketName": "talks"}), Some("Update"));
        e.physical_resource_id = Some("existing-id".to_string());

        let response = provisioner
            .handle(ResourceKind::Bucket, &e, &context(60))
            .await
            .unwrap();
        assert_eq!(response.physical_resource_id, "existing-id");
    }

    #[tokio::test]
    async fn test_insecure_callback_is_an_error() {
        let index = Arc::new(MemoryVectorIndex::new());
        let (provisioner, callback) = provisioner(index);
        let mut e = event(json!({"BucketName": "talks"}), Some("Update"));
        e.response_url = "http://callback.example.com/r".to_string();

        assert!(provisioner
            .handle(ResourceKind::Bucket, &e, &context(60))
            .await
            .is_err());
        assert!(callback.sent().is_empty());
    }

    #[tokio::test]
    async fn test_drive_retries_then_fails() {
        let mut calls = 0;
        let outcome = drive(fast_retry(), "Create", |_| {
            calls += 1;
            async { Attempt::Retry(VidseekError::VectorIndex("boom".into())) }
        })
        .await;

        assert_eq!(calls, 3);
        assert_eq!(outcome.status, Status::Failed);
        assert_eq!(
            outcome.reason.as_deref(),
            Some("Critical error during Create: Vector index error: boom")
        );
    }

    #[test]
    fn test_truncate_reason() {
        assert_eq!(truncate_reason(&"x".repeat(500)).len(), 200);
        assert_eq!(truncate_reason("short"), "short");
    }

    #[test]
    fn test_resource_kind_parse() {
        assert_eq!("bucket".parse::<ResourceKind>().unwrap(), ResourceKind::Bucket);
        assert_eq!("Index".parse::<ResourceKind>().unwrap(), ResourceKind::Index);
        assert!("table".parse::<ResourceKind>().is_err());
    }
}
