//! Vector index resource. Only deletion does any work; the ingestion job
//! creates the index on first use.

use super::{
    check_remaining_time, drive, truncate_reason, Attempt, HandlerOutcome, LifecycleContext,
    LifecycleEvent, RequestType, Status,
};
use crate::transport::RetryPolicy;
use crate::vector_index::VectorIndex;
use tracing::{error, info};

/// Apply an index event. `Err` carries a validation failure reason.
pub(super) async fn apply(
    index: &dyn VectorIndex,
    retry: RetryPolicy,
    request_type: &str,
    event: &LifecycleEvent,
    context: &LifecycleContext,
    default_bucket: Option<&str>,
    default_index: Option<&str>,
) -> std::result::Result<HandlerOutcome, String> {
    let bucket = event.property("S3VectorBucket").or(default_bucket);
    let index_name = event.property("IndexName").or(default_index);
    info!(
        "Properties - S3VectorBucket: {:?}, IndexName: {:?}",
        bucket, index_name
    );

    let (Some(bucket), Some(index_name)) = (bucket, index_name) else {
        error!("Missing parameters - S3VectorBucket: {:?}, IndexName: {:?}", bucket, index_name);
        return Err("Missing parameters".to_string());
    };

    check_remaining_time(context)?;

    let physical_id = event
        .physical_resource_id
        .clone()
        .unwrap_or_else(|| format!("index-{}-{}", bucket, index_name));

    let outcome = match RequestType::parse(request_type) {
        Some(RequestType::Create) => {
            info!("Creating index resource {}/{} (no-op)", bucket, index_name);
            HandlerOutcome::success("Created (no-op)")
        }
        Some(RequestType::Update) => {
            info!("Updating index resource {}/{} (no-op)", bucket, index_name);
            HandlerOutcome::success("Updated (no-op)")
        }
        Some(RequestType::Delete) => {
            drive(retry, request_type, |is_last| async move {
                info!("Attempting to delete index {} from bucket {}", index_name, bucket);
                match index.delete_index(bucket, index_name).await {
                    Ok(()) => Attempt::Done(format!("Deleted index {}", index_name)),
                    Err(e) if e.is_not_found() => Attempt::Done(format!(
                        "Index {} not found, no deletion needed",
                        index_name
                    )),
                    Err(e) if e.is_throttling() && !is_last => Attempt::Retry(e),
                    Err(e) if e.is_upstream() => Attempt::Failed(format!(
                        "Failed to delete index: {}",
                        truncate_reason(&e.to_string())
                    )),
                    Err(e) => Attempt::Failed(format!(
                        "Unexpected error: {}",
                        truncate_reason(&e.to_string())
                    )),
                }
            })
            .await
        }
        None => {
            info!("Ignoring unknown request type {}", request_type);
            HandlerOutcome {
                status: Status::Success,
                reason: None,
                physical_resource_id: None,
            }
        }
    };

    Ok(outcome.with_physical_id(Some(physical_id)))
}
