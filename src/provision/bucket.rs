//! Vector bucket resource.

use super::{
    check_remaining_time, drive, truncate_reason, Attempt, HandlerOutcome, LifecycleContext,
    LifecycleEvent, RequestType, Status,
};
use crate::transport::RetryPolicy;
use crate::vector_index::VectorIndex;
use tracing::info;

/// Apply a bucket event. `Err` carries a validation failure reason.
pub(super) async fn apply(
    index: &dyn VectorIndex,
    retry: RetryPolicy,
    request_type: &str,
    event: &LifecycleEvent,
    context: &LifecycleContext,
) -> std::result::Result<HandlerOutcome, String> {
    let bucket = event
        .property("BucketName")
        .ok_or_else(|| "Missing BucketName".to_string())?;
    info!("Properties - BucketName: {}", bucket);

    check_remaining_time(context)?;

    let physical_id = event
        .physical_resource_id
        .clone()
        .unwrap_or_else(|| format!("vector-bucket-{}", bucket));

    let outcome = match RequestType::parse(request_type) {
        Some(RequestType::Create) => {
            drive(retry, request_type, |_| async move {
                info!("Creating vector bucket {}", bucket);
                match index.create_bucket(bucket).await {
                    Ok(()) => Attempt::Done(format!("Created bucket {}", bucket)),
                    Err(e) => Attempt::Retry(e),
                }
            })
            .await
        }
        Some(RequestType::Update) => {
            info!("Updating vector bucket {} (no-op)", bucket);
            HandlerOutcome::success("Updated (no-op)")
        }
        Some(RequestType::Delete) => {
            drive(retry, request_type, |is_last| async move {
                info!("Attempting to delete vector bucket {}", bucket);
                match index.delete_bucket(bucket).await {
                    Ok(()) => Attempt::Done(format!("Deleted bucket {}", bucket)),
                    Err(e) if e.is_not_found() => {
                        Attempt::Done(format!("Bucket {} not found, no deletion needed", bucket))
                    }
                    Err(e) if e.is_throttling() && !is_last => Attempt::Retry(e),
                    Err(e) if e.is_upstream() => Attempt::Failed(format!(
                        "Failed to delete bucket: {}",
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
