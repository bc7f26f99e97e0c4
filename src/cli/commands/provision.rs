//! Provision command implementation.

use crate::cli::{Output, ResourceArg};
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::provision::{HttpCallbackSender, LifecycleContext, LifecycleEvent, Status};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Handle one lifecycle event read from a file.
pub async fn run_provision(
    kind: ResourceArg,
    event_path: &Path,
    remaining_secs: u64,
    settings: Settings,
) -> Result<()> {
    let text = std::fs::read_to_string(event_path)
        .with_context(|| format!("Failed to read event from {}", event_path.display()))?;
    let event: LifecycleEvent = serde_json::from_str(&text).context("Invalid lifecycle event")?;

    let log_stream = format!(
        "{}/vidseek-provision/{}",
        chrono::Utc::now().format("%Y/%m/%d"),
        uuid::Uuid::new_v4().simple()
    );
    let context = LifecycleContext::new(Duration::from_secs(remaining_secs), &log_stream);

    let orchestrator = Orchestrator::new(settings)?;
    let provisioner = orchestrator.provisioner(Arc::new(HttpCallbackSender::new()?));

    let response = provisioner.handle(kind.into(), &event, &context).await?;

    match response.status {
        Status::Success => Output::success(&response.reason),
        Status::Failed => Output::warning(&response.reason),
    }
    Output::kv("Physical id", &response.physical_resource_id);
    Output::kv("Log stream", &log_stream);

    Ok(())
}
