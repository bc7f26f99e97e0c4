//! Invoke command implementation.

use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use serde_json::json;

/// Send a prompt through the entry point and print the response body.
pub async fn run_invoke(prompt: &str, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let entrypoint = orchestrator.entrypoint()?;

    let invocation = entrypoint.invoke(&json!({ "prompt": prompt })).await;
    println!("{}", serde_json::to_string_pretty(&invocation.body)?);

    if invocation.status >= 400 {
        anyhow::bail!("Invocation failed with status {}", invocation.status);
    }
    Ok(())
}
