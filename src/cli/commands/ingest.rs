//! Ingest command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::ingest::load_rows;
use crate::orchestrator::Orchestrator;
use anyhow::{Context, Result};
use std::path::Path;

/// Load a rows file and embed it into the configured index.
pub async fn run_ingest(file: &Path, settings: Settings) -> Result<()> {
    let rows = load_rows(file).with_context(|| format!("Failed to read rows from {}", file.display()))?;
    Output::info(&format!("Loaded {} rows from {}", rows.len(), file.display()));

    let orchestrator = Orchestrator::new(settings)?;
    let progress = Output::progress_bar(rows.len() as u64, "Embedding transcripts");
    let job = orchestrator.ingest_job()?.with_progress(progress);

    let report = job.run(&rows).await?;

    Output::success("Ingestion complete");
    Output::kv("Rows processed", &report.rows_processed.to_string());
    Output::kv("Rows skipped", &report.rows_skipped.to_string());
    Output::kv("Chunks embedded", &report.chunks_embedded.to_string());
    Output::kv("Chunks skipped", &report.chunks_skipped.to_string());
    Output::kv("Vectors uploaded", &report.vectors_uploaded.to_string());
    Output::kv("Dimension", &report.dimension.to_string());
    if report.index_created {
        Output::kv("Index", "created");
    }

    Ok(())
}
