//! Search command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::retrieval::SearchOutcome;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(query: &str, human: bool, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let pipeline = orchestrator.pipeline();

    let spinner = Output::spinner("Searching...");
    let outcome = pipeline.search(query).await;
    spinner.finish_and_clear();

    if !human {
        println!("{}", outcome.into_envelope().to_json_string());
        return Ok(());
    }

    match &outcome {
        SearchOutcome::Success {
            results,
            recommendation,
        } => {
            Output::success(&format!("Found {} videos", results.len()));
            for (rank, entry) in results.iter().enumerate() {
                let links: Vec<(&str, &str)> = entry
                    .links
                    .iter()
                    .map(|(kind, url)| (kind.as_str(), url))
                    .collect();
                Output::result_entry(rank + 1, &links, Some(&entry.summary));
            }
            Output::header("Recommendation");
            println!("{}", recommendation);
        }
        SearchOutcome::NoRelevantOutput => {
            Output::warning("No relevant videos found for this query.");
        }
        SearchOutcome::Insufficient { results } => {
            Output::warning(&format!(
                "Only {} video(s) with valid links were found; at least 2 are needed.",
                results.len()
            ));
        }
        SearchOutcome::UpstreamError(detail) | SearchOutcome::Unexpected(detail) => {
            Output::error(&format!("Search failed: {}", detail));
            anyhow::bail!("{}", detail);
        }
    }

    Ok(())
}
