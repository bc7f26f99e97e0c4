//! Search outcomes and their JSON envelope.
//!
//! Every outcome is wrapped as `{"output": ...}`, which is the shape the
//! agent relays verbatim and the HTTP entrypoint returns.

use super::{Links, ResultEntry};
use serde::Serialize;

/// Message returned when the query produces no usable embedding or matches.
pub const NO_RELEVANT_OUTPUT: &str = "NO_RELEVANT_OUTPUT";

/// Recommendation attached to the insufficient-results failure.
pub const INSUFFICIENT_RECOMMENDATION: &str =
    "Insufficient relevant videos found to provide a recommendation.";

/// Terminal result of one search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Exactly two linked sources, best first.
    Success {
        results: Vec<ResultEntry>,
        recommendation: String,
    },
    /// No embedding or no matches.
    NoRelevantOutput,
    /// The embedding or index service failed.
    UpstreamError(String),
    /// Fewer than two linked sources survived, even after the retry.
    Insufficient { results: Vec<ResultEntry> },
    /// Anything else.
    Unexpected(String),
}

impl SearchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SearchOutcome::Success { .. })
    }

    /// Wrap the outcome in the `{"output": ...}` envelope.
    pub fn into_envelope(self) -> ToolEnvelope {
        let output = match self {
            SearchOutcome::Success {
                results,
                recommendation,
            } => ToolOutput::Success {
                results: results.into_iter().map(SourceLink::from).collect(),
                final_recommendation: recommendation,
            },
            SearchOutcome::NoRelevantOutput => ToolOutput::failure(NO_RELEVANT_OUTPUT),
            SearchOutcome::UpstreamError(detail) => {
                ToolOutput::failure(format!("ClientError: {}", detail))
            }
            SearchOutcome::Unexpected(detail) => {
                ToolOutput::failure(format!("Exception: {}", detail))
            }
            SearchOutcome::Insufficient { results } => ToolOutput::Failure {
                message: format!(
                    "ERROR: Found only {} video(s) with valid links; at least 2 required",
                    results.len()
                ),
                results: Some(results),
                final_recommendation: Some(INSUFFICIENT_RECOMMENDATION.to_string()),
            },
        };
        ToolEnvelope { output }
    }
}

/// A source in a successful answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceLink {
    pub doc_id: String,
    pub links: Links,
    pub hybrid_score: f64,
}

impl From<ResultEntry> for SourceLink {
    fn from(entry: ResultEntry) -> Self {
        Self {
            doc_id: entry.doc_id,
            links: entry.links,
            hybrid_score: entry.hybrid_score,
        }
    }
}

/// Payload inside the envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Success {
        results: Vec<SourceLink>,
        final_recommendation: String,
    },
    Failure {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        results: Option<Vec<ResultEntry>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        final_recommendation: Option<String>,
    },
}

impl ToolOutput {
    fn failure(message: impl Into<String>) -> Self {
        ToolOutput::Failure {
            message: message.into(),
            results: None,
            final_recommendation: None,
        }
    }
}

/// `{"output": ...}` wrapper.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolEnvelope {
    pub output: ToolOutput,
}

impl ToolEnvelope {
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "output": { "message": format!("Exception: {}", e) } })
        })
    }

    pub fn to_json_string(&self) -> String {
        self.to_value().to_string()
    }
}
