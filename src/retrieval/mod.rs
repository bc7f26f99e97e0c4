//! Hybrid retrieval and ranking over transcript chunks.
//!
//! A query flows through persona inference, nearest-neighbour retrieval,
//! hybrid scoring (semantic + keyword + metadata), diversity clustering and
//! link filtering, with one widened retry when too few linked sources
//! survive. The two best survivors are turned into a recommendation.
//!
//! Everything here is request-scoped: candidates are built fresh for each
//! query and dropped when the answer is returned.

mod cluster;
mod envelope;
mod links;
mod persona;
mod pipeline;
mod recommend;
mod scoring;

pub use cluster::{leans_leadership, select_slate, sort_by_hybrid_desc, MAX_GENERAL_SLATE};
pub use envelope::{
    SearchOutcome, SourceLink, ToolEnvelope, ToolOutput, INSUFFICIENT_RECOMMENDATION,
    NO_RELEVANT_OUTPUT,
};
pub use links::{extract_links, filter_linked, is_usable_link, LinkKind, Links};
pub use persona::{
    count_terms, infer_persona, Persona, PersonaInference, Weights, LEADERSHIP_TERMS,
    METADATA_WEIGHT, TECHNICAL_TERMS,
};
pub use pipeline::{rank_matches, PipelineConfig, SearchPipeline, MIN_RESULTS};
pub use recommend::{synthesize, Confidence, HIGH_CONFIDENCE_THRESHOLD};
pub use scoring::{
    blend_scores, keyword_score, query_keywords, score_match, synonyms_for, truncate_summary,
};

use crate::vector_index::Metadata;
use serde::Serialize;

/// A transcript chunk scored against the current query.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Stable chunk identifier (the index key).
    pub doc_id: String,
    /// Raw chunk text.
    pub content: String,
    /// Metadata attached at ingestion time.
    pub metadata: Metadata,
    /// First two sentences of the video summary.
    pub summary: String,
    /// `1 - distance`. Not clamped; unbounded metrics can push it outside [0, 1].
    pub semantic_score: f64,
    /// Raw keyword term-frequency ratio, before batch normalization.
    pub keyword_score: f64,
    /// Raw persona-vocabulary ratio, before batch normalization.
    pub metadata_score: f64,
    /// Persona vocabulary terms found in the combined text.
    pub matched_terms: Vec<String>,
    /// Blended score; the only field used for ordering and thresholds.
    pub hybrid_score: f64,
}

/// A candidate that carries at least one usable link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEntry {
    pub doc_id: String,
    pub links: Links,
    pub hybrid_score: f64,
    pub summary: String,
}
