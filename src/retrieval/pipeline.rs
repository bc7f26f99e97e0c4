//! The search pipeline: embed, retrieve, rank, filter, retry, recommend.

use super::{
    blend_scores, filter_linked, infer_persona, query_keywords, score_match, select_slate,
    sort_by_hybrid_desc, synthesize, Candidate, Persona, ResultEntry, SearchOutcome,
    ToolEnvelope,
};
use crate::config::Settings;
use crate::embedding::Embedder;
use crate::error::{Result, VidseekError};
use crate::vector_index::{QueryRequest, VectorIndex, VectorMatch};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Number of linked sources a successful answer carries.
pub const MIN_RESULTS: usize = 2;

/// Where to search and how to phrase the recommendation.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub bucket: String,
    pub index_name: String,
    pub initial_top_k: usize,
    pub retry_top_k: usize,
    pub recommendation_topic: String,
    pub recommendation_focus: String,
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            bucket: settings.vector_index.bucket.clone(),
            index_name: settings.vector_index.index_name.clone(),
            initial_top_k: settings.retrieval.initial_top_k,
            retry_top_k: settings.retrieval.retry_top_k,
            recommendation_topic: settings.retrieval.recommendation_topic.clone(),
            recommendation_focus: settings.retrieval.recommendation_focus.clone(),
        }
    }
}

/// Score, cluster and link-filter one batch of matches.
pub fn rank_matches(matches: Vec<VectorMatch>, persona: Persona, keywords: &[String]) -> Vec<ResultEntry> {
    let mut candidates: Vec<Candidate> = matches
        .into_iter()
        .map(|m| score_match(m, persona, keywords))
        .collect();
    blend_scores(&mut candidates, persona.weights());

    let slate = select_slate(candidates, persona);
    debug!("Slate: {:?}", slate.iter().map(|c| &c.doc_id).collect::<Vec<_>>());

    filter_linked(slate)
}

/// Hybrid search over the transcript index.
pub struct SearchPipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    config: PipelineConfig,
}

impl SearchPipeline {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, config: PipelineConfig) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run a search and wrap the outcome in the JSON envelope.
    pub async fn run_tool(&self, query: &str) -> ToolEnvelope {
        self.search(query).await.into_envelope()
    }

    /// Run a search. Never fails: every error becomes a failure outcome.
    #[instrument(skip(self), fields(query = %query))]
    pub async fn search(&self, query: &str) -> SearchOutcome {
        let started = Instant::now();

        let outcome = match AssertUnwindSafe(self.try_search(query)).catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) if e.is_upstream() => {
                warn!("Upstream service error: {}", e);
                SearchOutcome::UpstreamError(e.to_string())
            }
            Ok(Err(e)) => {
                error!("Search failed: {}", e);
                SearchOutcome::Unexpected(e.to_string())
            }
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "search panicked".to_string());
                error!("Search panicked: {}", detail);
                SearchOutcome::Unexpected(detail)
            }
        };

        info!(
            "Search finished in {:?} (success: {})",
            started.elapsed(),
            outcome.is_success()
        );
        outcome
    }

    async fn try_search(&self, query: &str) -> Result<SearchOutcome> {
        let persona = infer_persona(query).persona;

        let embed_started = Instant::now();
        let embedding = match self.embedder.embed(query).await {
            Ok(embedding) if !embedding.is_empty() => embedding,
            Ok(_) | Err(VidseekError::MissingEmbedding) => {
                info!("No embedding for query");
                return Ok(SearchOutcome::NoRelevantOutput);
            }
            Err(e) => return Err(e),
        };
        debug!("Embedding time: {:?}", embed_started.elapsed());

        let keywords = query_keywords(query);

        let first_pass = self.retrieve(&embedding, self.config.initial_top_k).await?;
        if first_pass.is_empty() {
            info!("Index returned no vectors");
            return Ok(SearchOutcome::NoRelevantOutput);
        }

        let rank_started = Instant::now();
        let mut linked = rank_matches(first_pass, persona, &keywords);
        debug!("Ranking time: {:?}", rank_started.elapsed());

        if linked.len() < MIN_RESULTS {
            info!(
                "Found {} videos with valid links, retrying with topK={}",
                linked.len(),
                self.config.retry_top_k
            );
            let widened = self.retrieve(&embedding, self.config.retry_top_k).await?;
            if widened.is_empty() {
                warn!("Retry returned no vectors, keeping first-pass results");
            } else {
                linked = rank_matches(widened, persona, &keywords);
            }
        }

        if linked.len() < MIN_RESULTS {
            return Ok(SearchOutcome::Insufficient { results: linked });
        }

        sort_by_hybrid_desc(&mut linked, |e| e.hybrid_score);
        linked.truncate(MIN_RESULTS);

        let recommendation = synthesize(
            &linked[0],
            &linked[1],
            &self.config.recommendation_topic,
            &self.config.recommendation_focus,
        );

        Ok(SearchOutcome::Success {
            results: linked,
            recommendation,
        })
    }

    async fn retrieve(&self, embedding: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        let started = Instant::now();
        let request = QueryRequest::new(
            &self.config.bucket,
            &self.config.index_name,
            embedding.to_vec(),
            top_k,
        );
        let matches = self.index.query(&request).await?;
        debug!(
            "Vector query time: {:?} ({} matches, topK={})",
            started.elapsed(),
            matches.len(),
            top_k
        );
        Ok(matches)
    }
}
