//! Component wiring for Vidseek.
//!
//! Builds the embedder and vector index selected in the settings and hands
//! out the services that share them: the search pipeline, the agent entry
//! point, the ingestion job and the lifecycle provisioner.

use crate::agent::{Agent, Entrypoint, ToolContext};
use crate::config::{EmbeddingProvider, IndexProvider, Settings};
use crate::embedding::{Embedder, HttpEmbedder, OpenAIEmbedder};
use crate::error::Result;
use crate::ingest::{IngestConfig, IngestJob};
use crate::provision::{CallbackSender, Provisioner};
use crate::retrieval::{PipelineConfig, SearchPipeline};
use crate::transport::{http_client, RetryPolicy};
use crate::vector_index::{HttpVectorIndex, MemoryVectorIndex, SqliteVectorIndex, VectorIndex};
use std::sync::Arc;
use tracing::info;

/// Owns the shared clients and builds services on top of them.
pub struct Orchestrator {
    settings: Settings,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    pipeline: Arc<SearchPipeline>,
}

impl Orchestrator {
    /// Create an orchestrator from settings.
    pub fn new(settings: Settings) -> Result<Self> {
        let embedder = build_embedder(&settings)?;
        let index = build_index(&settings)?;
        Ok(Self::with_components(settings, embedder, index))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        let pipeline = Arc::new(SearchPipeline::new(
            embedder.clone(),
            index.clone(),
            PipelineConfig::from_settings(&settings),
        ));

        Self {
            settings,
            embedder,
            index,
            pipeline,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    pub fn index(&self) -> Arc<dyn VectorIndex> {
        self.index.clone()
    }

    /// The search pipeline, shared by the tool and the HTTP routes.
    pub fn pipeline(&self) -> Arc<SearchPipeline> {
        self.pipeline.clone()
    }

    /// Build the reasoning agent with the search tool attached.
    pub fn agent(&self) -> Result<Agent> {
        let tools = ToolContext::new(self.pipeline());
        Ok(Agent::new(tools, &self.settings.agent.reasoning_model_id)?
            .with_max_iterations(self.settings.agent.max_iterations))
    }

    /// Build the invocation entry point around a fresh agent.
    pub fn entrypoint(&self) -> Result<Entrypoint<Agent>> {
        Ok(Entrypoint::new(self.agent()?))
    }

    /// Build an ingestion job writing to the configured bucket and index.
    pub fn ingest_job(&self) -> Result<IngestJob> {
        IngestJob::new(
            self.embedder(),
            self.index(),
            IngestConfig::from_settings(&self.settings),
        )
    }

    /// Build a provisioner that reports through the given callback sender.
    pub fn provisioner(&self, callback: Arc<dyn CallbackSender>) -> Provisioner {
        Provisioner::new(self.index(), callback)
            .with_retry(RetryPolicy::from(&self.settings.transport))
            .with_defaults(
                &self.settings.vector_index.bucket,
                &self.settings.vector_index.index_name,
            )
    }
}

/// Build the embedder selected in the settings.
pub fn build_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    let dimensions = settings.embedding.dimensions as usize;
    let embedder: Arc<dyn Embedder> = match settings.embedding.provider {
        EmbeddingProvider::Http => {
            let endpoint = settings.embedding_endpoint()?;
            info!("Using HTTP embedder {} at {}", settings.embedding.model_id, endpoint);
            Arc::new(
                HttpEmbedder::new(
                    http_client(&settings.transport)?,
                    &endpoint,
                    &settings.embedding.model_id,
                    dimensions,
                )
                .with_api_key(settings.embedding.api_key.clone())
                .with_retry(RetryPolicy::from(&settings.transport)),
            )
        }
        EmbeddingProvider::OpenAI => {
            info!("Using OpenAI embedder {}", settings.embedding.model_id);
            Arc::new(OpenAIEmbedder::with_config(
                &settings.embedding.model_id,
                dimensions,
            )?)
        }
    };
    Ok(embedder)
}

/// Build the vector index selected in the settings.
pub fn build_index(settings: &Settings) -> Result<Arc<dyn VectorIndex>> {
    let index: Arc<dyn VectorIndex> = match settings.vector_index.provider {
        IndexProvider::Memory => {
            info!("Using in-memory vector index");
            Arc::new(MemoryVectorIndex::new())
        }
        IndexProvider::Sqlite => Arc::new(SqliteVectorIndex::new(&settings.sqlite_path())?),
        IndexProvider::Http => {
            let endpoint = settings.index_endpoint()?;
            info!("Using remote vector index at {}", endpoint);
            Arc::new(
                HttpVectorIndex::new(http_client(&settings.transport)?, &endpoint)
                    .with_api_token(settings.vector_index.api_token.clone())
                    .with_retry(RetryPolicy::from(&settings.transport)),
            )
        }
    };
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::RecordingCallbackSender;

    fn memory_settings() -> Settings {
        let mut settings = Settings::default();
        settings.vector_index.provider = IndexProvider::Memory;
        settings.vector_index.bucket = "talks".to_string();
        settings.vector_index.index_name = "videos".to_string();
        settings.embedding.endpoint = Some("https://embed.example.com/".to_string());
        settings
    }

    #[test]
    fn test_builds_from_memory_settings() {
        let orchestrator = Orchestrator::new(memory_settings()).unwrap();
        assert_eq!(
            orchestrator.embedder().dimensions(),
            orchestrator.settings().embedding.dimensions as usize
        );
        assert_eq!(
            orchestrator.pipeline().config().bucket,
            orchestrator.settings().vector_index.bucket
        );
    }

    #[test]
    fn test_missing_endpoint_without_region_fails() {
        let mut settings = memory_settings();
        settings.embedding.endpoint = None;
        settings.general.region = String::new();
        assert!(Orchestrator::new(settings).is_err());
    }

    #[tokio::test]
    async fn test_provisioner_uses_configured_defaults() {
        let orchestrator = Orchestrator::new(memory_settings()).unwrap();
        let callback = Arc::new(RecordingCallbackSender::new());
        let provisioner = orchestrator.provisioner(callback.clone());

        let event: crate::provision::LifecycleEvent = serde_json::from_value(serde_json::json!({
            "RequestType": "Update",
            "ResponseURL": "https://callback.example.com/r",
            "StackId": "s",
            "RequestId": "r",
            "LogicalResourceId": "Index",
            "ResourceProperties": {}
        }))
        .unwrap();
        let context = crate::provision::LifecycleContext::new(
            std::time::Duration::from_secs(60),
            "stream",
        );

        let response = provisioner
            .handle(crate::provision::ResourceKind::Index, &event, &context)
            .await
            .unwrap();
        assert_eq!(response.status, crate::provision::Status::Success);
        assert_eq!(response.physical_resource_id, "index-talks-videos");
        assert_eq!(callback.sent().len(), 1);
    }
}
