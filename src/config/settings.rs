//! Configuration settings for Vidseek.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub vector_index: VectorIndexSettings,
    pub retrieval: RetrievalSettings,
    pub agent: AgentSettings,
    pub transport: TransportSettings,
    pub server: ServerSettings,
    pub ingest: IngestSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Cloud region the embedding and index services live in.
    pub region: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            region: String::new(),
        }
    }
}

/// Embedding provider type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// JSON model-invocation endpoint (`{inputText}` -> `{embedding}`).
    #[default]
    Http,
    /// OpenAI embeddings API.
    OpenAI,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" | "bedrock" => Ok(EmbeddingProvider::Http),
            "openai" => Ok(EmbeddingProvider::OpenAI),
            _ => Err(format!("Unknown embedding provider: {}", s)),
        }
    }
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProvider::Http => write!(f, "http"),
            EmbeddingProvider::OpenAI => write!(f, "openai"),
        }
    }
}

/// Embedding service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (http, openai).
    pub provider: EmbeddingProvider,
    /// Base URL of the model-invocation endpoint. Derived from the region when unset.
    pub endpoint: Option<String>,
    /// Embedding model identifier.
    pub model_id: String,
    /// Expected embedding dimensions.
    pub dimensions: u32,
    /// Bearer token for the embedding endpoint.
    pub api_key: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Http,
            endpoint: None,
            model_id: "amazon.titan-embed-text-v2:0".to_string(),
            dimensions: 1024,
            api_key: None,
        }
    }
}

/// Vector index provider type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexProvider {
    /// In-process index, lost on exit.
    Memory,
    /// Local SQLite file.
    #[default]
    Sqlite,
    /// Remote vector bucket service.
    Http,
}

impl std::str::FromStr for IndexProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(IndexProvider::Memory),
            "sqlite" => Ok(IndexProvider::Sqlite),
            "http" | "s3vectors" => Ok(IndexProvider::Http),
            _ => Err(format!("Unknown vector index provider: {}", s)),
        }
    }
}

impl std::fmt::Display for IndexProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexProvider::Memory => write!(f, "memory"),
            IndexProvider::Sqlite => write!(f, "sqlite"),
            IndexProvider::Http => write!(f, "http"),
        }
    }
}

/// Vector index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorIndexSettings {
    /// Vector index provider (memory, sqlite, http).
    pub provider: IndexProvider,
    /// Base URL of the vector bucket service. Derived from the region when unset.
    pub endpoint: Option<String>,
    /// Vector bucket name.
    pub bucket: String,
    /// Index name inside the bucket.
    pub index_name: String,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
    /// Bearer token for the vector bucket service.
    pub api_token: Option<String>,
}

impl Default for VectorIndexSettings {
    fn default() -> Self {
        Self {
            provider: IndexProvider::Sqlite,
            endpoint: None,
            bucket: String::new(),
            index_name: String::new(),
            sqlite_path: "~/.vidseek/vectors.db".to_string(),
            api_token: None,
        }
    }
}

/// Retrieval pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Neighbours requested on the first attempt.
    pub initial_top_k: usize,
    /// Neighbours requested on the single widened retry.
    pub retry_top_k: usize,
    /// Subject named in the recommendation headline.
    pub recommendation_topic: String,
    /// Focus named in the "start with" line of the recommendation.
    pub recommendation_focus: String,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            initial_top_k: 10,
            retry_top_k: 15,
            recommendation_topic: "agentic AI security".to_string(),
            recommendation_focus: "AI agent security".to_string(),
        }
    }
}

/// Agent runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Chat model that drives tool calling.
    pub reasoning_model_id: String,
    /// Maximum model round-trips per invocation.
    pub max_iterations: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            reasoning_model_id: "gpt-4o-mini".to_string(),
            max_iterations: 6,
        }
    }
}

/// Network client settings shared by the embedding and index clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Base delay for exponential backoff, in milliseconds.
    pub backoff_base_ms: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_secs: 60,
            backoff_base_ms: 200,
        }
    }
}

/// HTTP runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Ingestion job settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Column holding the full transcript text.
    pub content_column: String,
    /// Tokens per chunk.
    pub chunk_tokens: usize,
    /// Vectors per upsert request.
    pub batch_size: usize,
    /// Characters of the first transcript embedded to measure the embedding dimension.
    pub preview_chars: usize,
    /// Concurrent embedding requests per row.
    pub concurrency: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            content_column: "Full Video Transcript".to_string(),
            chunk_tokens: 6000,
            batch_size: 100,
            preview_chars: 1024,
            concurrency: 4,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    ///
    /// Environment overrides are applied on top of the file contents.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Override values from the deployment environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(k))
                .find(|v| !v.trim().is_empty())
        };

        if let Some(v) = first(&["VECTOR_BUCKET_NAME", "VECTOR_BUCKET"]) {
            self.vector_index.bucket = v;
        }
        if let Some(v) = first(&["INDEX_NAME"]) {
            self.vector_index.index_name = v;
        }
        if let Some(v) = first(&["MODEL_ID"]) {
            self.embedding.model_id = v;
        }
        if let Some(v) = first(&["REASONING_MODEL_ID"]) {
            self.agent.reasoning_model_id = v;
        }
        if let Some(v) = first(&["AWS_REGION", "AWS_DEFAULT_REGION"]) {
            self.general.region = v;
        }
    }

    /// Names of required values that are still empty.
    pub fn missing_required(&self) -> Vec<&'static str> {
        [
            ("VECTOR_BUCKET_NAME", self.vector_index.bucket.as_str()),
            ("INDEX_NAME", self.vector_index.index_name.as_str()),
            ("MODEL_ID", self.embedding.model_id.as_str()),
            ("REASONING_MODEL_ID", self.agent.reasoning_model_id.as_str()),
            ("REGION", self.general.region.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Log a warning for every missing required value.
    pub fn warn_missing(&self) {
        let missing = self.missing_required();
        if !missing.is_empty() {
            warn!(
                "Missing required configuration: {}. Falling back to defaults where possible.",
                missing.join(", ")
            );
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::VidseekError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vidseek")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_index.sqlite_path)
    }

    /// Embedding endpoint, falling back to the regional default.
    pub fn embedding_endpoint(&self) -> crate::error::Result<String> {
        match &self.embedding.endpoint {
            Some(endpoint) if !endpoint.is_empty() => Ok(endpoint.trim_end_matches('/').to_string()),
            _ if !self.general.region.is_empty() => Ok(format!(
                "https://bedrock-runtime.{}.amazonaws.com",
                self.general.region
            )),
            _ => Err(crate::error::VidseekError::Config(
                "embedding.endpoint is unset and no region is configured".to_string(),
            )),
        }
    }

    /// Vector index endpoint, falling back to the regional default.
    pub fn index_endpoint(&self) -> crate::error::Result<String> {
        match &self.vector_index.endpoint {
            Some(endpoint) if !endpoint.is_empty() => Ok(endpoint.trim_end_matches('/').to_string()),
            _ if !self.general.region.is_empty() => Ok(format!(
                "https://s3vectors.{}.api.aws",
                self.general.region
            )),
            _ => Err(crate::error::VidseekError::Config(
                "vector_index.endpoint is unset and no region is configured".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("VECTOR_BUCKET_NAME", "talks"),
            ("INDEX_NAME", "transcripts"),
            ("REASONING_MODEL_ID", "gpt-4.1"),
            ("AWS_DEFAULT_REGION", "us-east-1"),
            ("MODEL_ID", "   "),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(settings.vector_index.bucket, "talks");
        assert_eq!(settings.vector_index.index_name, "transcripts");
        assert_eq!(settings.agent.reasoning_model_id, "gpt-4.1");
        assert_eq!(settings.general.region, "us-east-1");
        // blank values never clobber configured ones
        assert_eq!(settings.embedding.model_id, "amazon.titan-embed-text-v2:0");
        assert!(settings.missing_required().is_empty());
    }

    #[test]
    fn test_missing_required() {
        let settings = Settings::default();
        let missing = settings.missing_required();
        assert!(missing.contains(&"VECTOR_BUCKET_NAME"));
        assert!(missing.contains(&"INDEX_NAME"));
        assert!(missing.contains(&"REGION"));
        assert!(!missing.contains(&"MODEL_ID"));
    }

    #[test]
    fn test_endpoints() {
        let mut settings = Settings::default();
        assert!(settings.embedding_endpoint().is_err());

        settings.general.region = "eu-west-1".to_string();
        assert_eq!(
            settings.embedding_endpoint().unwrap(),
            "https://bedrock-runtime.eu-west-1.amazonaws.com"
        );
        assert_eq!(
            settings.index_endpoint().unwrap(),
            "https://s3vectors.eu-west-1.api.aws"
        );

        settings.vector_index.endpoint = Some("http://localhost:9000/".to_string());
        assert_eq!(settings.index_endpoint().unwrap(), "http://localhost:9000");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.vector_index.provider = IndexProvider::Memory;
        settings.retrieval.retry_top_k = 20;
        settings.save_to(&path).unwrap();

        let loaded: Settings =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.vector_index.provider, IndexProvider::Memory);
        assert_eq!(loaded.retrieval.retry_top_k, 20);
        assert_eq!(loaded.retrieval.initial_top_k, 10);
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("bedrock".parse::<EmbeddingProvider>().unwrap(), EmbeddingProvider::Http);
        assert_eq!("OpenAI".parse::<EmbeddingProvider>().unwrap(), EmbeddingProvider::OpenAI);
        assert_eq!("s3vectors".parse::<IndexProvider>().unwrap(), IndexProvider::Http);
        assert!("qdrant".parse::<IndexProvider>().is_err());
    }
}
