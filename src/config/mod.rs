//! Configuration module for Vidseek.
//!
//! Settings are loaded once at process start (TOML file plus environment
//! overrides) and passed explicitly to every component.

mod settings;

pub use settings::{
    AgentSettings, EmbeddingProvider, EmbeddingSettings, GeneralSettings, IndexProvider,
    IngestSettings, RetrievalSettings, ServerSettings, Settings, TransportSettings,
    VectorIndexSettings,
};
