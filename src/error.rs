//! Error types for Vidseek.

use thiserror::Error;

/// Library-level error type for Vidseek operations.
#[derive(Error, Debug)]
pub enum VidseekError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Embedding response did not contain an embedding")]
    MissingEmbedding,

    #[error("Vector index error: {0}")]
    VectorIndex(String),

    #[error("Vector bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Vector index not found: {0}")]
    IndexNotFound(String),

    #[error("Request throttled: {0}")]
    Throttled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Ingestion failed: {0}")]
    Ingest(String),

    #[error("Provisioning failed: {0}")]
    Provision(String),
}

impl VidseekError {
    /// Whether the error says the bucket or index does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            VidseekError::BucketNotFound(_) | VidseekError::IndexNotFound(_)
        )
    }

    /// Whether the remote service asked us to slow down.
    pub fn is_throttling(&self) -> bool {
        matches!(self, VidseekError::Throttled(_))
    }

    /// Whether the error came back from the embedding or index service
    /// (as opposed to a bug or a local failure).
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            VidseekError::Embedding(_)
                | VidseekError::VectorIndex(_)
                | VidseekError::BucketNotFound(_)
                | VidseekError::IndexNotFound(_)
                | VidseekError::Throttled(_)
                | VidseekError::Http(_)
                | VidseekError::OpenAI(_)
        )
    }
}

/// Result type alias for Vidseek operations.
pub type Result<T> = std::result::Result<T, VidseekError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert!(VidseekError::IndexNotFound("idx".into()).is_not_found());
        assert!(VidseekError::BucketNotFound("b".into()).is_not_found());
        assert!(!VidseekError::Throttled("slow".into()).is_not_found());

        assert!(VidseekError::Throttled("slow".into()).is_throttling());
        assert!(VidseekError::Throttled("slow".into()).is_upstream());
        assert!(VidseekError::VectorIndex("boom".into()).is_upstream());
        assert!(!VidseekError::MissingEmbedding.is_upstream());
        assert!(!VidseekError::InvalidInput("x".into()).is_upstream());
    }
}
