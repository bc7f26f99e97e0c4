//! Embedding generation for query and chunk vectors.

mod http;
mod openai;

pub use http::HttpEmbedder;
pub use openai::OpenAIEmbedder;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    ///
    /// A response that succeeds but carries no vector is reported as
    /// [`crate::VidseekError::MissingEmbedding`].
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the expected embedding dimensions.
    fn dimensions(&self) -> usize;
}
