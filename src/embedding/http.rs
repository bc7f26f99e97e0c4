//! Embeddings over a JSON model-invocation endpoint.
//!
//! Request: `POST {endpoint}/model/{modelId}/invoke` with `{"inputText": ...}`.
//! Response: `{"embedding": [f32, ...], ...}`.

use super::Embedder;
use crate::error::{Result, VidseekError};
use crate::transport::{send_with_retry, service_error, RetryPolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvokeRequest<'a> {
    input_text: &'a str,
}

#[derive(Debug, Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

/// Embedder backed by a model-invocation HTTP endpoint.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model_id: String,
    dimensions: usize,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl HttpEmbedder {
    /// Create a new HTTP embedder.
    pub fn new(client: reqwest::Client, endpoint: &str, model_id: &str, dimensions: usize) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model_id: model_id.to_string(),
            dimensions,
            api_key: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Attach a bearer token to every request.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn invoke_url(&self) -> String {
        format!("{}/model/{}/invoke", self.endpoint, self.model_id)
    }
}

/// Pull the vector out of a raw response body.
fn parse_embedding(body: &[u8]) -> Result<Vec<f32>> {
    let parsed: InvokeResponse = serde_json::from_slice(body)?;
    parsed.embedding.ok_or(VidseekError::MissingEmbedding)
}

#[async_trait]
impl Embedder for HttpEmbedder {
    #[instrument(skip(self, text), fields(model = %self.model_id, chars = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = self.invoke_url();
        let body = InvokeRequest { input_text: text };

        let response = send_with_retry(self.retry, || {
            let request = self.client.post(&url).json(&body);
            match &self.api_key {
                Some(key) => request.bearer_auth(key),
                None => request,
            }
        })
        .await?;

        if !response.status().is_success() {
            let err = service_error(response, VidseekError::Embedding).await;
            return Err(match err {
                VidseekError::VectorIndex(detail) => VidseekError::Embedding(detail),
                other => other,
            });
        }

        let bytes = response.bytes().await?;
        let embedding = parse_embedding(&bytes)?;
        debug!("Received embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let json = serde_json::to_value(InvokeRequest { input_text: "hello" }).unwrap();
        assert_eq!(json, serde_json::json!({"inputText": "hello"}));
    }

    #[test]
    fn test_parse_embedding() {
        let vector = parse_embedding(br#"{"embedding": [0.5, -1.0], "inputTextTokenCount": 2}"#)
            .unwrap();
        assert_eq!(vector, vec![0.5, -1.0]);
    }

    #[test]
    fn test_missing_embedding_field() {
        let err = parse_embedding(br#"{"inputTextTokenCount": 2}"#).unwrap_err();
        assert!(matches!(err, VidseekError::MissingEmbedding));
    }

    #[test]
    fn test_invoke_url() {
        let embedder = HttpEmbedder::new(
            reqwest::Client::new(),
            "https://runtime.example.com/",
            "amazon.titan-embed-text-v2:0",
            1024,
        );
        assert_eq!(
            embedder.invoke_url(),
            "https://runtime.example.com/model/amazon.titan-embed-text-v2:0/invoke"
        );
        assert_eq!(embedder.dimensions(), 1024);
    }
}
