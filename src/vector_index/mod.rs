//! Vector index abstraction for Vidseek.
//!
//! Indexes live inside named buckets. The trait covers the two capabilities
//! the retrieval pipeline needs (nearest-neighbour query, batched upsert) plus
//! the bucket/index lifecycle used by ingestion and provisioning.

mod http;
mod memory;
mod sqlite;

pub use http::HttpVectorIndex;
pub use memory::MemoryVectorIndex;
pub use sqlite::SqliteVectorIndex;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Chunk metadata attached at ingestion time. Values are always strings.
pub type Metadata = BTreeMap<String, String>;

/// Metadata keys written by the ingestion job and read by the retrieval pipeline.
pub mod metadata_keys {
    pub const ID: &str = "id";
    pub const SOURCE_TEXT: &str = "source_text";
    pub const SUMMARY: &str = "Video Transcript Summary";
    pub const TOPIC_TIMING: &str = "When Was Each Topic Discussed";
    pub const VIDEO_LENGTH: &str = "Video Length";
    pub const EXTERNAL_VIDEO_LINK: &str = "External Youtube Link";
    pub const CONTENT_LINK: &str = "Content Link";
    pub const DECK_LINK: &str = "Deck Link";
    pub const INTERNAL_BROADCAST_LINK: &str = "Internal Broadcast Video Link";

    /// Keys stored without filter support.
    pub const NON_FILTERABLE: [&str; 9] = [
        VIDEO_LENGTH,
        INTERNAL_BROADCAST_LINK,
        EXTERNAL_VIDEO_LINK,
        CONTENT_LINK,
        SOURCE_TEXT,
        TOPIC_TIMING,
        DECK_LINK,
        SUMMARY,
        ID,
    ];
}

/// Deserialize metadata leniently: numbers and booleans become strings, nulls are dropped.
pub fn deserialize_metadata<'de, D>(deserializer: D) -> std::result::Result<Metadata, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Map<String, serde_json::Value>> =
        Option::deserialize(deserializer)?;

    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                serde_json::Value::Null => return None,
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            Some((key, value))
        })
        .collect())
}

/// A vector payload in the wire format (`{"float32": [...]}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorData {
    pub float32: Vec<f32>,
}

impl From<Vec<f32>> for VectorData {
    fn from(float32: Vec<f32>) -> Self {
        Self { float32 }
    }
}

/// A vector to upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique key within the index.
    pub key: String,
    /// Embedding vector.
    pub data: VectorData,
    /// Attached metadata.
    #[serde(default, deserialize_with = "deserialize_metadata")]
    pub metadata: Metadata,
}

impl VectorRecord {
    pub fn new(key: impl Into<String>, embedding: Vec<f32>, metadata: Metadata) -> Self {
        Self {
            key: key.into(),
            data: embedding.into(),
            metadata,
        }
    }
}

/// Nearest-neighbour query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub index_name: String,
    pub vector_bucket_name: String,
    pub query_vector: VectorData,
    pub top_k: usize,
    pub return_metadata: bool,
    pub return_distance: bool,
}

impl QueryRequest {
    /// A query asking for metadata and distances on every match.
    pub fn new(bucket: &str, index: &str, vector: Vec<f32>, top_k: usize) -> Self {
        Self {
            index_name: index.to_string(),
            vector_bucket_name: bucket.to_string(),
            query_vector: vector.into(),
            top_k,
            return_metadata: true,
            return_distance: true,
        }
    }
}

/// One nearest neighbour returned by the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMatch {
    /// Key of the stored vector.
    pub key: String,
    /// Distance to the query vector (lower is closer). Kept in double
    /// precision so `1 - distance` carries no single-precision noise.
    #[serde(default)]
    pub distance: Option<f64>,
    /// Stored metadata.
    #[serde(default, deserialize_with = "deserialize_metadata")]
    pub metadata: Metadata,
}

/// Distance metric of an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
}

impl DistanceMetric {
    /// Distance between two vectors under this metric.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f64 {
        match self {
            DistanceMetric::Cosine => 1.0 - cosine_similarity(a, b),
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| {
                    let d = f64::from(*x) - f64::from(*y);
                    d * d
                })
                .sum::<f64>()
                .sqrt(),
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclidean" => Ok(DistanceMetric::Euclidean),
            _ => Err(format!("Unknown distance metric: {}", s)),
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::Euclidean => write!(f, "euclidean"),
        }
    }
}

/// Index creation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub distance_metric: DistanceMetric,
    pub non_filterable_metadata_keys: Vec<String>,
}

impl IndexSpec {
    /// Cosine index carrying the transcript metadata keys as non-filterable.
    pub fn transcripts(name: &str, dimension: usize) -> Self {
        Self {
            name: name.to_string(),
            dimension,
            distance_metric: DistanceMetric::Cosine,
            non_filterable_metadata_keys: metadata_keys::NON_FILTERABLE
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

/// Trait for vector index implementations.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Nearest neighbours of the query vector, closest first.
    async fn query(&self, request: &QueryRequest) -> Result<Vec<VectorMatch>>;

    /// Insert or replace vectors by key. Returns the number written.
    async fn put_vectors(&self, bucket: &str, index: &str, vectors: &[VectorRecord]) -> Result<usize>;

    /// Create a bucket.
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Delete a bucket and everything in it.
    async fn delete_bucket(&self, bucket: &str) -> Result<()>;

    /// Create an index inside a bucket.
    async fn create_index(&self, bucket: &str, spec: &IndexSpec) -> Result<()>;

    /// Names of the indexes inside a bucket.
    async fn list_indexes(&self, bucket: &str) -> Result<Vec<String>>;

    /// Delete an index and its vectors.
    async fn delete_index(&self, bucket: &str, index: &str) -> Result<()>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_distance_metrics() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!((DistanceMetric::Cosine.distance(&a, &a)).abs() < 1e-6);
        assert!((DistanceMetric::Cosine.distance(&a, &b) - 1.0).abs() < 1e-6);
        assert!((DistanceMetric::Euclidean.distance(&a, &b) - 2f64.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_query_request_wire_shape() {
        let request = QueryRequest::new("talks", "transcripts", vec![0.25], 10);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "indexName": "transcripts",
                "vectorBucketName": "talks",
                "queryVector": {"float32": [0.25]},
                "topK": 10,
                "returnMetadata": true,
                "returnDistance": true
            })
        );
    }

    #[test]
    fn test_metadata_coercion() {
        let m: VectorMatch = serde_json::from_str(
            r#"{"key": "row-0-chunk-0", "distance": 0.2,
                "metadata": {"Video Length": 42, "Deck Link": null, "source_text": "hi", "live": true}}"#,
        )
        .unwrap();

        assert_eq!(m.metadata.get("Video Length").map(String::as_str), Some("42"));
        assert_eq!(m.metadata.get("live").map(String::as_str), Some("true"));
        assert!(!m.metadata.contains_key("Deck Link"));
        assert_eq!(m.distance, Some(0.2));
    }

    #[test]
    fn test_match_without_metadata_or_distance() {
        let m: VectorMatch = serde_json::from_str(r#"{"key": "k"}"#).unwrap();
        assert!(m.metadata.is_empty());
        assert!(m.distance.is_none());
    }

    #[test]
    fn test_transcript_index_spec() {
        let spec = IndexSpec::transcripts("transcripts", 1024);
        assert_eq!(spec.distance_metric, DistanceMetric::Cosine);
        assert_eq!(spec.non_filterable_metadata_keys.len(), 9);
        assert!(spec
            .non_filterable_metadata_keys
            .contains(&"source_text".to_string()));
    }
}
