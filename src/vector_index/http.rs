//! Vector index client for a remote vector bucket service.
//!
//! Every operation is a JSON `POST {endpoint}/{Operation}`.

use super::{IndexSpec, QueryRequest, VectorIndex, VectorMatch, VectorRecord};
use crate::error::{Result, VidseekError};
use crate::transport::{send_with_retry, service_error, RetryPolicy};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument};

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    vectors: Option<Vec<VectorMatch>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexSummary {
    index_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListIndexesResponse {
    #[serde(default)]
    indexes: Vec<IndexSummary>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PutVectorsRequest<'a> {
    vector_bucket_name: &'a str,
    index_name: &'a str,
    vectors: &'a [VectorRecord],
}

/// Which missing resource a failed call points at.
#[derive(Clone, Copy)]
enum Target {
    Bucket,
    Index,
}

/// Remote vector index.
pub struct HttpVectorIndex {
    client: reqwest::Client,
    endpoint: String,
    api_token: Option<String>,
    retry: RetryPolicy,
}

impl HttpVectorIndex {
    /// Create a new client for the given service endpoint.
    pub fn new(client: reqwest::Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_token: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Attach a bearer token to every request.
    pub fn with_api_token(mut self, api_token: Option<String>) -> Self {
        self.api_token = api_token;
        self
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, operation: &str) -> String {
        format!("{}/{}", self.endpoint, operation)
    }

    /// POST a JSON body and decode the JSON reply.
    async fn call<B, R>(&self, operation: &str, body: &B, target: Target) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.url(operation);
        let response = send_with_retry(self.retry, || {
            let request = self.client.post(&url).json(body);
            match &self.api_token {
                Some(token) => request.bearer_auth(token),
                None => request,
            }
        })
        .await?;

        if !response.status().is_success() {
            return Err(match target {
                Target::Bucket => service_error(response, VidseekError::BucketNotFound).await,
                Target::Index => service_error(response, VidseekError::IndexNotFound).await,
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            // Lifecycle operations may answer with an empty body.
            return Ok(serde_json::from_str("{}")?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    #[instrument(skip(self, request), fields(index = %request.index_name, top_k = request.top_k))]
    async fn query(&self, request: &QueryRequest) -> Result<Vec<VectorMatch>> {
        let response: QueryResponse = self.call("QueryVectors", request, Target::Index).await?;
        let vectors = response.vectors.unwrap_or_default();
        debug!("Index returned {} vectors", vectors.len());
        Ok(vectors)
    }

    #[instrument(skip(self, vectors), fields(count = vectors.len()))]
    async fn put_vectors(&self, bucket: &str, index: &str, vectors: &[VectorRecord]) -> Result<usize> {
        let body = PutVectorsRequest {
            vector_bucket_name: bucket,
            index_name: index,
            vectors,
        };
        let _: serde_json::Value = self.call("PutVectors", &body, Target::Index).await?;
        info!("Uploaded batch of {} vectors to {}/{}", vectors.len(), bucket, index);
        Ok(vectors.len())
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let body = json!({ "vectorBucketName": bucket });
        let _: serde_json::Value = self.call("CreateVectorBucket", &body, Target::Bucket).await?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let body = json!({ "vectorBucketName": bucket });
        let _: serde_json::Value = self.call("DeleteVectorBucket", &body, Target::Bucket).await?;
        Ok(())
    }

    async fn create_index(&self, bucket: &str, spec: &IndexSpec) -> Result<()> {
        let body = create_index_body(bucket, spec);
        let _: serde_json::Value = self.call("CreateIndex", &body, Target::Bucket).await?;
        info!("Created vector index {} in bucket {}", spec.name, bucket);
        Ok(())
    }

    async fn list_indexes(&self, bucket: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut body = json!({ "vectorBucketName": bucket });
            if let Some(token) = &next_token {
                body["nextToken"] = json!(token);
            }

            let page: ListIndexesResponse = self.call("ListIndexes", &body, Target::Bucket).await?;
            names.extend(page.indexes.into_iter().map(|i| i.index_name));

            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        Ok(names)
    }

    async fn delete_index(&self, bucket: &str, index: &str) -> Result<()> {
        let body = json!({ "vectorBucketName": bucket, "indexName": index });
        let _: serde_json::Value = self.call("DeleteIndex", &body, Target::Index).await?;
        Ok(())
    }
}

fn create_index_body(bucket: &str, spec: &IndexSpec) -> serde_json::Value {
    json!({
        "vectorBucketName": bucket,
        "indexName": spec.name,
        "dataType": "float32",
        "dimension": spec.dimension,
        "distanceMetric": spec.distance_metric.to_string(),
        "metadataConfiguration": {
            "nonFilterableMetadataKeys": spec.non_filterable_metadata_keys,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_index::Metadata;

    #[test]
    fn test_query_response_parsing() {
        let body = r#"{
            "vectors": [
                {"key": "row-1-chunk-0", "distance": 0.12, "metadata": {"source_text": "risk"}},
                {"key": "row-2-chunk-0", "distance": 0.3}
            ],
            "distanceMetric": "cosine"
        }"#;
        let parsed: QueryResponse = serde_json::from_str(body).unwrap();
        let vectors = parsed.vectors.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].metadata["source_text"], "risk");
        assert!(vectors[1].metadata.is_empty());

        let empty: QueryResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.vectors.is_none());
    }

    #[test]
    fn test_put_vectors_body() {
        let mut metadata = Metadata::new();
        metadata.insert("id".to_string(), "row-0-chunk-0".to_string());
        let records = [VectorRecord::new("row-0-chunk-0", vec![1.0], metadata)];
        let body = PutVectorsRequest {
            vector_bucket_name: "talks",
            index_name: "t",
            vectors: &records,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["vectorBucketName"], "talks");
        assert_eq!(json["vectors"][0]["data"]["float32"][0], 1.0);
        assert_eq!(json["vectors"][0]["metadata"]["id"], "row-0-chunk-0");
    }

    #[test]
    fn test_create_index_body() {
        let body = create_index_body("talks", &IndexSpec::transcripts("t", 1024));
        assert_eq!(body["dimension"], 1024);
        assert_eq!(body["distanceMetric"], "cosine");
        assert_eq!(body["dataType"], "float32");
        assert_eq!(
            body["metadataConfiguration"]["nonFilterableMetadataKeys"]
                .as_array()
                .unwrap()
                .len(),
            9
        );
    }

    #[test]
    fn test_list_indexes_parsing() {
        let page: ListIndexesResponse = serde_json::from_str(
            r#"{"indexes": [{"indexName": "a", "vectorBucketName": "talks"}], "nextToken": "t1"}"#,
        )
        .unwrap();
        assert_eq!(page.indexes[0].index_name, "a");
        assert_eq!(page.next_token.as_deref(), Some("t1"));
    }
}
