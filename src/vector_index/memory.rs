//! In-memory vector index implementation.
//!
//! Useful for testing and small datasets.

use super::{IndexSpec, QueryRequest, VectorIndex, VectorMatch, VectorRecord};
use crate::error::{Result, VidseekError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

struct StoredIndex {
    spec: IndexSpec,
    /// Insertion order is preserved so equal distances keep a stable order.
    records: Vec<VectorRecord>,
}

type Buckets = HashMap<String, HashMap<String, StoredIndex>>;

/// In-memory vector index.
pub struct MemoryVectorIndex {
    buckets: RwLock<Buckets>,
}

impl MemoryVectorIndex {
    /// Create a new, empty in-memory index.
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Buckets>> {
        self.buckets
            .read()
            .map_err(|e| VidseekError::VectorIndex(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Buckets>> {
        self.buckets
            .write()
            .map_err(|e| VidseekError::VectorIndex(format!("Failed to acquire lock: {}", e)))
    }

    /// Number of vectors stored in an index.
    pub fn vector_count(&self, bucket: &str, index: &str) -> Result<usize> {
        let buckets = self.read()?;
        Ok(lookup(&buckets, bucket, index)?.records.len())
    }

    /// Fetch a stored vector by key.
    pub fn get(&self, bucket: &str, index: &str, key: &str) -> Result<Option<VectorRecord>> {
        let buckets = self.read()?;
        Ok(lookup(&buckets, bucket, index)?
            .records
            .iter()
            .find(|r| r.key == key)
            .cloned())
    }
}

impl Default for MemoryVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup<'a>(buckets: &'a Buckets, bucket: &str, index: &str) -> Result<&'a StoredIndex> {
    buckets
        .get(bucket)
        .ok_or_else(|| VidseekError::BucketNotFound(bucket.to_string()))?
        .get(index)
        .ok_or_else(|| VidseekError::IndexNotFound(format!("{}/{}", bucket, index)))
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn query(&self, request: &QueryRequest) -> Result<Vec<VectorMatch>> {
        let buckets = self.read()?;
        let stored = lookup(&buckets, &request.vector_bucket_name, &request.index_name)?;

        let query = &request.query_vector.float32;
        if query.len() != stored.spec.dimension {
            return Err(VidseekError::VectorIndex(format!(
                "Query vector has {} dimensions, index expects {}",
                query.len(),
                stored.spec.dimension
            )));
        }

        let mut matches: Vec<VectorMatch> = stored
            .records
            .iter()
            .map(|r| VectorMatch {
                key: r.key.clone(),
                distance: request
                    .return_distance
                    .then(|| stored.spec.distance_metric.distance(query, &r.data.float32)),
                metadata: if request.return_metadata {
                    r.metadata.clone()
                } else {
                    Default::default()
                },
            })
            .collect();

        matches.sort_by(|a, b| {
            let da = a.distance.unwrap_or(f64::MAX);
            let db = b.distance.unwrap_or(f64::MAX);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(request.top_k);

        Ok(matches)
    }

    async fn put_vectors(&self, bucket: &str, index: &str, vectors: &[VectorRecord]) -> Result<usize> {
        let mut buckets = self.write()?;
        let stored = buckets
            .get_mut(bucket)
            .ok_or_else(|| VidseekError::BucketNotFound(bucket.to_string()))?
            .get_mut(index)
            .ok_or_else(|| VidseekError::IndexNotFound(format!("{}/{}", bucket, index)))?;

        if let Some(bad) = vectors
            .iter()
            .find(|v| v.data.float32.len() != stored.spec.dimension)
        {
            return Err(VidseekError::VectorIndex(format!(
                "Vector {} has {} dimensions, index expects {}",
                bad.key,
                bad.data.float32.len(),
                stored.spec.dimension
            )));
        }

        for record in vectors {
            match stored.records.iter_mut().find(|r| r.key == record.key) {
                Some(existing) => *existing = record.clone(),
                None => stored.records.push(record.clone()),
            }
        }

        Ok(vectors.len())
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let mut buckets = self.write()?;
        buckets.entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let mut buckets = self.write()?;
        buckets
            .remove(bucket)
            .map(|_| ())
            .ok_or_else(|| VidseekError::BucketNotFound(bucket.to_string()))
    }

    async fn create_index(&self, bucket: &str, spec: &IndexSpec) -> Result<()> {
        let mut buckets = self.write()?;
        let indexes = buckets
            .get_mut(bucket)
            .ok_or_else(|| VidseekError::BucketNotFound(bucket.to_string()))?;

        indexes.entry(spec.name.clone()).or_insert_with(|| StoredIndex {
            spec: spec.clone(),
            records: Vec::new(),
        });
        Ok(())
    }

    async fn list_indexes(&self, bucket: &str) -> Result<Vec<String>> {
        let buckets = self.read()?;
        let mut names: Vec<String> = buckets
            .get(bucket)
            .ok_or_else(|| VidseekError::BucketNotFound(bucket.to_string()))?
            .keys()
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    async fn delete_index(&self, bucket: &str, index: &str) -> Result<()> {
        let mut buckets = self.write()?;
        buckets
            .get_mut(bucket)
            .ok_or_else(|| VidseekError::BucketNotFound(bucket.to_string()))?
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| VidseekError::IndexNotFound(format!("{}/{}", bucket, index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_index::Metadata;

    fn record(key: &str, v: Vec<f32>) -> VectorRecord {
        let mut metadata = Metadata::new();
        metadata.insert("source_text".to_string(), format!("text of {}", key));
        VectorRecord::new(key, v, metadata)
    }

    #[tokio::test]
    async fn test_memory_vector_index() {
        let index = MemoryVectorIndex::new();
        index.create_bucket("talks").await.unwrap();
        index
            .create_index("talks", &IndexSpec::transcripts("t", 3))
            .await
            .unwrap();

        let written = index
            .put_vectors(
                "talks",
                "t",
                &[record("a", vec![1.0, 0.0, 0.0]), record("b", vec![0.0, 1.0, 0.0])],
            )
            .await
            .unwrap();
        assert_eq!(written, 2);

        let matches = index
            .query(&QueryRequest::new("talks", "t", vec![1.0, 0.0, 0.0], 10))
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].key, "a");
        assert!(matches[0].distance.unwrap() < matches[1].distance.unwrap());
        assert_eq!(matches[0].metadata["source_text"], "text of a");

        let top1 = index
            .query(&QueryRequest::new("talks", "t", vec![0.0, 1.0, 0.0], 1))
            .await
            .unwrap();
        assert_eq!(top1.len(), 1);
        assert_eq!(top1[0].key, "b");
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_key() {
        let index = MemoryVectorIndex::new();
        index.create_bucket("talks").await.unwrap();
        index
            .create_index("talks", &IndexSpec::transcripts("t", 2))
            .await
            .unwrap();

        index.put_vectors("talks", "t", &[record("a", vec![1.0, 0.0])]).await.unwrap();
        index.put_vectors("talks", "t", &[record("a", vec![0.0, 1.0])]).await.unwrap();

        assert_eq!(index.vector_count("talks", "t").unwrap(), 1);
        let stored = index.get("talks", "t", "a").unwrap().unwrap();
        assert_eq!(stored.data.float32, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let index = MemoryVectorIndex::new();
        index.create_bucket("talks").await.unwrap();
        index
            .create_index("talks", &IndexSpec::transcripts("t", 2))
            .await
            .unwrap();

        let err = index
            .put_vectors("talks", "t", &[record("a", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, VidseekError::VectorIndex(_)));
    }

    #[tokio::test]
    async fn test_missing_resources() {
        let index = MemoryVectorIndex::new();
        let err = index.list_indexes("nope").await.unwrap_err();
        assert!(matches!(err, VidseekError::BucketNotFound(_)));

        index.create_bucket("talks").await.unwrap();
        let err = index.delete_index("talks", "nope").await.unwrap_err();
        assert!(matches!(err, VidseekError::IndexNotFound(_)));

        index.delete_bucket("talks").await.unwrap();
        assert!(index.delete_bucket("talks").await.unwrap_err().is_not_found());
    }
}
