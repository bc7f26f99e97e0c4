//! SQLite-based vector index implementation.
//!
//! Uses SQLite for storage with distances computed in Rust for simplicity.
//! For large corpora, point the HTTP provider at a managed vector bucket instead.

use super::{
    DistanceMetric, IndexSpec, Metadata, QueryRequest, VectorIndex, VectorMatch, VectorRecord,
};
use crate::error::{Result, VidseekError};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS buckets (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS indexes (
    bucket TEXT NOT NULL,
    name TEXT NOT NULL,
    dimension INTEGER NOT NULL,
    distance_metric TEXT NOT NULL,
    non_filterable_keys TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (bucket, name)
);

CREATE TABLE IF NOT EXISTS vectors (
    bucket TEXT NOT NULL,
    index_name TEXT NOT NULL,
    key TEXT NOT NULL,
    embedding BLOB NOT NULL,
    metadata TEXT NOT NULL,
    PRIMARY KEY (bucket, index_name, key)
);

CREATE INDEX IF NOT EXISTS idx_vectors_index ON vectors(bucket, index_name);
"#;

/// SQLite-based vector index.
pub struct SqliteVectorIndex {
    conn: Mutex<Connection>,
}

impl SqliteVectorIndex {
    /// Open (or create) a SQLite vector index file.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector index at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector index (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| VidseekError::VectorIndex(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn bucket_exists(conn: &Connection, bucket: &str) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM buckets WHERE name = ?1",
            params![bucket],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn require_bucket(conn: &Connection, bucket: &str) -> Result<()> {
        if Self::bucket_exists(conn, bucket)? {
            Ok(())
        } else {
            Err(VidseekError::BucketNotFound(bucket.to_string()))
        }
    }

    /// Dimension and metric of an index, or a not-found error.
    fn index_params(conn: &Connection, bucket: &str, index: &str) -> Result<(usize, DistanceMetric)> {
        Self::require_bucket(conn, bucket)?;

        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT dimension, distance_metric FROM indexes WHERE bucket = ?1 AND name = ?2",
                params![bucket, index],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (dimension, metric) =
            row.ok_or_else(|| VidseekError::IndexNotFound(format!("{}/{}", bucket, index)))?;
        let metric = metric.parse::<DistanceMetric>().map_err(VidseekError::VectorIndex)?;
        Ok((dimension as usize, metric))
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    #[instrument(skip(self, request), fields(index = %request.index_name, top_k = request.top_k))]
    async fn query(&self, request: &QueryRequest) -> Result<Vec<VectorMatch>> {
        let conn = self.lock()?;
        let (dimension, metric) =
            Self::index_params(&conn, &request.vector_bucket_name, &request.index_name)?;

        let query = &request.query_vector.float32;
        if query.len() != dimension {
            return Err(VidseekError::VectorIndex(format!(
                "Query vector has {} dimensions, index expects {}",
                query.len(),
                dimension
            )));
        }

        let mut stmt = conn.prepare(
            r#"
            SELECT key, embedding, metadata
            FROM vectors
            WHERE bucket = ?1 AND index_name = ?2
            ORDER BY rowid
            "#,
        )?;

        let rows = stmt.query_map(
            params![request.vector_bucket_name, request.index_name],
            |row| {
                let key: String = row.get(0)?;
                let embedding_bytes: Vec<u8> = row.get(1)?;
                let metadata_json: String = row.get(2)?;
                Ok((key, embedding_bytes, metadata_json))
            },
        )?;

        let mut matches = Vec::new();
        for row in rows {
            let (key, embedding_bytes, metadata_json) = row?;
            let embedding = Self::bytes_to_embedding(&embedding_bytes);
            let metadata: Metadata = if request.return_metadata {
                serde_json::from_str(&metadata_json)?
            } else {
                Metadata::new()
            };
            matches.push(VectorMatch {
                key,
                distance: Some(metric.distance(query, &embedding)),
                metadata,
            });
        }

        // Sort by distance ascending
        matches.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(request.top_k);

        if !request.return_distance {
            for m in &mut matches {
                m.distance = None;
            }
        }

        debug!("Found {} nearest vectors", matches.len());
        Ok(matches)
    }

    #[instrument(skip(self, vectors), fields(count = vectors.len()))]
    async fn put_vectors(&self, bucket: &str, index: &str, vectors: &[VectorRecord]) -> Result<usize> {
        let conn = self.lock()?;
        let (dimension, _) = Self::index_params(&conn, bucket, index)?;

        if let Some(bad) = vectors.iter().find(|v| v.data.float32.len() != dimension) {
            return Err(VidseekError::VectorIndex(format!(
                "Vector {} has {} dimensions, index expects {}",
                bad.key,
                bad.data.float32.len(),
                dimension
            )));
        }

        let tx = conn.unchecked_transaction()?;

        for record in vectors {
            let metadata_json = serde_json::to_string(&record.metadata)?;
            tx.execute(
                r#"
                INSERT OR REPLACE INTO vectors (bucket, index_name, key, embedding, metadata)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    bucket,
                    index,
                    record.key,
                    Self::embedding_to_bytes(&record.data.float32),
                    metadata_json,
                ],
            )?;
        }

        tx.commit()?;
        info!("Upserted {} vectors into {}/{}", vectors.len(), bucket, index);
        Ok(vectors.len())
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)",
            params![bucket, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let conn = self.lock()?;
        Self::require_bucket(&conn, bucket)?;

        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM vectors WHERE bucket = ?1", params![bucket])?;
        tx.execute("DELETE FROM indexes WHERE bucket = ?1", params![bucket])?;
        tx.execute("DELETE FROM buckets WHERE name = ?1", params![bucket])?;
        tx.commit()?;

        info!("Deleted bucket {}", bucket);
        Ok(())
    }

    async fn create_index(&self, bucket: &str, spec: &IndexSpec) -> Result<()> {
        let conn = self.lock()?;
        Self::require_bucket(&conn, bucket)?;

        conn.execute(
            r#"
            INSERT OR IGNORE INTO indexes
            (bucket, name, dimension, distance_metric, non_filterable_keys, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                bucket,
                spec.name,
                spec.dimension as i64,
                spec.distance_metric.to_string(),
                serde_json::to_string(&spec.non_filterable_metadata_keys)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn list_indexes(&self, bucket: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        Self::require_bucket(&conn, bucket)?;

        let mut stmt = conn.prepare("SELECT name FROM indexes WHERE bucket = ?1 ORDER BY name")?;
        let names = stmt
            .query_map(params![bucket], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    async fn delete_index(&self, bucket: &str, index: &str) -> Result<()> {
        let conn = self.lock()?;
        Self::index_params(&conn, bucket, index)?;

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM vectors WHERE bucket = ?1 AND index_name = ?2",
            params![bucket, index],
        )?;
        tx.execute(
            "DELETE FROM indexes WHERE bucket = ?1 AND name = ?2",
            params![bucket, index],
        )?;
        tx.commit()?;

        info!("Deleted index {}/{}", bucket, index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, v: Vec<f32>, text: &str) -> VectorRecord {
        let mut metadata = Metadata::new();
        metadata.insert("source_text".to_string(), text.to_string());
        VectorRecord::new(key, v, metadata)
    }

    #[tokio::test]
    async fn test_sqlite_vector_index() {
        let index = SqliteVectorIndex::in_memory().unwrap();
        index.create_bucket("talks").await.unwrap();
        index
            .create_index("talks", &IndexSpec::transcripts("t", 3))
            .await
            .unwrap();
        assert_eq!(index.list_indexes("talks").await.unwrap(), vec!["t".to_string()]);

        index
            .put_vectors(
                "talks",
                "t",
                &[
                    record("a", vec![1.0, 0.0, 0.0], "governance"),
                    record("b", vec![0.0, 1.0, 0.0], "sdk"),
                ],
            )
            .await
            .unwrap();

        let matches = index
            .query(&QueryRequest::new("talks", "t", vec![1.0, 0.0, 0.0], 10))
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].key, "a");
        assert!(matches[0].distance.unwrap().abs() < 0.001);
        assert_eq!(matches[0].metadata["source_text"], "governance");

        index.delete_index("talks", "t").await.unwrap();
        assert!(index.list_indexes("talks").await.unwrap().is_empty());
        assert!(index.delete_index("talks", "t").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_replace_and_delete_bucket() {
        let index = SqliteVectorIndex::in_memory().unwrap();
        index.create_bucket("talks").await.unwrap();
        // creating twice is a no-op
        index.create_bucket("talks").await.unwrap();
        index
            .create_index("talks", &IndexSpec::transcripts("t", 2))
            .await
            .unwrap();

        index.put_vectors("talks", "t", &[record("a", vec![1.0, 0.0], "old")]).await.unwrap();
        index.put_vectors("talks", "t", &[record("a", vec![1.0, 0.0], "new")]).await.unwrap();

        let matches = index
            .query(&QueryRequest::new("talks", "t", vec![1.0, 0.0], 5))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].metadata["source_text"], "new");

        index.delete_bucket("talks").await.unwrap();
        assert!(matches!(
            index.list_indexes("talks").await.unwrap_err(),
            VidseekError::BucketNotFound(_)
        ));
    }

    #[test]
    fn test_embedding_bytes_roundtrip() {
        let v = vec![0.5f32, -1.25, 3.0];
        let bytes = SqliteVectorIndex::embedding_to_bytes(&v);
        assert_eq!(bytes.len(), 12);
        assert_eq!(SqliteVectorIndex::bytes_to_embedding(&bytes), v);
    }
}
