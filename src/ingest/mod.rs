//! Transcript ingestion: rows to chunks to embeddings to index upserts.
//!
//! The index dimension is measured from the first transcript, the index is
//! created on first use, and vectors are uploaded in fixed-size batches.
//! Chunks that fail to embed are skipped; failed uploads abort the job.

mod chunking;
mod rows;

pub use chunking::Tokenizer;
pub use rows::{
    cell_to_string, collect_columns, load_rows, load_workbook, parse_rows, row_content, Row,
    NOT_AVAILABLE,
};

use crate::config::Settings;
use crate::embedding::Embedder;
use crate::error::{Result, VidseekError};
use crate::vector_index::{metadata_keys, IndexSpec, Metadata, VectorIndex, VectorRecord};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Parameters of an ingestion run.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    pub bucket: String,
    pub index_name: String,
    pub content_column: String,
    pub chunk_tokens: usize,
    pub batch_size: usize,
    pub preview_chars: usize,
    pub concurrency: usize,
}

impl IngestConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            bucket: settings.vector_index.bucket.clone(),
            index_name: settings.vector_index.index_name.clone(),
            content_column: settings.ingest.content_column.clone(),
            chunk_tokens: settings.ingest.chunk_tokens,
            batch_size: settings.ingest.batch_size,
            preview_chars: settings.ingest.preview_chars,
            concurrency: settings.ingest.concurrency,
        }
    }
}

/// Summary of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub rows_processed: usize,
    pub rows_skipped: usize,
    pub chunks_embedded: usize,
    pub chunks_skipped: usize,
    pub vectors_uploaded: usize,
    pub index_created: bool,
    pub dimension: usize,
}

/// Ingestion job over one set of rows.
pub struct IngestJob {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    config: IngestConfig,
    tokenizer: Tokenizer,
    progress: Option<ProgressBar>,
}

impl IngestJob {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, config: IngestConfig) -> Result<Self> {
        Ok(Self {
            embedder,
            index,
            config,
            tokenizer: Tokenizer::new()?,
            progress: None,
        })
    }

    /// Advance a progress bar once per row.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    #[instrument(skip(self, rows), fields(rows = rows.len(), index = %self.config.index_name))]
    pub async fn run(&self, rows: &[Row]) -> Result<IngestReport> {
        let started = Instant::now();
        let content_column = self.config.content_column.as_str();

        let columns = collect_columns(rows);
        if !columns.contains(content_column) {
            return Err(VidseekError::Ingest(format!(
                "Missing required column '{}'",
                content_column
            )));
        }
        info!("Read {} rows with columns: {:?}", rows.len(), columns);

        let first_content = rows
            .iter()
            .find_map(|row| row_content(row, content_column))
            .ok_or_else(|| {
                VidseekError::Ingest(format!(
                    "No valid transcript text found in '{}'",
                    content_column
                ))
            })?;

        let dimension = self.measure_dimension(&first_content).await?;
        let index_created = self.ensure_index(dimension).await?;

        let metadata_columns: Vec<&String> = columns
            .iter()
            .filter(|column| column.as_str() != content_column)
            .collect();

        let mut report = IngestReport {
            index_created,
            dimension,
            ..Default::default()
        };
        let mut batch: Vec<VectorRecord> = Vec::with_capacity(self.config.batch_size);

        for (row_index, row) in rows.iter().enumerate() {
            if let Some(progress) = &self.progress {
                progress.inc(1);
            }

            let Some(content) = row_content(row, content_column) else {
                warn!("Skipping row {} with empty transcript", row_index);
                report.rows_skipped += 1;
                continue;
            };
            report.rows_processed += 1;

            let chunks = self.tokenizer.chunk(&content, self.config.chunk_tokens);
            debug!("Row {} transcript split into {} chunks", row_index, chunks.len());

            let embeddings = self.embed_chunks(&chunks).await;

            for (chunk_index, (chunk, embedding)) in chunks.into_iter().zip(embeddings).enumerate() {
                let embedding = match embedding {
                    Ok(embedding) if embedding.len() == dimension => embedding,
                    Ok(embedding) => {
                        warn!(
                            "Skipping chunk {} of row {} due to dimension mismatch ({} != {})",
                            chunk_index,
                            row_index,
                            embedding.len(),
                            dimension
                        );
                        report.chunks_skipped += 1;
                        continue;
                    }
                    Err(e) => {
                        warn!("Failed to embed row {} chunk {}: {}", row_index, chunk_index, e);
                        report.chunks_skipped += 1;
                        continue;
                    }
                };

                let key = format!("row-{}-chunk-{}", row_index, chunk_index);
                let mut metadata: Metadata = metadata_columns
                    .iter()
                    .map(|column| ((*column).clone(), cell_to_string(row.get(column.as_str()))))
                    .collect();
                metadata.insert(metadata_keys::ID.to_string(), key.clone());
                metadata.insert(metadata_keys::SOURCE_TEXT.to_string(), chunk);

                batch.push(VectorRecord::new(key, embedding, metadata));
                report.chunks_embedded += 1;

                if batch.len() >= self.config.batch_size {
                    report.vectors_uploaded += self.upload(&batch).await?;
                    batch.clear();
                }
            }
        }

        if !batch.is_empty() {
            report.vectors_uploaded += self.upload(&batch).await?;
        }

        if let Some(progress) = &self.progress {
            progress.finish_and_clear();
        }

        info!(
            "Ingested {} rows ({} skipped), {} vectors uploaded in {:?}",
            report.rows_processed,
            report.rows_skipped,
            report.vectors_uploaded,
            started.elapsed()
        );
        Ok(report)
    }

    /// Embed a preview of the first transcript to learn the vector dimension.
    async fn measure_dimension(&self, first_content: &str) -> Result<usize> {
        let preview: String = first_content.chars().take(self.config.preview_chars).collect();
        let embedding = self.embedder.embed(&preview).await?;
        if embedding.is_empty() {
            return Err(VidseekError::Ingest(
                "Sample embedding has no dimensions".to_string(),
            ));
        }
        info!("Determined embedding dimension: {}", embedding.len());
        Ok(embedding.len())
    }

    /// Create the index unless it already exists. Returns whether it was created.
    async fn ensure_index(&self, dimension: usize) -> Result<bool> {
        let existing = self.index.list_indexes(&self.config.bucket).await?;
        if existing.iter().any(|name| *name == self.config.index_name) {
            info!(
                "Vector index '{}' already exists in '{}'",
                self.config.index_name, self.config.bucket
            );
            return Ok(false);
        }

        let spec = IndexSpec::transcripts(&self.config.index_name, dimension);
        self.index.create_index(&self.config.bucket, &spec).await?;
        info!(
            "Created vector index '{}' in bucket '{}'",
            self.config.index_name, self.config.bucket
        );
        Ok(true)
    }

    /// Embed chunks with bounded concurrency, keeping chunk order.
    async fn embed_chunks(&self, chunks: &[String]) -> Vec<Result<Vec<f32>>> {
        stream::iter(chunks.iter())
            .map(|chunk| self.embedder.embed(chunk))
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await
    }

    async fn upload(&self, batch: &[VectorRecord]) -> Result<usize> {
        debug!("Uploading batch of {} vectors", batch.len());
        self.index
            .put_vectors(&self.config.bucket, &self.config.index_name, batch)
            .await
            .map_err(|e| VidseekError::Ingest(format!("Error uploading batch: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_index::MemoryVectorIndex;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Three-dimensional embeddings; the text "FAIL" errors and "SHORT" gets two dimensions.
    struct FakeEmbedder {
        calls: AtomicUsize,
    }

    impl FakeEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text == "FAIL" {
                return Err(VidseekError::Embedding("model error".into()));
            }
            if text == "SHORT" {
                return Ok(vec![1.0, 0.0]);
            }
            Ok(vec![text.len() as f32, 1.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    fn config(batch_size: usize, chunk_tokens: usize) -> IngestConfig {
        IngestConfig {
            bucket: "talks".to_string(),
            index_name: "transcripts".to_string(),
            content_column: "Full Video Transcript".to_string(),
            chunk_tokens,
            batch_size,
            preview_chars: 1024,
            concurrency: 2,
        }
    }

    async fn memory_index() -> Arc<MemoryVectorIndex> {
        let index = Arc::new(MemoryVectorIndex::new());
        index.create_bucket("talks").await.unwrap();
        index
    }

    fn rows(value: serde_json::Value) -> Vec<Row> {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_ingest_creates_index_and_uploads() {
        let index = memory_index().await;
        let job = IngestJob::new(Arc::new(FakeEmbedder::new()), index.clone(), config(2, 2)).unwrap();

        let input = rows(json!([
            {"Full Video Transcript": "one two three", "Deck Link": "https://deck", "Video Length": 42},
            {"Full Video Transcript": "   ", "Deck Link": "https://skip"},
            {"Full Video Transcript": "alpha beta", "Content Link": null}
        ]));

        let report = job.run(&input).await.unwrap();
        assert_eq!(
            report,
            IngestReport {
                rows_processed: 2,
                rows_skipped: 1,
                chunks_embedded: 3,
                chunks_skipped: 0,
                vectors_uploaded: 3,
                index_created: true,
                dimension: 3,
            }
        );

        assert_eq!(index.list_indexes("talks").await.unwrap(), vec!["transcripts"]);
        assert_eq!(index.vector_count("talks", "transcripts").unwrap(), 3);

        let first = index.get("talks", "transcripts", "row-0-chunk-1").unwrap().unwrap();
        assert_eq!(first.metadata["source_text"], "three");
        assert_eq!(first.metadata["id"], "row-0-chunk-1");
        assert_eq!(first.metadata["Deck Link"], "https://deck");
        assert_eq!(first.metadata["Video Length"], "42");
        assert_eq!(first.metadata["Content Link"], NOT_AVAILABLE);
        assert!(!first.metadata.contains_key("Full Video Transcript"));

        let third = index.get("talks", "transcripts", "row-2-chunk-0").unwrap().unwrap();
        assert_eq!(third.metadata["Content Link"], NOT_AVAILABLE);
        assert_eq!(third.metadata["Video Length"], NOT_AVAILABLE);
    }

    #[tokio::test]
    async fn test_existing_index_is_reused() {
        let index = memory_index().await;
        index
            .create_index("talks", &IndexSpec::transcripts("transcripts", 3))
            .await
            .unwrap();
        let job = IngestJob::new(Arc::new(FakeEmbedder::new()), index, config(100, 6000)).unwrap();

        let report = job
            .run(&rows(json!([{"Full Video Transcript": "hello"}])))
            .await
            .unwrap();
        assert!(!report.index_created);
        assert_eq!(report.vectors_uploaded, 1);
    }

    #[tokio::test]
    async fn test_bad_chunks_are_skipped() {
        let index = memory_index().await;
        let job = IngestJob::new(Arc::new(FakeEmbedder::new()), index.clone(), config(100, 1)).unwrap();

        let report = job
            .run(&rows(json!([{"Full Video Transcript": "good FAIL SHORT fine"}])))
            .await
            .unwrap();
        assert_eq!(report.chunks_embedded, 2);
        assert_eq!(report.chunks_skipped, 2);
        assert!(index.get("talks", "transcripts", "row-0-chunk-0").unwrap().is_some());
        assert!(index.get("talks", "transcripts", "row-0-chunk-1").unwrap().is_none());
        assert!(index.get("talks", "transcripts", "row-0-chunk-3").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_content_column() {
        let index = memory_index().await;
        let job = IngestJob::new(Arc::new(FakeEmbedder::new()), index, config(100, 6000)).unwrap();

        let err = job.run(&rows(json!([{"Title": "x"}]))).await.unwrap_err();
        assert!(err.to_string().contains("Missing required column 'Full Video Transcript'"));
    }

    #[tokio::test]
    async fn test_no_content_rows() {
        let index = memory_index().await;
        let embedder = Arc::new(FakeEmbedder::new());
        let job = IngestJob::new(embedder.clone(), index, config(100, 6000)).unwrap();

        let err = job
            .run(&rows(json!([{"Full Video Transcript": ""}, {"Full Video Transcript": null}])))
            .await
            .unwrap_err();
        assert!(matches!(err, VidseekError::Ingest(_)));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_bucket_aborts() {
        let index = Arc::new(MemoryVectorIndex::new());
        let job = IngestJob::new(Arc::new(FakeEmbedder::new()), index, config(100, 6000)).unwrap();

        let err = job
            .run(&rows(json!([{"Full Video Transcript": "hello"}])))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_upload_failure_aborts() {
        // The existing index expects two dimensions, the embedder produces three.
        let index = memory_index().await;
        index
            .create_index("talks", &IndexSpec::transcripts("transcripts", 2))
            .await
            .unwrap();
        let job = IngestJob::new(Arc::new(FakeEmbedder::new()), index, config(100, 6000)).unwrap();

        let err = job
            .run(&rows(json!([{"Full Video Transcript": "hello"}])))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Error uploading batch"));
    }
}
