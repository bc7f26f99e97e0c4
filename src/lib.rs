//! Vidseek - persona-aware search over video transcripts.
//!
//! Answers a natural-language query with the two most relevant videos from
//! a transcript library stored in a vector index, plus a short
//! recommendation explaining the pick.
//!
//! # Overview
//!
//! Vidseek allows you to:
//! - Rank transcript chunks by a blend of semantic, keyword and metadata relevance
//! - Tune the ranking to the asker (leadership, technical or general)
//! - Serve the search as a tool behind a reasoning agent
//! - Ingest transcript rows into the index and manage its lifecycle
//!
//! # Architecture
//!
//! - `config` - Configuration management
//! - `transport` - HTTP clients and bounded retry
//! - `embedding` - Embedding generation
//! - `vector_index` - Vector index abstraction
//! - `retrieval` - Scoring, clustering and the search pipeline
//! - `agent` - Tool-calling agent and invocation entry point
//! - `ingest` - Transcript ingestion job
//! - `provision` - Bucket and index lifecycle handlers
//! - `orchestrator` - Component wiring
//!
//! # Example
//!
//! ```rust,no_run
//! use vidseek::config::Settings;
//! use vidseek::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let envelope = orchestrator.pipeline().run_tool("How do I secure an LLM app?").await;
//!     println!("{}", envelope.to_json_string());
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod orchestrator;
pub mod provision;
pub mod retrieval;
pub mod transport;
pub mod vector_index;

pub use error::{Result, VidseekError};
