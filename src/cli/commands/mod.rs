//! CLI command implementations.

mod config;
mod ingest;
mod invoke;
mod provision;
mod search;
mod serve;

pub use config::run_config;
pub use ingest::run_ingest;
pub use invoke::run_invoke;
pub use provision::run_provision;
pub use search::run_search;
pub use serve::{router, run_serve};
