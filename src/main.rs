//! Vidseek CLI entry point.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vidseek::cli::{commands, Cli, Commands};
use vidseek::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.as_ref().map(PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("vidseek={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    info!(
        "Using bucket {:?}, index {:?}, embedding model {:?}, region {:?}",
        settings.vector_index.bucket,
        settings.vector_index.index_name,
        settings.embedding.model_id,
        settings.general.region
    );
    settings.warn_missing();

    // Execute command
    match &cli.command {
        Commands::Search { query, human } => {
            commands::run_search(query, *human, settings).await?;
        }

        Commands::Invoke { prompt } => {
            commands::run_invoke(prompt, settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host.as_deref(), *port, settings).await?;
        }

        Commands::Ingest { file } => {
            commands::run_ingest(file, settings).await?;
        }

        Commands::Provision {
            kind,
            event,
            remaining_secs,
        } => {
            commands::run_provision(*kind, event, *remaining_secs, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings, config_path)?;
        }
    }

    Ok(())
}
