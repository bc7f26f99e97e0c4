//! CLI module for Vidseek.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Vidseek - persona-aware search over a library of video transcripts.
///
/// Ranks transcript chunks stored in a vector index by a blend of semantic,
/// keyword and metadata relevance, and recommends the best two videos.
#[derive(Parser, Debug)]
#[command(name = "vidseek")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the search tool directly and print its JSON envelope
    Search {
        /// Search query
        query: String,

        /// Render the results for reading instead of printing the envelope
        #[arg(long)]
        human: bool,
    },

    /// Send a prompt through the agent entry point
    Invoke {
        /// The prompt for the agent
        prompt: String,
    },

    /// Start the HTTP runtime (/invocations, /ping, /search)
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Embed a workbook, JSON or JSON-lines file of transcript rows into the index
    Ingest {
        /// Path to the rows file
        file: PathBuf,
    },

    /// Handle a bucket or index lifecycle event
    Provision {
        /// Resource the event targets
        #[arg(value_enum)]
        kind: ResourceArg,

        /// Path to the event JSON
        #[arg(short, long)]
        event: PathBuf,

        /// Time budget left for the handler, in seconds
        #[arg(long, default_value = "60")]
        remaining_secs: u64,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Lifecycle resource selector.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceArg {
    Bucket,
    Index,
}

impl From<ResourceArg> for crate::provision::ResourceKind {
    fn from(arg: ResourceArg) -> Self {
        match arg {
            ResourceArg::Bucket => crate::provision::ResourceKind::Bucket,
            ResourceArg::Index => crate::provision::ResourceKind::Index,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the current configuration to the config file
    Init,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provision() {
        let cli = Cli::try_parse_from([
            "vidseek",
            "-vv",
            "provision",
            "index",
            "--event",
            "event.json",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Provision {
                kind,
                event,
                remaining_secs,
            } => {
                assert_eq!(kind, ResourceArg::Index);
                assert_eq!(event, PathBuf::from("event.json"));
                assert_eq!(remaining_secs, 60);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_serve_defaults_to_settings() {
        let cli = Cli::try_parse_from(["vidseek", "serve", "--port", "9000"]).unwrap();
        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(host, None);
                assert_eq!(port, Some(9000));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_resource_rejected() {
        assert!(Cli::try_parse_from(["vidseek", "provision", "table", "--event", "e.json"]).is_err());
    }
}
