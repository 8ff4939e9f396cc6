//! CLI module for Opptak.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Opptak - Session Recording Pipeline
///
/// Ingests recorded sessions from a remote source, produces diarized
/// transcripts and AI summaries, and serves the finished audio over HTTP.
/// The name "Opptak" comes from the Norwegian word for "recording."
#[derive(Parser, Debug)]
#[command(name = "opptak")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
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
    /// Check system requirements and configuration
    Doctor,

    /// Process a single session in the foreground
    Process {
        /// Resource identifier of the session to process
        resource: String,

        /// Owner identity used for billing
        #[arg(short, long, default_value = "local")]
        owner: String,
    },

    /// Start the HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
