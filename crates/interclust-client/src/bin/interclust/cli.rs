//! CLI definitions for interclust.

use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "interclust",
    version,
    about = "Interactive hierarchical clustering client",
    infer_subcommands = true,
    arg_required_else_help = false,
    after_help = "Examples:\n  interclust                          # connect with ./interclust.toml or defaults\n  interclust run --host broker.local  # connect to another broker\n  interclust run --offline            # explore without a broker\n  interclust check-config --config ./interclust.toml"
)]
pub struct Cli {
    /// Log debug details to stderr.
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect to the broker and start the interactive console.
    #[command(
        after_help = "Examples:\n  interclust run\n  interclust run --config ./interclust.toml\n  interclust run --host 10.0.0.5 --port 1884"
    )]
    Run {
        /// Configuration file (defaults to ./interclust.toml when present).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Broker host override.
        #[arg(long)]
        host: Option<String>,
        /// Broker port override.
        #[arg(long)]
        port: Option<u16>,
        /// Record requests locally instead of connecting to a broker.
        #[arg(long, action = ArgAction::SetTrue)]
        offline: bool,
    },
    /// Validate a configuration file and print the effective settings.
    CheckConfig {
        /// Configuration file (defaults to ./interclust.toml when present).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}
