//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Presence tracker.
///
/// Reads a JSON tracking request of connect/disconnect heartbeats and session
/// events, and reports how long two distinct users were present together.
#[derive(Debug, Parser)]
#[command(name = "pt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Without a subcommand, behaves like `track` reading stdin.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compute tracked time, last activity and session state.
    Track(InputArgs),

    /// Print the canonical (flattened, time-ordered) event stream.
    Flatten(InputArgs),
}

/// Where to read the request from.
#[derive(Debug, Args)]
pub struct InputArgs {
    /// Request file; reads stdin when omitted or `-`.
    #[arg(short, long)]
    pub input: Option<PathBuf>,
}
