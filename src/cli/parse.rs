//! CLI parse: clap types for keytree. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// keytree CLI - inspect and edit persisted container trees
#[derive(Parser)]
#[command(name = "keytree")]
#[command(about = "Inspect, edit, diff and watch persisted key-value trees")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the effective configuration as TOML
    Config,
    /// List persisted tree handles
    List,
    /// Show every leaf of a persisted tree
    Show {
        /// Tree handle (defaults to store.handle)
        handle: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the value at a dot-separated path
    Get {
        path: String,
        #[arg(long)]
        handle: Option<String>,
    },
    /// Set the value at a dot-separated path and save the tree
    Set {
        path: String,
        value: String,
        /// Value kind for new leaves (i32, double, bool, string, color, ...)
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        handle: Option<String>,
    },
    /// Compare two persisted trees
    Diff {
        left: String,
        right: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Poll a persisted tree and report changes until interrupted
    Watch {
        handle: Option<String>,
        /// Polling interval in milliseconds (defaults to auto_update.interval_ms)
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}
