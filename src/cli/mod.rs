//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// recsync - correlate records across two datasets and synchronize their files
#[derive(Parser, Debug)]
#[command(name = "recsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Job config file (default: ./recsync.json, then ~/.recsync/config.json)
    #[arg(long, global = true, env = "RECSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Compute plans without writing to the target
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print version information
    Version,

    /// File synchronization
    Files {
        #[command(subcommand)]
        command: FilesCommands,
    },

    /// Show how records of an object pair up between the datasets
    Correlate(DatasetArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Source and target datasets, plus an optional object.
#[derive(Args, Debug, Clone)]
pub struct DatasetArgs {
    /// Source dataset (.db/.sqlite file or JSONL directory)
    #[arg(long, short)]
    pub source: PathBuf,

    /// Target dataset (.db/.sqlite file or JSONL directory)
    #[arg(long, short)]
    pub target: PathBuf,

    /// Object to process (default: every configured object)
    #[arg(long, short)]
    pub object: Option<String>,
}

// ============================================================================
// Files Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum FilesCommands {
    /// Compute and print the plan without writing
    Plan(DatasetArgs),

    /// Apply the plan to the target
    Sync(DatasetArgs),
}
