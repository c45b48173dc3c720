//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Burn-up and cumulative-flow data from work-item change histories.
///
/// Extracts root-and-descendant hierarchies from a tracking-tool export,
/// replays their change logs, and projects daily counters.
#[derive(Debug, Parser)]
#[command(name = "burnup", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable trace output and full error chains.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Extract hierarchies and write them as JSON.
    Hierarchies(ExtractArgs),

    /// Extract hierarchies and write projected daily events as JSON.
    Events(ExtractArgs),

    /// Print the daily snapshots of one work item as JSON lines.
    History(HistoryArgs),
}

/// Arguments shared by the extracting commands.
#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Source export file.
    pub source: PathBuf,

    /// Output JSON file.
    pub output: PathBuf,

    /// Root work item ID (repeatable). Roots are discovered when omitted.
    #[arg(long = "id", value_name = "ID")]
    pub ids: Vec<String>,

    /// Override the configured worker limit.
    #[arg(long)]
    pub max_workers: Option<usize>,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Source export file.
    pub source: PathBuf,

    /// Work item ID.
    pub id: String,

    /// Skip change-log fields that have no applicator.
    #[arg(long)]
    pub suppress_unsupported_fields: bool,
}
