//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Margin CLI - route low-confidence extraction pages through human review.
#[derive(Debug, Parser)]
#[command(name = "margin")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "MARGIN_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (minimal)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Split a completed extraction job into review tasks
    Split(SplitArgs),

    /// Record a completed review
    Ingest(IngestArgs),

    /// Show the tracking record of a job
    Status(StatusArgs),

    /// Poll the inbox directory and process event files
    Worker(WorkerArgs),
}

/// Arguments for the split command.
#[derive(Debug, Parser)]
pub struct SplitArgs {
    /// Extraction job id
    #[arg(long, requires = "document", required_unless_present = "event")]
    pub job_id: Option<String>,

    /// Source document (s3://bucket/key)
    #[arg(long)]
    pub document: Option<String>,

    /// Reported job status
    #[arg(long, default_value = "SUCCEEDED")]
    pub status: String,

    /// Read the extraction-completed event from a JSON file
    #[arg(long, conflicts_with_all = ["job_id", "document"])]
    pub event: Option<PathBuf>,
}

/// Arguments for the ingest command.
#[derive(Debug, Parser)]
pub struct IngestArgs {
    /// Consolidation request URI (s3://bucket/key)
    #[arg(long, required_unless_present = "event")]
    pub payload: Option<String>,

    /// Read the review-completed event from a JSON file
    #[arg(long, conflicts_with = "payload")]
    pub event: Option<PathBuf>,
}

/// Arguments for the status command.
#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Extraction job id
    pub job_id: String,
}

/// Arguments for the worker command.
#[derive(Debug, Parser)]
pub struct WorkerArgs {
    /// Stop after this many polls
    #[arg(long)]
    pub cycles: Option<usize>,

    /// Inbox directory (overrides the configuration)
    #[arg(long)]
    pub inbox: Option<PathBuf>,

    /// Seconds between polls (overrides the configuration)
    #[arg(long)]
    pub interval: Option<u64>,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}
