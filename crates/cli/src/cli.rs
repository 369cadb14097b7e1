//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// evalmux - batch evaluation across LLM and translation providers
#[derive(Parser, Debug)]
#[command(
    name = "evalmux",
    author,
    version,
    about = "Batch evaluation across LLM and translation providers",
    long_about = "Sends every input item to every configured backend under a bounded\n\
                  concurrency limit, records one answer or typed failure per pair, and\n\
                  writes a table with one row per item and one column group per backend."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "EVALMUX_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "EVALMUX_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a batch: load items, query every backend, write the result table
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "evalmux.toml", env = "EVALMUX_CONFIG")]
    pub config: PathBuf,

    /// Override the input file from configuration
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Write a CSV result table here (replaces a csv sink named "output", or adds one)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Only run these backends (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Override the maximum number of concurrent calls
    #[arg(long, env = "EVALMUX_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Override the default per-call timeout in milliseconds
    #[arg(long, env = "EVALMUX_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Load items and build backends, then exit without querying
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "EVALMUX_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "evalmux.toml", env = "EVALMUX_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "evalmux.toml", env = "EVALMUX_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show whether each backend's credential is set (keys are masked)
    #[arg(long)]
    pub credentials: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
