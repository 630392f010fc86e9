// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `jobdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jobdag",
    version,
    about = "Run CI jobs in dependency order, in parallel where possible.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the pipeline file (TOML).
    ///
    /// Default: `Jobdag.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `JOBDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the job order, but don't execute any steps.
    #[arg(long)]
    pub dry_run: bool,

    /// Record runs in this JSON Lines file (overrides `[config].ledger`).
    #[arg(long, value_name = "PATH")]
    pub ledger: Option<PathBuf>,

    /// Commit recorded with the run.
    #[arg(long, value_name = "SHA")]
    pub commit: Option<String>,

    /// Branch recorded with the run.
    #[arg(long, value_name = "NAME")]
    pub branch: Option<String>,

    /// Print the N most recent ledger entries and exit.
    #[arg(long, value_name = "N")]
    pub history: Option<usize>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
