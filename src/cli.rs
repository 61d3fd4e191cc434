// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `suitedag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "suitedag",
    version,
    about = "Run a suite of test commands as a dependency graph with bounded concurrency.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the suite file (TOML).
    ///
    /// Default: `Suitedag.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Suitedag.toml")]
    pub config: String,

    /// Maximum number of tests and hooks running at once (0 = unbounded).
    ///
    /// Overrides `[config].concurrency`.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Only run tests whose full title matches this regular expression.
    #[arg(long, value_name = "REGEX")]
    pub grep: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SUITEDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the dependency graph (graphviz dot), but
    /// don't run anything.
    #[arg(long)]
    pub dry_run: bool,
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
