// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `magpipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "magpipe",
    version,
    about = "Incremental DAG runner for a multi-stage metagenomics pipeline.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `magpipe.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "magpipe.toml", global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `MAGPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// Build the dependency graph for the given target stages and execute
    /// whatever is not already up to date.
    Run {
        /// Target stage names (e.g. `megahit`, `gtdbtk`).
        #[arg(required = true, value_name = "TARGET")]
        targets: Vec<String>,

        /// Restrict the run to a subset of discovered samples.
        #[arg(long, value_name = "ID,...", value_delimiter = ',')]
        samples: Vec<String>,

        /// Global concurrency budget in CPU slots.
        #[arg(long, value_name = "N", default_value_t = 8)]
        jobs: u32,

        /// Build the graph and print the planned execution order without
        /// invoking anything.
        #[arg(long)]
        dry_run: bool,

        /// Stop dispatching new nodes after the first failure (running nodes
        /// finish normally). Default is to keep independent branches going.
        #[arg(long)]
        stop_on_error: bool,
    },

    /// Compute per-bin normalized abundances from a counts table
    /// (`bin_id mapped_reads bin_length_bp` per line).
    Abundance {
        /// Path to the counts table.
        #[arg(value_name = "COUNTS")]
        counts: PathBuf,

        /// Total mapped reads for the sample.
        #[arg(long, value_name = "N")]
        total: u64,

        /// Sample name used in diagnostics.
        #[arg(long, value_name = "ID", default_value = "sample")]
        sample: String,
    },

    /// List the built-in stage catalog.
    Stages,
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
