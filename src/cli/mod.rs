//! CLI command definitions for schedule-dashboard
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod export;
pub mod watch;

use clap::{Parser, Subcommand, ValueEnum};
use export::ExportArgs;
use std::path::PathBuf;
use watch::WatchArgs;

use crate::schedule::years::YearFilter;

/// Schedule dashboard server and CLI tools
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the task store JSON file (overrides config)
    #[arg(short, long, global = true)]
    pub tasks: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the dashboard server (default if no subcommand given)
    Serve(ServeArgs),

    /// Write the hierarchical CSV export of the task store
    Export(ExportArgs),

    /// Print schedule statistics
    Stats(StatsArgs),

    /// Follow a running dashboard, refreshing periodically
    Watch(WatchArgs),
}

/// Arguments for the serve subcommand
#[derive(clap::Args, Debug, Default)]
pub struct ServeArgs {
    /// Port to listen on (overrides config and PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Address to bind (overrides config)
    #[arg(long)]
    pub bind: Option<String>,

    /// Do not reload the task store when the file changes
    #[arg(long)]
    pub no_watch: bool,
}

/// Output format for the stats subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StatsFormat {
    #[default]
    Text,
    Json,
}

/// Arguments for the stats subcommand
#[derive(clap::Args, Debug)]
pub struct StatsArgs {
    /// Year to show (that year and the next), or "all"
    #[arg(long, default_value = "all")]
    pub year: YearFilter,

    /// Output format
    #[arg(long, value_enum, default_value_t = StatsFormat::Text)]
    pub format: StatsFormat,
}
