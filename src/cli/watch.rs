//! Watch subcommand
//!
//! Runs a dashboard session against a remote server: fetches the schedule,
//! falls back to placeholder data on failure, and refreshes on an interval.

use clap::Args;

use crate::schedule::years::YearFilter;

/// Arguments for the watch subcommand
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Base URL of the dashboard server
    #[arg(long, default_value = "http://localhost:3000")]
    pub url: String,

    /// Year to follow (that year and the next), or "all"
    #[arg(long, default_value = "all")]
    pub year: YearFilter,

    /// Refresh interval in seconds (overrides config)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// Load once, print statistics and exit
    #[arg(long)]
    pub once: bool,
}
