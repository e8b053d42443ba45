//! Export subcommand
//!
//! Writes the hierarchical CSV export of the task store to a file or stdout.

use chrono::NaiveDate;
use clap::Args;
use std::path::PathBuf;

use crate::export::export_filename;
use crate::schedule::years::YearFilter;

/// Arguments for the export subcommand
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output file path; "-" for stdout (default: <slug>_<date>.csv)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Year to export (that year and the next), or "all"
    #[arg(long, default_value = "all")]
    pub year: YearFilter,

    /// File-name stem for the default output name (overrides config)
    #[arg(long)]
    pub slug: Option<String>,
}

/// Where export output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportTarget {
    Stdout,
    File(PathBuf),
}

impl ExportArgs {
    /// Resolve the output target, naming the file after `slug` and `today`
    /// when no path was given.
    pub fn target(&self, config_slug: &str, today: NaiveDate) -> ExportTarget {
        match &self.output {
            Some(path) if path.as_os_str() == "-" => ExportTarget::Stdout,
            Some(path) => ExportTarget::File(path.clone()),
            None => {
                let slug = self.slug.as_deref().unwrap_or(config_slug);
                ExportTarget::File(PathBuf::from(export_filename(slug, today)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(output: Option<&str>, slug: Option<&str>) -> ExportArgs {
        ExportArgs {
            output: output.map(PathBuf::from),
            year: YearFilter::All,
            slug: slug.map(str::to_string),
        }
    }

    #[test]
    fn test_default_target_uses_dated_name() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        assert_eq!(
            args(None, None).target("plant", today),
            ExportTarget::File(PathBuf::from("plant_2026-01-02.csv"))
        );
        assert_eq!(
            args(None, Some("site")).target("plant", today),
            ExportTarget::File(PathBuf::from("site_2026-01-02.csv"))
        );
    }

    #[test]
    fn test_dash_means_stdout() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        assert_eq!(args(Some("-"), None).target("plant", today), ExportTarget::Stdout);
        assert_eq!(
            args(Some("out.csv"), None).target("plant", today),
            ExportTarget::File(PathBuf::from("out.csv"))
        );
    }
}
