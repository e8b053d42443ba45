//! Year buckets and the year filter.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::ScheduleModel;
use crate::error::ScheduleResult;
use crate::types::{Task, TaskId};

/// Display bucket tag, e.g. `year1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bucket(String);

impl Bucket {
    pub fn new(name: impl Into<String>) -> Self {
        Bucket(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lookup table from absolute calendar year to bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct YearBuckets(BTreeMap<i32, Bucket>);

impl Default for YearBuckets {
    fn default() -> Self {
        Self(BTreeMap::from([
            (2025, Bucket::new("year1")),
            (2026, Bucket::new("year1")),
            (2027, Bucket::new("year2")),
            (2028, Bucket::new("year3")),
            (2029, Bucket::new("year4")),
        ]))
    }
}

impl YearBuckets {
    pub fn new(table: BTreeMap<i32, Bucket>) -> Self {
        Self(table)
    }

    /// Bucket for the calendar year of `start_date`, if that year is mapped.
    pub fn bucket_for(&self, start_date: NaiveDate) -> Option<&Bucket> {
        self.0.get(&start_date.year())
    }

    /// Annotate every task of the model that falls in a mapped year.
    pub fn classify(&self, model: &ScheduleModel) -> BTreeMap<TaskId, Bucket> {
        model
            .each_task()
            .filter_map(|t| {
                self.bucket_for(t.start_date)
                    .map(|b| (t.id.clone(), b.clone()))
            })
            .collect()
    }
}

/// Year selection for the filtered view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YearFilter {
    #[default]
    All,
    /// Tasks starting in this year or the following one.
    Year(i32),
}

impl YearFilter {
    pub fn matches(&self, start_date: NaiveDate) -> bool {
        match self {
            YearFilter::All => true,
            YearFilter::Year(y) => {
                let year = start_date.year();
                year == *y || year == y + 1
            }
        }
    }

    /// Derive the view of `model` this filter selects. Tasks whose parent
    /// falls outside the window become roots. `model` has already passed
    /// hierarchy validation, so the subset always builds.
    pub fn apply(&self, model: &ScheduleModel) -> ScheduleResult<ScheduleModel> {
        if *self == YearFilter::All {
            return Ok(model.clone());
        }
        let mut kept: Vec<Task> = model
            .each_task()
            .filter(|t| self.matches(t.start_date))
            .cloned()
            .collect();
        let ids: HashSet<TaskId> = kept.iter().map(|t| t.id.clone()).collect();
        let mut rerooted = 0;
        for task in &mut kept {
            if let Some(pid) = &task.parent
                && !ids.contains(pid)
            {
                task.parent = None;
                rerooted += 1;
            }
        }
        debug!(
            filter = %self,
            kept = kept.len(),
            rerooted,
            "Applied year filter"
        );
        ScheduleModel::from_tasks(kept, model.links().to_vec())
    }
}

impl FromStr for YearFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(YearFilter::All);
        }
        s.parse::<i32>()
            .map(YearFilter::Year)
            .map_err(|_| format!("invalid year filter: {s:?} (expected a year or \"all\")"))
    }
}

impl fmt::Display for YearFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearFilter::All => f.write_str("all"),
            YearFilter::Year(y) => write!(f, "{y}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TaskRecord, ValidationPolicy};
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_table() {
        let buckets = YearBuckets::default();
        assert_eq!(buckets.bucket_for(date(2025, 6, 1)).unwrap().as_str(), "year1");
        assert_eq!(buckets.bucket_for(date(2026, 1, 1)).unwrap().as_str(), "year1");
        assert_eq!(buckets.bucket_for(date(2027, 1, 1)).unwrap().as_str(), "year2");
        assert_eq!(buckets.bucket_for(date(2029, 12, 31)).unwrap().as_str(), "year4");
        assert!(buckets.bucket_for(date(2024, 12, 31)).is_none());
        assert!(buckets.bucket_for(date(2030, 1, 1)).is_none());
    }

    #[test]
    fn test_bucket_for_is_pure() {
        let buckets = YearBuckets::default();
        let d = date(2028, 3, 3);
        assert_eq!(buckets.bucket_for(d), buckets.bucket_for(d));
    }

    #[test]
    fn test_year_filter_lookahead() {
        let f = YearFilter::Year(2025);
        assert!(f.matches(date(2025, 1, 1)));
        assert!(f.matches(date(2026, 6, 1)));
        assert!(!f.matches(date(2027, 1, 1)));
        assert!(!f.matches(date(2024, 12, 31)));
        assert!(YearFilter::All.matches(date(1999, 1, 1)));
    }

    #[test]
    fn test_parse_filter() {
        assert_eq!("all".parse::<YearFilter>().unwrap(), YearFilter::All);
        assert_eq!("2026".parse::<YearFilter>().unwrap(), YearFilter::Year(2026));
        assert!("next".parse::<YearFilter>().is_err());
    }

    fn model(value: serde_json::Value) -> ScheduleModel {
        let records: Vec<TaskRecord> = serde_json::from_value(value).unwrap();
        ScheduleModel::build(&records, Vec::new(), ValidationPolicy::default()).unwrap()
    }

    #[test]
    fn test_filter_reroots_orphans() {
        let full = model(json!([
            {"id": 1, "start_date": "2024-11-01", "type": "phase"},
            {"id": 2, "start_date": "2025-01-01", "parent": 1},
            {"id": 3, "start_date": "2025-02-01", "parent": 2},
            {"id": 4, "start_date": "2028-02-01", "parent": 1}
        ]));
        let view = YearFilter::Year(2025).apply(&full).unwrap();
        let ids: Vec<&str> = view.each_task().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
        assert_eq!(view.level(&TaskId::from("2")).unwrap(), 0);
        assert_eq!(view.level(&TaskId::from("3")).unwrap(), 1);
    }

    #[test]
    fn test_all_keeps_whole_model() {
        let full = model(json!([
            {"id": 1, "start_date": "2020-01-01"},
            {"id": 2, "start_date": "2031-01-01", "parent": 1}
        ]));
        let view = YearFilter::All.apply(&full).unwrap();
        assert_eq!(view.len(), 2);
    }
}
