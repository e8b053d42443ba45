//! Core types for the schedule dashboard.
//!
//! `TaskRecord` is the persisted JSON shape and is trusted for nothing.
//! `Task` is the validated form produced by [`TaskRecord::validate`].

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::{ScheduleError, ScheduleResult};

/// Date format used by the task store and the CSV export.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Type tag marking a summary row.
pub const PHASE_TYPE: &str = "phase";

/// Task identifier. The store may use strings or numbers; both normalize to
/// their textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        TaskId(s)
    }
}

impl From<i64> for TaskId {
    fn from(n: i64) -> Self {
        TaskId(n.to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawId {
    Int(i64),
    Float(f64),
    Str(String),
}

impl RawId {
    fn into_task_id(self) -> TaskId {
        match self {
            RawId::Int(n) => TaskId::from(n),
            RawId::Float(f) if f.fract() == 0.0 && f.is_finite() => TaskId::from(f as i64),
            RawId::Float(f) => TaskId(f.to_string()),
            RawId::Str(s) => TaskId(s),
        }
    }

    /// Null-like parent references: `0`, `"0"` and `""` all mean "root".
    fn is_root_marker(&self) -> bool {
        match self {
            RawId::Int(n) => *n == 0,
            RawId::Float(f) => *f == 0.0,
            RawId::Str(s) => s.is_empty() || s == "0",
        }
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawId::deserialize(deserializer).map(RawId::into_task_id)
    }
}

/// Task priority tag. The set is open; unknown tags are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
    Other(String),
}

impl Priority {
    pub fn as_str(&self) -> &str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
            Priority::Other(s) => s,
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, Priority::Critical)
    }
}

impl From<String> for Priority {
    fn from(s: String) -> Self {
        match s.as_str() {
            "low" => Priority::Low,
            "normal" | "" => Priority::Normal,
            "high" => Priority::High,
            "critical" => Priority::Critical,
            _ => Priority::Other(s),
        }
    }
}

impl From<Priority> for String {
    fn from(p: Priority) -> Self {
        p.as_str().to_string()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status derived from progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Not Started")]
    NotStarted,
}

impl TaskStatus {
    pub fn from_progress(progress: f64) -> Self {
        if progress >= 1.0 {
            TaskStatus::Completed
        } else if progress > 0.0 {
            TaskStatus::InProgress
        } else {
            TaskStatus::NotStarted
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Completed => "Completed",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::NotStarted => "Not Started",
        }
    }
}

/// A task record exactly as persisted in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    #[serde(default)]
    pub text: String,
    pub start_date: String,
    #[serde(default)]
    pub duration: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<RawId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A dependency link. Opaque to the schedule core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TaskId>,
    pub source: TaskId,
    pub target: TaskId,
    #[serde(rename = "type", default)]
    pub link_type: serde_json::Value,
}

/// The `{ tasks, links }` document served by `/api/tasks`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFile {
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// Rules applied when validating records.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationPolicy {
    /// Clamp out-of-range progress into [0, 1] instead of rejecting it.
    pub clamp_progress: bool,
}

/// A validated task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    #[serde(serialize_with = "serialize_date")]
    pub start_date: NaiveDate,
    pub duration: u32,
    pub progress: f64,
    pub priority: Priority,
    pub parent: Option<TaskId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
}

fn serialize_date<S: serde::Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&date.format(DATE_FORMAT).to_string())
}

impl Task {
    pub fn is_phase(&self) -> bool {
        self.task_type.as_deref() == Some(PHASE_TYPE)
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Start date plus duration days. `None` if the calendar overflows.
    pub fn end_date(&self) -> Option<NaiveDate> {
        self.start_date
            .checked_add_days(chrono::Days::new(u64::from(self.duration)))
    }

    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_progress(self.progress)
    }

    /// Progress as a whole-number percentage.
    pub fn progress_percent(&self) -> i64 {
        (self.progress * 100.0).round() as i64
    }
}

impl TaskRecord {
    /// Start date parsed from the record, if it is well formed.
    pub fn parsed_start_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.start_date.trim(), DATE_FORMAT).ok()
    }

    /// Parent id with root markers normalized away.
    pub fn parent_id(&self) -> Option<TaskId> {
        self.parent
            .as_ref()
            .filter(|p| !p.is_root_marker())
            .cloned()
            .map(RawId::into_task_id)
    }

    /// Validate one record. Hierarchy checks happen in the schedule model.
    pub fn validate(&self, policy: ValidationPolicy) -> ScheduleResult<Task> {
        let start_date = self
            .parsed_start_date()
            .ok_or_else(|| ScheduleError::InvalidDate {
                task: self.id.clone(),
                value: self.start_date.clone(),
            })?;

        if self.duration < 0 {
            return Err(ScheduleError::NegativeDuration {
                task: self.id.clone(),
                duration: self.duration,
            });
        }
        let duration =
            u32::try_from(self.duration).map_err(|_| ScheduleError::NegativeDuration {
                task: self.id.clone(),
                duration: self.duration,
            })?;

        let raw_progress = self.progress.unwrap_or(0.0);
        let progress = if (0.0..=1.0).contains(&raw_progress) {
            raw_progress
        } else if policy.clamp_progress && raw_progress.is_finite() {
            raw_progress.clamp(0.0, 1.0)
        } else {
            return Err(ScheduleError::InvalidProgress {
                task: self.id.clone(),
                progress: raw_progress,
            });
        };

        Ok(Task {
            id: self.id.clone(),
            text: self.text.clone(),
            start_date,
            duration,
            progress,
            priority: self
                .priority
                .clone()
                .map(Priority::from)
                .unwrap_or_default(),
            parent: self.parent_id(),
            notes: self.notes.clone().filter(|n| !n.is_empty()),
            task_type: self.task_type.clone(),
        })
    }
}
