//! Hierarchical export of a schedule.
//!
//! Rows are produced in pre-order (parent before children, siblings in
//! insertion order). A fault in one row never aborts the export: the field
//! is left empty, the fault is logged and recorded in [`ExportReport::errors`].

pub mod csv;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use crate::error::ScheduleResult;
use crate::schedule::ScheduleModel;
use crate::types::{DATE_FORMAT, Task, TaskId};

pub use csv::{CSV_HEADER, UTF8_BOM, to_csv};

/// Indentation prepended to the task name once per hierarchy level.
pub const INDENT_UNIT: &str = "    ";

/// Default file-name stem for exported schedules.
pub const DEFAULT_EXPORT_SLUG: &str = "westmere_factory_development";

/// One exported row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub level: usize,
    pub id: TaskId,
    /// Task text with `level` indent units prepended.
    pub name: String,
    pub start_date: String,
    pub end_date: String,
    pub duration: u32,
    pub progress_percent: i64,
    pub priority: String,
    pub status: String,
    pub parent_name: String,
    pub notes: String,
}

/// A fault isolated to one row.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExportRowError {
    #[error("task {task}: parent {parent} could not be resolved")]
    UnresolvedParent { task: TaskId, parent: TaskId },

    #[error("task {task}: end date overflows the calendar")]
    EndDateOverflow { task: TaskId },
}

/// Rows plus any per-row faults encountered while producing them.
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    pub rows: Vec<ExportRow>,
    pub errors: Vec<ExportRowError>,
}

impl ExportReport {
    pub fn to_csv(&self) -> String {
        to_csv(&self.rows)
    }
}

/// Walk the model in pre-order and build one row per task.
pub fn export_rows(model: &ScheduleModel) -> ExportReport {
    let mut report = ExportReport {
        rows: Vec::with_capacity(model.len()),
        errors: Vec::new(),
    };

    for (level, task) in model.preorder() {
        let parent = model.parent_of(&task.id);
        let row = build_row(level, task, parent, &mut report.errors);
        report.rows.push(row);
    }

    report
}

/// Build the row for `task`. `parent` is the lookup result for its parent;
/// a failed lookup or an end date past the calendar leaves that field empty
/// and records the fault in `errors`.
fn build_row(
    level: usize,
    task: &Task,
    parent: ScheduleResult<Option<&Task>>,
    errors: &mut Vec<ExportRowError>,
) -> ExportRow {
    let parent_name = match parent {
        Ok(Some(p)) => p.text.clone(),
        Ok(None) => String::new(),
        Err(_) => {
            let err = ExportRowError::UnresolvedParent {
                task: task.id.clone(),
                parent: task.parent.clone().unwrap_or_else(|| task.id.clone()),
            };
            warn!(task_id = %task.id, error = %err, "Export row degraded");
            errors.push(err);
            String::new()
        }
    };

    let end_date = match task.end_date() {
        Some(d) => format_date(d),
        None => {
            let err = ExportRowError::EndDateOverflow {
                task: task.id.clone(),
            };
            warn!(task_id = %task.id, error = %err, "Export row degraded");
            errors.push(err);
            String::new()
        }
    };

    ExportRow {
        level,
        id: task.id.clone(),
        name: format!("{}{}", INDENT_UNIT.repeat(level), task.text),
        start_date: format_date(task.start_date),
        end_date,
        duration: task.duration,
        progress_percent: task.progress_percent(),
        priority: task.priority.as_str().to_string(),
        status: task.status().as_str().to_string(),
        parent_name,
        notes: task.notes.clone().unwrap_or_default(),
    }
}

/// File name for an export taken on `date`: `<slug>_<YYYY-MM-DD>.csv`.
pub fn export_filename(slug: &str, date: NaiveDate) -> String {
    format!("{}_{}.csv", slug, format_date(date))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
