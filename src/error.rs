//! Error types for schedule loading, model construction and API responses.

use serde::Serialize;
use std::fmt;

use crate::types::TaskId;

/// Errors raised while ingesting a task store or querying the schedule model.
///
/// Structural variants (`Cycle`, `DanglingParent`, `DuplicateId` and the
/// per-record validation failures) are fatal to model construction.
/// `NotFound` only fails the lookup that produced it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScheduleError {
    #[error("parent chain of task {task} does not terminate (cycle)")]
    Cycle { task: TaskId },

    #[error("task {task} references missing parent {parent}")]
    DanglingParent { task: TaskId, parent: TaskId },

    #[error("task id {0} appears more than once")]
    DuplicateId(TaskId),

    #[error("task {task} has progress {progress} outside [0, 1]")]
    InvalidProgress { task: TaskId, progress: f64 },

    #[error("task {task} has negative duration {duration}")]
    NegativeDuration { task: TaskId, duration: i64 },

    #[error("task {task} has unparsable start date {value:?}")]
    InvalidDate { task: TaskId, value: String },

    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("failed to load tasks: {0}")]
    LoadFailure(String),
}

impl ScheduleError {
    pub fn load_failure(err: impl fmt::Display) -> Self {
        ScheduleError::LoadFailure(err.to_string())
    }

    /// Machine-readable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ScheduleError::Cycle { .. } => ErrorCode::ParentCycle,
            ScheduleError::DanglingParent { .. } => ErrorCode::DanglingParent,
            ScheduleError::DuplicateId(_) => ErrorCode::DuplicateId,
            ScheduleError::InvalidProgress { .. }
            | ScheduleError::NegativeDuration { .. }
            | ScheduleError::InvalidDate { .. } => ErrorCode::InvalidFieldValue,
            ScheduleError::NotFound(_) => ErrorCode::TaskNotFound,
            ScheduleError::LoadFailure(_) => ErrorCode::LoadFailure,
        }
    }
}

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    InvalidFieldValue,
    DuplicateId,
    DanglingParent,
    ParentCycle,

    // Not found errors
    TaskNotFound,

    // Store errors
    LoadFailure,
}

/// Structured error body returned by the JSON endpoints.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            task_id: None,
        }
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }
}

impl From<&ScheduleError> for ApiError {
    fn from(err: &ScheduleError) -> Self {
        let api = ApiError::new(err.code(), err.to_string());
        match err {
            ScheduleError::Cycle { task }
            | ScheduleError::DanglingParent { task, .. }
            | ScheduleError::InvalidProgress { task, .. }
            | ScheduleError::NegativeDuration { task, .. }
            | ScheduleError::InvalidDate { task, .. } => api.with_task(task.as_str()),
            ScheduleError::DuplicateId(id) | ScheduleError::NotFound(id) => {
                api.with_task(id.as_str())
            }
            ScheduleError::LoadFailure(_) => api,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for schedule operations.
pub type ScheduleResult<T> = std::result::Result<T, ScheduleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serialization() {
        let err = ScheduleError::Cycle {
            task: TaskId::from("7"),
        };
        let api = ApiError::from(&err);
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["code"], "PARENT_CYCLE");
        assert_eq!(json["task_id"], "7");
    }

    #[test]
    fn test_load_failure_has_no_task() {
        let api = ApiError::from(&ScheduleError::load_failure("boom"));
        assert_eq!(api.code, ErrorCode::LoadFailure);
        assert!(api.task_id.is_none());
    }
}
