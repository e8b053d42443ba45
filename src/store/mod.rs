//! Task store backed by a JSON file.
//!
//! The store keeps the file body verbatim for `/api/tasks` alongside the
//! parsed `{ tasks, links }` document. Snapshots are swapped atomically on
//! reload, so a reader always sees one complete version of the file.

pub mod watcher;

use arc_swap::ArcSwap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ScheduleError, ScheduleResult};
use crate::schedule::ScheduleModel;
use crate::schedule::years::YearFilter;
use crate::types::{TaskFile, ValidationPolicy};

/// Parse a task store document.
pub fn parse_task_file(text: &str) -> ScheduleResult<TaskFile> {
    serde_json::from_str(text).map_err(ScheduleError::load_failure)
}

/// Build the model for `filter` from a parsed document. Every record is
/// validated and the whole hierarchy checked before the filter applies, so a
/// malformed store fails the same way under any filter.
pub fn build_model(
    file: &TaskFile,
    filter: YearFilter,
    policy: ValidationPolicy,
) -> ScheduleResult<ScheduleModel> {
    let full = ScheduleModel::build(&file.tasks, file.links.clone(), policy)?;
    filter.apply(&full)
}

/// One loaded version of the store file.
#[derive(Debug)]
pub struct StoreSnapshot {
    body: Result<String, ScheduleError>,
    file: Result<TaskFile, ScheduleError>,
}

impl StoreSnapshot {
    /// Read and parse `path`. Never fails; errors are kept in the snapshot.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_text(text),
            Err(e) => {
                let err = ScheduleError::load_failure(format!("{}: {}", path.display(), e));
                Self::failed(err)
            }
        }
    }

    pub fn from_text(text: String) -> Self {
        if let Err(e) = serde_json::from_str::<serde_json::Value>(&text) {
            return Self::failed(ScheduleError::load_failure(e));
        }
        let file = parse_task_file(&text);
        Self {
            body: Ok(text),
            file,
        }
    }

    fn failed(err: ScheduleError) -> Self {
        Self {
            body: Err(err.clone()),
            file: Err(err),
        }
    }

    /// The file body, verbatim. Fails if the file is unreadable or not JSON.
    pub fn body(&self) -> Result<&str, &ScheduleError> {
        self.body.as_deref()
    }

    /// The parsed document.
    pub fn task_file(&self) -> Result<&TaskFile, &ScheduleError> {
        self.file.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.file.is_ok()
    }
}

/// Shared, hot-swappable task store.
pub struct SharedStore {
    path: PathBuf,
    current: ArcSwap<StoreSnapshot>,
}

impl SharedStore {
    /// Load `path` now. An unreadable file still yields a store whose
    /// snapshot reports the failure.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let snapshot = StoreSnapshot::load(&path);
        log_snapshot(&path, &snapshot);
        Self {
            path,
            current: ArcSwap::from_pointee(snapshot),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        self.current.load_full()
    }

    /// Re-read the file and swap in the new snapshot.
    pub fn reload(&self) -> Arc<StoreSnapshot> {
        let snapshot = Arc::new(StoreSnapshot::load(&self.path));
        log_snapshot(&self.path, &snapshot);
        self.current.store(Arc::clone(&snapshot));
        snapshot
    }
}

fn log_snapshot(path: &Path, snapshot: &StoreSnapshot) {
    match snapshot.task_file() {
        Ok(file) => info!(
            path = %path.display(),
            tasks = file.tasks.len(),
            links = file.links.len(),
            "Task store loaded"
        ),
        Err(e) => warn!(path = %path.display(), error = %e, "Task store unavailable"),
    }
}
