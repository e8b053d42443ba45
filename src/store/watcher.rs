//! File watcher for the task store.
//!
//! Watches the directory holding the store file (editors often replace the
//! file rather than write it in place) and reloads the [`SharedStore`] when
//! the file changes. Uses debouncing to coalesce rapid file changes.

use notify_debouncer_mini::{DebouncedEventKind, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::SharedStore;

/// Event types emitted when the store file changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChangeEvent {
    /// The store file was written, replaced or removed.
    Modified(PathBuf),
    /// Watcher encountered an error.
    Error(String),
}

impl StoreChangeEvent {
    /// Returns true if this event requires a store reload.
    pub fn requires_reload(&self) -> bool {
        matches!(self, StoreChangeEvent::Modified(_))
    }
}

/// Handle to the running store watcher. Dropping it stops reloading.
pub struct StoreWatcherHandle {
    _watch_task: tokio::task::JoinHandle<()>,
    _reload_task: tokio::task::JoinHandle<()>,
}

impl Drop for StoreWatcherHandle {
    fn drop(&mut self) {
        self._reload_task.abort();
    }
}

/// Start watching the store file and reload `store` on every change.
pub fn start_store_watcher(
    store: Arc<SharedStore>,
    debounce: Duration,
) -> Result<StoreWatcherHandle, notify::Error> {
    let (event_tx, event_rx) = watch::channel(None);
    let (notify_tx, notify_rx) = mpsc::channel();

    let target = store.path().to_path_buf();
    let dir = watch_dir(&target);

    let mut debouncer = new_debouncer(debounce, notify_tx)?;
    debouncer
        .watcher()
        .watch(&dir, notify::RecursiveMode::NonRecursive)?;
    info!("Watching task store: {}", target.display());

    let watch_target = target.clone();
    let watch_task = tokio::task::spawn_blocking(move || {
        // Keep the debouncer alive
        let _debouncer = debouncer;
        process_notify_events(notify_rx, event_tx, &watch_target);
    });

    let mut reload_rx = event_rx;
    let reload_task = tokio::spawn(async move {
        while reload_rx.changed().await.is_ok() {
            let event = reload_rx.borrow_and_update().clone();
            match event {
                Some(event) if event.requires_reload() => {
                    reload_off_runtime(Arc::clone(&store)).await;
                }
                Some(StoreChangeEvent::Error(e)) => {
                    warn!("Task store watcher error: {}", e);
                }
                _ => {}
            }
        }
    });

    Ok(StoreWatcherHandle {
        _watch_task: watch_task,
        _reload_task: reload_task,
    })
}

/// Re-read the store on the blocking pool; the read is synchronous file I/O.
async fn reload_off_runtime(store: Arc<SharedStore>) {
    if let Err(e) = tokio::task::spawn_blocking(move || store.reload()).await {
        error!("Task store reload failed: {}", e);
    }
}

/// Directory to watch for `target`.
fn watch_dir(target: &Path) -> PathBuf {
    match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Process events from the notify debouncer and convert to StoreChangeEvents.
fn process_notify_events(
    rx: mpsc::Receiver<Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>>,
    tx: watch::Sender<Option<StoreChangeEvent>>,
    target: &Path,
) {
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                if let Some(event) = classify_events(events, target) {
                    debug!("Task store change detected: {:?}", event);
                    if tx.send(Some(event)).is_err() {
                        info!("Store watcher receiver dropped, stopping");
                        return;
                    }
                }
            }
            Ok(Err(e)) => {
                error!("File watcher error: {}", e);
                let _ = tx.send(Some(StoreChangeEvent::Error(e.to_string())));
            }
            Err(_) => {
                info!("Store watcher channel closed, stopping");
                return;
            }
        }
    }
}

/// Collapse a debounced batch into at most one event for the store file.
fn classify_events(
    events: Vec<notify_debouncer_mini::DebouncedEvent>,
    target: &Path,
) -> Option<StoreChangeEvent> {
    events
        .into_iter()
        .filter(|e| {
            matches!(
                e.kind,
                DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
            )
        })
        .find(|e| is_store_file(&e.path, target))
        .map(|e| StoreChangeEvent::Modified(e.path))
}

/// Event paths are absolute; the configured path may be relative.
fn is_store_file(path: &Path, target: &Path) -> bool {
    if path == target {
        return true;
    }
    match (path.file_name(), target.file_name()) {
        (Some(a), Some(b)) if a == b => {
            let target_dir = watch_dir(target);
            let canonical = std::fs::canonicalize(&target_dir).unwrap_or(target_dir);
            path.parent().is_some_and(|p| p == canonical || p.ends_with(&canonical))
        }
        _ => false,
    }
}
