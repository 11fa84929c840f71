//! Build context watcher
//!
//! Uses the `notify` crate to watch the build context recursively and turns
//! raw filesystem events into session path events.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   notify    │────>│  translate  │────>│   Session   │
//! │   watcher   │     │  + filter   │     │   channel   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! Events are not debounced: a create and a delete of the same path must
//! reach the tracker as two distinct events, in order.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};

use crate::config::WatchConfig;
use crate::error::{LayerprofError, Result};
use crate::fs_utils::normalize_path;
use crate::session::SessionEvent;

/// A filesystem change relevant to the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathChange {
    Created(PathBuf),
    Deleted(PathBuf),
    Written(PathBuf),
}

impl PathChange {
    pub fn path(&self) -> &Path {
        match self {
            PathChange::Created(p) | PathChange::Deleted(p) | PathChange::Written(p) => p,
        }
    }
}

impl From<PathChange> for SessionEvent {
    fn from(change: PathChange) -> Self {
        match change {
            PathChange::Created(p) => SessionEvent::PathCreated(p),
            PathChange::Deleted(p) => SessionEvent::PathDeleted(p),
            PathChange::Written(p) => SessionEvent::PathWritten(p),
        }
    }
}

/// Map one notify event to path changes
///
/// Renames become a deletion of the old path and a creation of the new one.
pub fn translate(event: &Event) -> Vec<PathChange> {
    let paths = event.paths.iter().map(|p| normalize_path(p));
    match event.kind {
        EventKind::Create(_) => paths.map(PathChange::Created).collect(),
        EventKind::Remove(_) => paths.map(PathChange::Deleted).collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => paths.map(PathChange::Deleted).collect(),
            RenameMode::To => paths.map(PathChange::Created).collect(),
            RenameMode::Both => {
                let mut paths = paths;
                let mut changes = Vec::with_capacity(2);
                if let Some(from) = paths.next() {
                    changes.push(PathChange::Deleted(from));
                }
                if let Some(to) = paths.next() {
                    changes.push(PathChange::Created(to));
                }
                changes
            }
            // Side unknown: look at the disk
            RenameMode::Any | RenameMode::Other => paths
                .map(|p| {
                    if p.exists() {
                        PathChange::Created(p)
                    } else {
                        PathChange::Deleted(p)
                    }
                })
                .collect(),
        },
        EventKind::Modify(ModifyKind::Metadata(_)) | EventKind::Access(_) => Vec::new(),
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => {
            paths.map(PathChange::Written).collect()
        }
    }
}

/// Whether a path under `root` should reach the tracker
///
/// With `ignore_hidden`, anything below a hidden component (`.git`, `.idea`)
/// is dropped. Components above the root are not considered.
pub fn should_watch_path(path: &Path, root: &Path, ignore_hidden: bool) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    if !ignore_hidden {
        return true;
    }
    !relative.components().any(|component| match component {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// Watches a build context and forwards changes to a session
pub struct BuildContextWatcher {
    root: PathBuf,
    config: WatchConfig,
    running: Arc<AtomicBool>,
}

impl BuildContextWatcher {
    pub fn new(root: PathBuf, config: WatchConfig) -> Self {
        Self {
            root: normalize_path(&root),
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start watching; events are sent to `session` until the handle is dropped
    pub fn start(&self, session: Sender<SessionEvent>) -> Result<WatcherHandle> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(WatcherHandle {
                running: Arc::clone(&self.running),
            });
        }

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(tx).map_err(|e| {
            self.running.store(false, Ordering::SeqCst);
            LayerprofError::Watch {
                message: format!("Failed to create watcher: {}", e),
            }
        })?;
        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                LayerprofError::Watch {
                    message: format!("Failed to watch {}: {}", self.root.display(), e),
                }
            })?;
        tracing::info!("Watching build context {}", self.root.display());

        let root = self.root.clone();
        let ignore_hidden = self.config.ignore_hidden;
        let running = Arc::clone(&self.running);
        let handle_running = Arc::clone(&running);

        std::thread::spawn(move || {
            while handle_running.load(Ordering::SeqCst) {
                match rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(Ok(event)) => {
                        for change in translate(&event) {
                            if !should_watch_path(change.path(), &root, ignore_hidden) {
                                tracing::trace!("Filtered out: {}", change.path().display());
                                continue;
                            }
                            tracing::debug!("Context change: {:?}", change);
                            if session.send(change.into()).is_err() {
                                // Session gone
                                handle_running.store(false, Ordering::SeqCst);
                                break;
                            }
                        }
                    }
                    Ok(Err(e)) => tracing::error!("Watcher error: {}", e),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            // Keep the watcher alive until the thread exits
            drop(watcher);
            tracing::debug!("Watcher stopped");
        });

        Ok(WatcherHandle { running })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Handle for controlling a running watcher
pub struct WatcherHandle {
    running: Arc<AtomicBool>,
}

impl WatcherHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Tests
// ============================================================================
