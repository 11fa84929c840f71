//! Cache invalidation tracking
//!
//! After a successful build the tracker keeps two pointers into the layer
//! list:
//!
//! ```text
//!   layer:    0    1    2    3    4
//!                       ^              source_boundary = 2   (edited instruction)
//!                            ^         external_boundary = 3 (changed dependency)
//!   flags:    .    .    X    X    X    invalid iff i >= min(source, external)
//! ```
//!
//! Both pointers start at the layer count (nothing invalid) and move
//! independently: the source pointer follows edits to the build description,
//! the external pointer follows the change ledger. Flags are always repainted
//! from the merged minimum, so clearing one dimension never clears a layer the
//! other one still covers.
//!
//! Events arriving while the tracker is disarmed (no build yet, a build in
//! flight, or the last build failed) are dropped.

pub mod ledger;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::deps::DependencySnapshot;
use crate::fs_utils::read_lossy;
use crate::instruction::{first_divergence, segment, InstructionGroup};
use crate::layer::Layer;

pub use ledger::{ChangeKind, ChangeLedger};

/// The two invalidation pointers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InvalidationBoundary {
    /// First layer whose instruction text differs from the build
    pub source_boundary: usize,
    /// First layer with a changed dependency
    pub external_boundary: usize,
}

impl InvalidationBoundary {
    fn reset(layer_count: usize) -> Self {
        Self {
            source_boundary: layer_count,
            external_boundary: layer_count,
        }
    }

    /// First invalid layer across both dimensions
    pub fn first_invalid(&self) -> usize {
        self.source_boundary.min(self.external_boundary)
    }
}

/// Tracks which layers would miss the build cache on rebuild
#[derive(Debug, Clone)]
pub struct CacheInvalidationTracker {
    original_groups: Vec<InstructionGroup>,
    dependency_sets: Vec<HashSet<PathBuf>>,
    snapshot: DependencySnapshot,
    ledger: ChangeLedger,
    boundary: InvalidationBoundary,
    flags: Vec<bool>,
    armed: bool,
}

impl Default for CacheInvalidationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheInvalidationTracker {
    /// A disarmed tracker with no layers
    pub fn new() -> Self {
        Self {
            original_groups: Vec::new(),
            dependency_sets: Vec::new(),
            snapshot: DependencySnapshot::new(),
            ledger: ChangeLedger::new(),
            boundary: InvalidationBoundary::reset(0),
            flags: Vec::new(),
            armed: false,
        }
    }

    /// Start tracking against a freshly built layer list
    ///
    /// Clears the ledger, resets both pointers to the layer count and arms
    /// the tracker.
    pub fn reset(&mut self, layers: &[Layer], groups: Vec<InstructionGroup>, snapshot: DependencySnapshot) {
        self.dependency_sets = layers
            .iter()
            .map(|layer| {
                layer
                    .dependencies
                    .iter()
                    .filter_map(|d| d.as_path().map(Path::to_path_buf))
                    .collect()
            })
            .collect();
        self.original_groups = groups;
        self.snapshot = snapshot;
        self.ledger.clear();
        self.boundary = InvalidationBoundary::reset(layers.len());
        self.flags = vec![false; layers.len()];
        self.armed = true;

        tracing::debug!("Tracker armed for {} layers", layers.len());
    }

    /// Stop reacting to events until the next `reset`
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn layer_count(&self) -> usize {
        self.flags.len()
    }

    pub fn boundary(&self) -> InvalidationBoundary {
        self.boundary
    }

    /// Per-layer invalid flags, index = layer
    pub fn flags(&self) -> &[bool] {
        &self.flags
    }

    pub fn is_invalid(&self, index: usize) -> bool {
        self.flags.get(index).copied().unwrap_or(false)
    }

    pub fn ledger(&self) -> &ChangeLedger {
        &self.ledger
    }

    pub fn snapshot(&self) -> &DependencySnapshot {
        &self.snapshot
    }

    // ========================================================================
    // Source edits
    // ========================================================================

    /// Re-segment the live build description and move the source pointer
    ///
    /// Returns the layers whose flag changed.
    pub fn on_source_edit(&mut self, text: &str) -> Vec<usize> {
        if !self.armed {
            tracing::debug!("Ignoring source edit: tracker disarmed");
            return Vec::new();
        }

        let current = segment(text);
        let layer_count = self.layer_count();
        self.boundary.source_boundary = first_divergence(&self.original_groups, &current)
            .map_or(layer_count, |i| i.min(layer_count));
        self.repaint()
    }

    // ========================================================================
    // External changes
    // ========================================================================

    /// A tracked file's content changed (editor buffer or disk write)
    pub fn on_content_change(&mut self, path: &Path, content: &str) -> Vec<usize> {
        if !self.armed {
            tracing::debug!("Ignoring content change of {}: tracker disarmed", path.display());
            return Vec::new();
        }
        self.compare_content(path, content);
        self.recompute_external()
    }

    /// A tracked file was written on disk; re-read and compare it
    pub fn on_written(&mut self, path: &Path) -> Vec<usize> {
        if !self.armed || self.snapshot.content(path).is_none() {
            return Vec::new();
        }
        match read_lossy(path) {
            Ok(content) => self.on_content_change(path, &content),
            Err(e) => {
                tracing::debug!("Could not re-read {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    /// A path appeared on disk
    pub fn on_created(&mut self, path: &Path) -> Vec<usize> {
        if !self.armed {
            tracing::debug!("Ignoring creation of {}: tracker disarmed", path.display());
            return Vec::new();
        }

        if self.snapshot.contains(path) {
            // Restored: reconcile it and everything now under it with the build
            for (entry, is_file) in on_disk_tree(path) {
                if is_file {
                    match read_lossy(&entry) {
                        Ok(content) => self.compare_content(&entry, &content),
                        Err(e) => tracing::debug!("Could not read {}: {}", entry.display(), e),
                    }
                } else {
                    self.ledger.remove(&entry);
                }
            }
        } else {
            for (entry, _) in on_disk_tree(path) {
                self.ledger.record(entry, ChangeKind::Added);
            }
        }
        self.recompute_external()
    }

    /// A path disappeared from disk
    pub fn on_deleted(&mut self, path: &Path) -> Vec<usize> {
        if !self.armed {
            tracing::debug!("Ignoring deletion of {}: tracker disarmed", path.display());
            return Vec::new();
        }

        if self.snapshot.contains(path) {
            let known: Vec<PathBuf> = self.snapshot.paths_under(path).cloned().collect();
            for entry in known {
                self.ledger.record(entry, ChangeKind::Deleted);
            }
        } else {
            self.ledger.remove_under(path);
        }
        self.recompute_external()
    }

    /// Compare live content with the build-time snapshot and update the ledger
    fn compare_content(&mut self, path: &Path, content: &str) {
        match self.snapshot.content(path) {
            None => {}
            Some(original) if original == content => {
                self.ledger.remove(path);
            }
            Some(_) => self.ledger.record(path, ChangeKind::Modified),
        }
    }

    /// Move the external pointer to the lowest layer owning a changed path
    pub fn recompute_external(&mut self) -> Vec<usize> {
        let layer_count = self.layer_count();
        self.boundary.external_boundary = self
            .ledger
            .lookup_paths()
            .filter_map(|lookup| self.dependency_sets.iter().position(|deps| deps.contains(lookup)))
            .min()
            .unwrap_or(layer_count);
        self.repaint()
    }

    /// Recompute every flag from the merged pointer; returns changed indices
    fn repaint(&mut self) -> Vec<usize> {
        let first_invalid = self.boundary.first_invalid();
        let mut changed = Vec::new();
        for (i, flag) in self.flags.iter_mut().enumerate() {
            let invalid = i >= first_invalid;
            if *flag != invalid {
                *flag = invalid;
                changed.push(i);
            }
        }
        if !changed.is_empty() {
            tracing::debug!(
                "Invalidation moved: source={}, external={}, {} flags changed",
                self.boundary.source_boundary,
                self.boundary.external_boundary,
                changed.len()
            );
        }
        changed
    }
}

/// `root` and every descendant present on disk, with an is-file marker
///
/// Missing roots yield nothing. Unreadable directories are logged and skipped.
fn on_disk_tree(root: &Path) -> Vec<(PathBuf, bool)> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    let mut visited = HashSet::new();

    while let Some(path) = stack.pop() {
        let Ok(metadata) = fs::metadata(&path) else {
            tracing::debug!("{} is not on disk", path.display());
            continue;
        };
        if metadata.is_file() {
            out.push((path, true));
            continue;
        }
        if !metadata.is_dir() {
            continue;
        }

        let first_visit = path
            .canonicalize()
            .map(|c| visited.insert(c))
            .unwrap_or(false);
        out.push((path.clone(), false));
        if !first_visit {
            continue;
        }

        match fs::read_dir(&path) {
            Ok(entries) => {
                let mut children: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
                children.sort_by(|a, b| b.cmp(a));
                stack.extend(children);
            }
            Err(e) => tracing::error!("Could not list {}: {}", path.display(), e),
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
