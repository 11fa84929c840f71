//! Pending external path changes
//!
//! Keyed by path: one path has at most one operation, so a later event for
//! the same path replaces the earlier one instead of piling up.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Operation recorded for a changed path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    /// Path whose owning layer is invalidated by this change
    ///
    /// A modified file invalidates the layer that copied it. An added or
    /// deleted entry changes its parent directory's listing, so the layer that
    /// copied the parent is invalidated.
    pub fn lookup_path<'a>(&self, path: &'a Path) -> &'a Path {
        match self {
            Self::Modified => path,
            Self::Added | Self::Deleted => path.parent().unwrap_or(path),
        }
    }
}

/// Path to operation map of unreconciled changes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeLedger {
    entries: BTreeMap<PathBuf, ChangeKind>,
}

impl ChangeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an operation for a path, replacing any previous one
    pub fn record(&mut self, path: impl Into<PathBuf>, kind: ChangeKind) {
        self.entries.insert(path.into(), kind);
    }

    /// Drop the entry for exactly this path
    pub fn remove(&mut self, path: &Path) -> Option<ChangeKind> {
        self.entries.remove(path)
    }

    /// Drop every entry equal to or under `prefix` (component-wise)
    pub fn remove_under(&mut self, prefix: &Path) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, _| !path.starts_with(prefix));
        before - self.entries.len()
    }

    pub fn get(&self, path: &Path) -> Option<ChangeKind> {
        self.entries.get(path).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, ChangeKind)> {
        self.entries.iter().map(|(p, k)| (p.as_path(), *k))
    }

    /// Lookup paths of every entry
    pub fn lookup_paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|(p, k)| k.lookup_path(p))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
