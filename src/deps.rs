//! Dependency resolution for COPY/ADD layers
//!
//! For every layer created by `COPY` or `ADD`, the source reference is
//! resolved against the build context:
//!
//! - absolute URLs are recorded verbatim
//! - missing paths are skipped
//! - files are recorded and their content is snapshotted
//! - directories are recorded and expanded to every descendant
//!
//! The snapshot (every recorded path plus file contents) is what the
//! invalidation tracker later compares live changes against.
//!
//! Directory expansion is iterative and depth bounded. Symlinks are followed;
//! a directory whose canonical path was already expanded is recorded but not
//! expanded again, so symlink cycles terminate.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::fs_utils::{normalize_path, read_lossy};
use crate::layer::{DependencyPath, Layer};

/// Default bound on directory expansion depth
pub const DEFAULT_MAX_WALK_DEPTH: usize = 64;

// ============================================================================
// Snapshot
// ============================================================================

/// Build-time view of every dependency path and file content
#[derive(Debug, Clone, Default)]
pub struct DependencySnapshot {
    structure: BTreeSet<PathBuf>,
    contents: HashMap<PathBuf, String>,
}

impl DependencySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a path as part of the build-time structure
    pub fn record_path(&mut self, path: PathBuf) {
        self.structure.insert(path);
    }

    /// Record a file and its build-time content
    pub fn record_file(&mut self, path: PathBuf, content: String) {
        self.structure.insert(path.clone());
        self.contents.insert(path, content);
    }

    /// Whether the path existed at build time
    pub fn contains(&self, path: &Path) -> bool {
        self.structure.contains(path)
    }

    /// Build-time content of a file
    pub fn content(&self, path: &Path) -> Option<&str> {
        self.contents.get(path).map(String::as_str)
    }

    /// Build-time paths equal to or under `prefix`
    pub fn paths_under<'a>(&'a self, prefix: &'a Path) -> impl Iterator<Item = &'a PathBuf> + 'a {
        self.structure
            .range(prefix.to_path_buf()..)
            .take_while(move |p| p.starts_with(prefix))
    }

    /// Every build-time path, sorted
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.structure.iter()
    }

    pub fn len(&self) -> usize {
        self.structure.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structure.is_empty()
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Expands COPY/ADD sources into dependency paths
#[derive(Debug, Clone)]
pub struct DependencyResolver {
    context: PathBuf,
    max_depth: usize,
}

impl DependencyResolver {
    /// Create a resolver for a build context directory
    pub fn new(context: impl Into<PathBuf>) -> Self {
        Self {
            context: normalize_path(&context.into()),
            max_depth: DEFAULT_MAX_WALK_DEPTH,
        }
    }

    /// Bound directory expansion depth
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn context(&self) -> &Path {
        &self.context
    }

    /// Fill in each layer's dependencies and return the build-time snapshot
    ///
    /// Any filesystem error while reading a present path aborts the pass.
    pub fn resolve(&self, layers: &mut [Layer]) -> Result<DependencySnapshot> {
        let mut snapshot = DependencySnapshot::new();

        for layer in layers.iter_mut() {
            let Some(source) = source_reference(&layer.instruction) else {
                continue;
            };
            tracing::debug!("Layer {} depends on {}", layer.index, source);

            let mut deps = DependencyList::default();
            self.resolve_source(source, &mut deps, &mut snapshot)?;
            layer.dependencies = deps.into_vec();
        }

        tracing::info!(
            "Resolved dependencies: {} paths, {} snapshotted files",
            snapshot.len(),
            snapshot.contents.len()
        );
        Ok(snapshot)
    }

    fn resolve_source(
        &self,
        source: &str,
        deps: &mut DependencyList,
        snapshot: &mut DependencySnapshot,
    ) -> Result<()> {
        if is_url(source) {
            deps.push(DependencyPath::Url(source.to_string()));
            return Ok(());
        }

        // Sources are always relative to the context, even with a leading slash
        let resolved = normalize_path(&self.context.join(source.trim_start_matches('/')));

        let metadata = match fs::metadata(&resolved) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("Skipping missing dependency {}", resolved.display());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.is_file() {
            record_file(&resolved, deps, snapshot)?;
        } else if metadata.is_dir() {
            deps.push(DependencyPath::Path(resolved.clone()));
            snapshot.record_path(resolved.clone());
            self.expand_dir(&resolved, deps, snapshot)?;
        }
        Ok(())
    }

    /// Record every descendant of `root`
    fn expand_dir(
        &self,
        root: &Path,
        deps: &mut DependencyList,
        snapshot: &mut DependencySnapshot,
    ) -> Result<()> {
        let mut visited: HashSet<PathBuf> = HashSet::new();
        visited.insert(root.canonicalize()?);

        let mut stack = vec![(root.to_path_buf(), 0usize)];
        while let Some((dir, depth)) = stack.pop() {
            if depth >= self.max_depth {
                tracing::warn!(
                    "Not expanding {}: depth limit {} reached",
                    dir.display(),
                    self.max_depth
                );
                continue;
            }

            let mut entries = fs::read_dir(&dir)?
                .map(|entry| entry.map(|e| e.path()))
                .collect::<io::Result<Vec<_>>>()?;
            entries.sort();

            let mut subdirs = Vec::new();
            for path in entries {
                let metadata = match fs::metadata(&path) {
                    Ok(m) => m,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        tracing::debug!("Skipping dangling entry {}", path.display());
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };

                if metadata.is_file() {
                    record_file(&path, deps, snapshot)?;
                } else if metadata.is_dir() {
                    deps.push(DependencyPath::Path(path.clone()));
                    snapshot.record_path(path.clone());
                    if visited.insert(path.canonicalize()?) {
                        subdirs.push((path, depth + 1));
                    } else {
                        tracing::debug!("Already expanded {}, not following again", path.display());
                    }
                }
            }
            // Reversed so the first subdirectory is expanded first
            stack.extend(subdirs.into_iter().rev());
        }
        Ok(())
    }
}

fn record_file(path: &Path, deps: &mut DependencyList, snapshot: &mut DependencySnapshot) -> Result<()> {
    let content = read_lossy(path)?;
    deps.push(DependencyPath::Path(path.to_path_buf()));
    snapshot.record_file(path.to_path_buf(), content);
    Ok(())
}

/// Insertion-ordered list without duplicates
#[derive(Default)]
struct DependencyList {
    items: Vec<DependencyPath>,
    seen: HashSet<DependencyPath>,
}

impl DependencyList {
    fn push(&mut self, dep: DependencyPath) {
        if self.seen.insert(dep.clone()) {
            self.items.push(dep);
        }
    }

    fn into_vec(self) -> Vec<DependencyPath> {
        self.items
    }
}

/// Source reference of a COPY/ADD instruction
///
/// The first token after the keyword that is not a `--flag`. Sources copied
/// from another stage (`--from=`) have no context dependency.
pub fn source_reference(instruction: &str) -> Option<&str> {
    let mut tokens = instruction.split_whitespace();
    let keyword = tokens.next()?;
    if !(keyword == "COPY" || keyword == "ADD") || !instruction.starts_with(keyword) {
        return None;
    }

    let mut source = None;
    for token in tokens {
        if token.starts_with("--from=") {
            return None;
        }
        if !token.starts_with("--") {
            source = Some(token);
            break;
        }
    }
    source
}

/// Whether a source reference parses as an absolute URL
pub fn is_url(source: &str) -> bool {
    url::Url::parse(source).is_ok()
}

// ============================================================================
// Tests
// ============================================================================
