//! Profiling session and its event loop
//!
//! A `Session` owns everything one profiling run needs: the build engine,
//! configuration, the build-time instruction groups, the current layers, the
//! invalidation tracker, the build history and the rendered view.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ notify       │──┐
//! │ watcher      │  │
//! └──────────────┘  │     ┌──────────────┐     ┌──────────────┐
//! ┌──────────────┐  ├────>│  mpsc        │────>│  Session     │──> JSON lines
//! │ build thread │──┤     │  SessionEvent│     │  (one loop)  │    (stdout)
//! └──────────────┘  │     └──────────────┘     └──────────────┘
//! ┌──────────────┐  │
//! │ stdin reader │──┘
//! └──────────────┘
//! ```
//!
//! Producers never touch session state. Each event is handled to completion
//! before the next one is received, so no state is shared across threads.

pub mod commands;

use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;

use crate::config::LayerprofConfig;
use crate::deps::DependencyResolver;
use crate::diff::DiffEngine;
use crate::engine::{BuildEngine, BuildRequest};
use crate::error::{LayerprofError, Result};
use crate::events::{
    BuildFailedEvent, BuildOutputEvent, BuildStartedEvent, ClearHighlightEvent, DiffUpdatedEvent,
    EventEmitter, HighlightEvent, InvalidationChangedEvent, LayersRenderedEvent, ScrollToLineEvent,
};
use crate::fs_utils::{canonical_dir, normalize_path, read_lossy};
use crate::history::{BuildHistory, BuildSnapshot};
use crate::instruction::{segment, InstructionGroup};
use crate::layer::Layer;
use crate::parser::{AlignmentMismatch, BuildLogParser};
use crate::tracker::CacheInvalidationTracker;
use crate::view::{InMemoryDocument, LayerView, SourceDocument};

pub use commands::{spawn_command_reader, EditorCommand};

/// Everything the session reacts to
#[derive(Debug)]
pub enum SessionEvent {
    /// The build description was edited in the editor
    SourceEdited {
        start_line: usize,
        end_line: usize,
        /// Inserted text
        text: String,
        /// Whole document after the edit
        full_text: String,
    },
    /// Another open document's buffer changed
    DocumentChanged { path: PathBuf, content: String },
    /// The build description gained or lost editor focus
    FocusChanged { source_active: bool },
    PathCreated(PathBuf),
    PathDeleted(PathBuf),
    PathWritten(PathBuf),
    BuildRequested { comment: String },
    /// One line of the running build's progress log
    BuildOutput(String),
    BuildFinished(Result<BuildArtifacts>),
    /// Compare against a prior build (0 = the build before the current one)
    HistorySelected { index: usize },
    ScrollToLine { index: usize },
    Highlight { index: usize },
    ClearHighlight { index: usize },
    Shutdown,
}

/// Raw engine output of a successful build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifacts {
    pub progress_log: String,
    pub listing: String,
}

/// Run a build to completion on `engine`
///
/// Streams progress lines to `on_line`, then fetches the inspection listing
/// and optionally prunes dangling images.
pub fn run_engine(
    engine: &dyn BuildEngine,
    request: &BuildRequest,
    prune: bool,
    on_line: &mut dyn FnMut(&str),
) -> Result<BuildArtifacts> {
    let progress_log = engine.build(request, on_line)?.into_log()?;
    let listing = engine.history(&request.tag)?;
    if prune {
        engine.prune();
    }
    Ok(BuildArtifacts {
        progress_log,
        listing,
    })
}

/// Run a build and send its progress and result to the session loop
///
/// The build runs to completion even if the loop has already gone away.
fn forward_build(engine: &dyn BuildEngine, request: &BuildRequest, prune: bool, tx: &Sender<SessionEvent>) {
    let mut receiver_gone = false;
    let result = run_engine(engine, request, prune, &mut |line| {
        if !receiver_gone && tx.send(SessionEvent::BuildOutput(line.to_string())).is_err() {
            tracing::debug!("Session loop closed, dropping build output");
            receiver_gone = true;
        }
    });
    if tx.send(SessionEvent::BuildFinished(result)).is_err() {
        tracing::debug!("Session loop closed before the build finished");
    }
}

/// State captured when a build starts
struct PendingBuild {
    source_text: String,
    groups: Vec<InstructionGroup>,
    comment: String,
}

/// One profiling session
pub struct Session {
    engine: Arc<dyn BuildEngine>,
    config: LayerprofConfig,
    request: BuildRequest,
    emitter: EventEmitter,
    parser: BuildLogParser,
    diff_engine: DiffEngine,
    document: InMemoryDocument,
    pending: Option<PendingBuild>,
    layers: Vec<Layer>,
    tracker: CacheInvalidationTracker,
    history: BuildHistory,
    view: Option<LayerView>,
    mismatch: Option<AlignmentMismatch>,
    source_active: bool,
    /// Shutdown arrived while a build was running
    shutdown_requested: bool,
}

impl Session {
    /// Create a session for one build description and context directory
    pub fn new(
        engine: Arc<dyn BuildEngine>,
        config: LayerprofConfig,
        source: &Path,
        context: &Path,
        emitter: EventEmitter,
    ) -> Result<Self> {
        if !source.is_file() {
            return Err(LayerprofError::SourceNotFound {
                path: source.display().to_string(),
            });
        }
        let source = normalize_path(&source.canonicalize()?);
        let context = canonical_dir(context)?;
        let document = InMemoryDocument::new(read_lossy(&source)?);

        let request = BuildRequest {
            source,
            context,
            tag: config.engine.image_tag.clone(),
        };

        Ok(Self {
            engine,
            diff_engine: DiffEngine::new(config.view.half_width()),
            history: BuildHistory::with_capacity(config.history.capacity),
            config,
            request,
            emitter,
            parser: BuildLogParser::new(),
            document,
            pending: None,
            layers: Vec::new(),
            tracker: CacheInvalidationTracker::new(),
            view: None,
            mismatch: None,
            source_active: true,
            shutdown_requested: false,
        })
    }

    pub fn request(&self) -> &BuildRequest {
        &self.request
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn tracker(&self) -> &CacheInvalidationTracker {
        &self.tracker
    }

    pub fn history(&self) -> &BuildHistory {
        &self.history
    }

    pub fn view(&self) -> Option<&LayerView> {
        self.view.as_ref()
    }

    pub fn document(&self) -> &InMemoryDocument {
        &self.document
    }

    /// Alignment problem of the last parsed build, if any
    pub fn mismatch(&self) -> Option<AlignmentMismatch> {
        self.mismatch
    }

    pub fn is_building(&self) -> bool {
        self.pending.is_some()
    }

    // ========================================================================
    // Build lifecycle
    // ========================================================================

    /// Run one build on the calling thread
    pub fn build_blocking(&mut self, comment: &str) -> Result<()> {
        let Some(request) = self.begin_build(comment)? else {
            return Ok(());
        };
        let emitter = &self.emitter;
        let result = run_engine(
            self.engine.as_ref(),
            &request,
            self.config.engine.prune_after_build,
            &mut |line| {
                emitter.emit(&BuildOutputEvent {
                    text: line.to_string(),
                })
            },
        );
        self.finish_build(result)
    }

    /// Start a build on a worker thread; progress and completion arrive on `tx`
    pub fn spawn_build(&mut self, comment: &str, tx: &Sender<SessionEvent>) -> Result<()> {
        let Some(request) = self.begin_build(comment)? else {
            return Ok(());
        };
        let engine = Arc::clone(&self.engine);
        let prune = self.config.engine.prune_after_build;
        let tx = tx.clone();

        std::thread::spawn(move || forward_build(engine.as_ref(), &request, prune, &tx));
        Ok(())
    }

    /// Capture the build description and dispose of the previous view
    ///
    /// Returns `None` when a build is already running.
    fn begin_build(&mut self, comment: &str) -> Result<Option<BuildRequest>> {
        if self.pending.is_some() {
            tracing::warn!("Build already running, ignoring build request");
            return Ok(None);
        }

        let source_text = read_lossy(&self.request.source)?;
        self.document.replace(source_text.clone());

        if let Some(view) = self.view.as_mut() {
            for index in view.clear_all_highlights() {
                self.emitter.emit(&ClearHighlightEvent { index });
            }
        }
        self.view = None;
        self.tracker.disarm();

        self.pending = Some(PendingBuild {
            groups: segment(&source_text),
            source_text,
            comment: comment.to_string(),
        });

        tracing::info!("Build started: {}", self.request.source.display());
        self.emitter.emit(&BuildStartedEvent::new(
            &self.request.source,
            &self.request.context,
            comment,
        ));
        Ok(Some(self.request.clone()))
    }

    /// Turn the engine's output into layers, or report the failure
    ///
    /// On failure the tracker stays disarmed until the next successful build.
    pub fn finish_build(&mut self, result: Result<BuildArtifacts>) -> Result<()> {
        let Some(pending) = self.pending.take() else {
            tracing::warn!("Build result arrived with no build running");
            return Ok(());
        };

        match result.and_then(|artifacts| self.complete_build(pending, artifacts)) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::debug!("Build failed: {}", e);
                self.emitter.emit(&BuildFailedEvent::from_error(&e));
                Err(e)
            }
        }
    }

    fn complete_build(&mut self, pending: PendingBuild, artifacts: BuildArtifacts) -> Result<()> {
        let report = self
            .parser
            .parse(&pending.groups, &artifacts.listing, &artifacts.progress_log);
        if report.base_boundary == 0 && pending.groups.len() > 1 {
            return Err(LayerprofError::Engine {
                message: format!(
                    "image listing has no rows for the {} authored instructions",
                    pending.groups.len() - 1
                ),
            });
        }
        let mut layers = report.layers;

        let snapshot = DependencyResolver::new(&self.request.context)
            .with_max_depth(self.config.resolver.max_walk_depth)
            .resolve(&mut layers)?;

        let mut view = LayerView::build(&self.config.view, &pending.source_text, &layers);
        if let Some(prior) = self.history.latest() {
            let diff = self.diff_engine.diff(&layers, &prior.layers);
            view.apply_diff(&self.config.view, &diff);
        }

        self.history
            .push(BuildSnapshot::new(layers.clone(), view.clone(), pending.comment));
        self.tracker.reset(&layers, pending.groups, snapshot);
        view.set_rebuild_flags(self.tracker.flags());

        self.emitter.emit(&LayersRenderedEvent::new(
            &view,
            self.history.comments().into_iter().map(str::to_string).collect(),
            self.history.prior_count(),
            report.mismatch,
        ));
        tracing::info!("Build completed: {} layers", layers.len());

        self.layers = layers;
        self.view = Some(view);
        self.mismatch = report.mismatch;
        Ok(())
    }

    // ========================================================================
    // Event loop
    // ========================================================================

    /// Handle events until `Shutdown` or until every producer is gone
    pub fn run(&mut self, tx: Sender<SessionEvent>, rx: Receiver<SessionEvent>) {
        while let Ok(event) = rx.recv() {
            if !self.handle(event, &tx) {
                break;
            }
        }
        tracing::info!("Session ended");
    }

    /// Handle one event; returns false on shutdown
    ///
    /// A shutdown during a build takes effect once the build has finished.
    pub fn handle(&mut self, event: SessionEvent, tx: &Sender<SessionEvent>) -> bool {
        match event {
            SessionEvent::SourceEdited {
                start_line,
                end_line,
                text,
                full_text,
            } => self.on_source_edited(start_line, end_line, &text, full_text),
            SessionEvent::DocumentChanged { path, content } => {
                if self.accepts_external("document change") {
                    let changed = self.tracker.on_content_change(&normalize_path(&path), &content);
                    self.publish_invalidation(changed);
                }
            }
            SessionEvent::FocusChanged { source_active } => {
                tracing::debug!("Source document active: {}", source_active);
                self.source_active = source_active;
            }
            SessionEvent::PathCreated(path) => {
                if self.accepts_external("creation") {
                    let changed = self.tracker.on_created(&normalize_path(&path));
                    self.publish_invalidation(changed);
                }
            }
            SessionEvent::PathDeleted(path) => {
                if self.accepts_external("deletion") {
                    let changed = self.tracker.on_deleted(&normalize_path(&path));
                    self.publish_invalidation(changed);
                }
            }
            SessionEvent::PathWritten(path) => {
                if self.accepts_external("write") {
                    let changed = self.tracker.on_written(&normalize_path(&path));
                    self.publish_invalidation(changed);
                }
            }
            SessionEvent::BuildRequested { comment } => {
                if let Err(e) = self.spawn_build(&comment, tx) {
                    tracing::error!("Could not start build: {}", e);
                    self.emitter.emit(&BuildFailedEvent::from_error(&e));
                }
            }
            SessionEvent::BuildOutput(line) => self.emitter.emit(&BuildOutputEvent { text: line }),
            SessionEvent::BuildFinished(result) => {
                if let Err(e) = self.finish_build(result) {
                    tracing::error!("Build did not produce layers: {}", e);
                }
                if self.shutdown_requested {
                    return false;
                }
            }
            SessionEvent::HistorySelected { index } => self.select_prior(index),
            SessionEvent::ScrollToLine { index } => {
                match self.view.as_ref().and_then(|v| v.record(index)) {
                    Some(record) => self.emitter.emit(&ScrollToLineEvent {
                        index,
                        line: record.line_num,
                    }),
                    None => tracing::debug!("No layer {} to scroll to", index),
                }
            }
            SessionEvent::Highlight { index } => {
                if let Some(view) = self.view.as_mut() {
                    if let Some(range) = view.highlight(&self.document, index) {
                        self.emitter.emit(&HighlightEvent { index, range });
                    }
                }
            }
            SessionEvent::ClearHighlight { index } => {
                if let Some(view) = self.view.as_mut() {
                    if view.clear_highlight(index) {
                        self.emitter.emit(&ClearHighlightEvent { index });
                    }
                }
            }
            SessionEvent::Shutdown => {
                if self.pending.is_some() {
                    tracing::info!("Waiting for the running build before shutting down");
                    self.shutdown_requested = true;
                    return true;
                }
                return false;
            }
        }
        true
    }

    fn on_source_edited(&mut self, start_line: usize, end_line: usize, text: &str, full_text: String) {
        self.document.replace(full_text);

        if self.pending.is_some() || !self.tracker.is_armed() {
            tracing::debug!("Dropping source edit: no finished build to compare with");
            return;
        }
        if !self.source_active {
            tracing::debug!("Dropping source edit: source document not active");
            return;
        }

        if let Some(view) = self.view.as_mut() {
            view.shift_lines(&self.document, start_line, end_line, text);
        }
        let changed = self.tracker.on_source_edit(self.document.text());
        self.publish_invalidation(changed);
    }

    fn accepts_external(&self, what: &str) -> bool {
        if self.pending.is_some() || !self.tracker.is_armed() {
            tracing::debug!("Dropping {} event: no finished build to compare with", what);
            return false;
        }
        true
    }

    fn publish_invalidation(&mut self, changed: Vec<usize>) {
        if changed.is_empty() {
            return;
        }
        if let Some(view) = self.view.as_mut() {
            view.set_rebuild_flags(self.tracker.flags());
        }
        self.emitter.emit(&InvalidationChangedEvent::new(
            self.tracker.boundary(),
            changed,
            self.tracker.flags(),
        ));
    }

    fn select_prior(&mut self, recency: usize) {
        let diff = match (self.history.latest(), self.history.prior(recency)) {
            (Some(current), Some(prior)) => self.diff_engine.diff(&current.layers, &prior.layers),
            _ => {
                tracing::warn!("No prior build at position {}", recency);
                return;
            }
        };

        if let Some(view) = self.view.as_mut() {
            view.apply_diff(&self.config.view, &diff);
            self.emitter.emit(&DiffUpdatedEvent {
                recency,
                records: view.records.clone(),
                aggregate: view.aggregate.clone(),
            });
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
