//! View events for the rendering collaborator
//!
//! In watch mode every state change the renderer cares about is written to
//! stdout as one JSON object per line (JSON Lines):
//!
//! ```json
//! {"type":"invalidation_changed","source_boundary":1,"external_boundary":3,...}
//! ```
//!
//! # Event Types
//!
//! - `build_started` - A build was requested and the engine is running
//! - `build_output` - One line of the engine's progress log
//! - `build_failed` - The engine exited non-zero or could not be run
//! - `layers_rendered` - A build finished and its layer view is ready
//! - `invalidation_changed` - Cache invalidation flags moved
//! - `diff_updated` - A different prior build was selected for comparison
//! - `scroll_to_line` - Reveal a layer's instruction in the editor
//! - `highlight` / `clear_highlight` - Decorate a layer's instruction text

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::parser::AlignmentMismatch;
use crate::tracker::InvalidationBoundary;
use crate::view::{AggregateRecord, LayerView, LayerViewRecord, TextRange};

/// Writes view events as JSON lines
pub struct EventEmitter {
    enabled: bool,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl EventEmitter {
    /// Emitter writing to stdout
    pub fn new(enabled: bool) -> Self {
        Self::with_writer(enabled, Box::new(io::stdout()))
    }

    /// Emitter writing to any sink
    pub fn with_writer(enabled: bool, writer: Box<dyn Write + Send>) -> Self {
        Self {
            enabled,
            writer: Mutex::new(writer),
        }
    }

    /// Emitter collecting lines in memory, for inspection
    pub fn capturing() -> (Self, CapturedEvents) {
        let captured = CapturedEvents::default();
        let emitter = Self::with_writer(true, Box::new(captured.clone()));
        (emitter, captured)
    }

    /// Emit an event as one JSON line
    pub fn emit<E: ViewEvent>(&self, event: &E) {
        if !self.enabled {
            return;
        }

        let wrapper = EventWrapper {
            event_type: E::event_type(),
            payload: event,
        };

        match serde_json::to_string(&wrapper) {
            Ok(json) => {
                let mut handle = self.writer.lock();
                // The reader may have gone away
                let _ = writeln!(handle, "{}", json);
                let _ = handle.flush();
            }
            Err(e) => tracing::error!("Could not serialize {} event: {}", E::event_type(), e),
        }
    }
}

/// Shared in-memory event sink
#[derive(Clone, Default)]
pub struct CapturedEvents {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CapturedEvents {
    /// Every emitted event, parsed back into JSON values
    pub fn events(&self) -> Vec<serde_json::Value> {
        let buf = self.buf.lock();
        String::from_utf8_lossy(&buf)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Emitted events of one type
    pub fn of_type(&self, event_type: &str) -> Vec<serde_json::Value> {
        self.events()
            .into_iter()
            .filter(|e| e["type"] == event_type)
            .collect()
    }
}

impl Write for CapturedEvents {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Wrapper for events with type field
#[derive(Serialize)]
struct EventWrapper<'a, P: Serialize> {
    #[serde(rename = "type")]
    event_type: &'static str,
    #[serde(flatten)]
    payload: &'a P,
}

/// Trait for view events
pub trait ViewEvent: Serialize {
    fn event_type() -> &'static str;
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ============================================================================
// Event Types
// ============================================================================

/// A build started
#[derive(Debug, Clone, Serialize)]
pub struct BuildStartedEvent {
    pub source: String,
    pub context: String,
    pub comment: String,
    /// Timestamp (ISO 8601)
    pub timestamp: String,
}

impl ViewEvent for BuildStartedEvent {
    fn event_type() -> &'static str {
        "build_started"
    }
}

impl BuildStartedEvent {
    pub fn new(source: &std::path::Path, context: &std::path::Path, comment: &str) -> Self {
        Self {
            source: source.display().to_string(),
            context: context.display().to_string(),
            comment: comment.to_string(),
            timestamp: now(),
        }
    }
}

/// One streamed progress log line
#[derive(Debug, Clone, Serialize)]
pub struct BuildOutputEvent {
    pub text: String,
}

impl ViewEvent for BuildOutputEvent {
    fn event_type() -> &'static str {
        "build_output"
    }
}

/// The build did not produce layers
#[derive(Debug, Clone, Serialize)]
pub struct BuildFailedEvent {
    pub message: String,
    /// Raw engine stderr, when the engine ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    pub timestamp: String,
}

impl ViewEvent for BuildFailedEvent {
    fn event_type() -> &'static str {
        "build_failed"
    }
}

impl BuildFailedEvent {
    pub fn from_error(error: &crate::error::LayerprofError) -> Self {
        let log = match error {
            crate::error::LayerprofError::BuildFailed { log } => Some(log.clone()),
            _ => None,
        };
        Self {
            message: error.to_string(),
            log,
            timestamp: now(),
        }
    }
}

/// A build finished and its view is ready
#[derive(Debug, Clone, Serialize)]
pub struct LayersRenderedEvent {
    pub records: Vec<LayerViewRecord>,
    pub aggregate: AggregateRecord,
    /// Comments of every kept build, oldest first
    pub comments: Vec<String>,
    /// Number of prior builds available for comparison
    pub prior_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch: Option<AlignmentMismatch>,
    pub timestamp: String,
}

impl ViewEvent for LayersRenderedEvent {
    fn event_type() -> &'static str {
        "layers_rendered"
    }
}

impl LayersRenderedEvent {
    pub fn new(
        view: &LayerView,
        comments: Vec<String>,
        prior_count: usize,
        mismatch: Option<AlignmentMismatch>,
    ) -> Self {
        Self {
            records: view.records.clone(),
            aggregate: view.aggregate.clone(),
            comments,
            prior_count,
            mismatch,
            timestamp: now(),
        }
    }
}

/// Invalidation flags moved
#[derive(Debug, Clone, Serialize)]
pub struct InvalidationChangedEvent {
    pub source_boundary: usize,
    pub external_boundary: usize,
    /// Layers whose flag flipped
    pub changed: Vec<usize>,
    /// Every flag, index = layer
    pub flags: Vec<bool>,
}

impl ViewEvent for InvalidationChangedEvent {
    fn event_type() -> &'static str {
        "invalidation_changed"
    }
}

impl InvalidationChangedEvent {
    pub fn new(boundary: InvalidationBoundary, changed: Vec<usize>, flags: &[bool]) -> Self {
        Self {
            source_boundary: boundary.source_boundary,
            external_boundary: boundary.external_boundary,
            changed,
            flags: flags.to_vec(),
        }
    }
}

/// The comparison target changed
#[derive(Debug, Clone, Serialize)]
pub struct DiffUpdatedEvent {
    /// Selected prior build (0 = the build just before the current one)
    pub recency: usize,
    pub records: Vec<LayerViewRecord>,
    pub aggregate: AggregateRecord,
}

impl ViewEvent for DiffUpdatedEvent {
    fn event_type() -> &'static str {
        "diff_updated"
    }
}

/// Reveal a layer's instruction line
#[derive(Debug, Clone, Serialize)]
pub struct ScrollToLineEvent {
    pub index: usize,
    pub line: usize,
}

impl ViewEvent for ScrollToLineEvent {
    fn event_type() -> &'static str {
        "scroll_to_line"
    }
}

/// Decorate a layer's instruction text
#[derive(Debug, Clone, Serialize)]
pub struct HighlightEvent {
    pub index: usize,
    pub range: TextRange,
}

impl ViewEvent for HighlightEvent {
    fn event_type() -> &'static str {
        "highlight"
    }
}

/// Remove a layer's decoration
#[derive(Debug, Clone, Serialize)]
pub struct ClearHighlightEvent {
    pub index: usize,
}

impl ViewEvent for ClearHighlightEvent {
    fn event_type() -> &'static str {
        "clear_highlight"
    }
}

// ============================================================================
// Tests
// ============================================================================
