//! layerprof: Dockerfile layer profiler
//!
//! Builds an image, reports the size and build duration of every layer, and
//! then tracks which layers a rebuild would take out of the build cache as
//! the Dockerfile and the files it copies are edited.
//!
//! # Pipeline
//!
//! ```text
//! Dockerfile ──> instruction::segment ──┐
//!                                       ├──> parser::BuildLogParser ──> deps::DependencyResolver
//! engine output (history + log) ────────┘                                   │
//!                                                                           v
//!        history::BuildHistory <── diff::DiffEngine <── view::LayerView <── layers
//!                                                                           │
//!        editor edits / filesystem events ──> tracker::CacheInvalidationTracker
//! ```
//!
//! # Example
//!
//! ```
//! use layerprof::instruction::segment;
//!
//! let groups = segment("FROM alpine\nRUN apk add curl\nCOPY app /app\n");
//! assert_eq!(groups.len(), 3);
//! assert_eq!(groups[1].text, "RUN apk add curl\n");
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod deps;
pub mod diff;
pub mod engine;
pub mod error;
pub mod events;
pub mod fs_utils;
pub mod history;
pub mod instruction;
pub mod layer;
pub mod parser;
pub mod session;
pub mod tracker;
pub mod view;
pub mod watcher;

// Re-export commonly used types
pub use config::LayerprofConfig;
pub use deps::{DependencyResolver, DependencySnapshot};
pub use diff::{BuildDiff, DiffEngine, MetricDelta};
pub use engine::{BuildEngine, BuildOutcome, BuildRequest, DockerCli};
pub use error::{LayerprofError, Result};
pub use events::{EventEmitter, ViewEvent};
pub use history::{BuildHistory, BuildSnapshot};
pub use instruction::{segment, InstructionGroup, Keyword};
pub use layer::{BuildDuration, DependencyPath, Layer};
pub use parser::{BuildLogParser, ParseReport};
pub use session::{Session, SessionEvent};
pub use tracker::{CacheInvalidationTracker, InvalidationBoundary};
pub use view::{InMemoryDocument, LayerView, SourceDocument, ViewGeometry};
pub use watcher::{BuildContextWatcher, PathChange, WatcherHandle};
