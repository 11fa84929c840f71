//! Build output parsing
//!
//! Turns the build engine's two textual outputs into one `Layer` per build
//! step:
//!
//! - the inspection listing (`docker history --human=false`), newest row
//!   first, which gives the instruction and size of every layer
//! - the streamed progress log (`docker build --progress=plain`), which gives
//!   step durations and cache hits
//!
//! The literal conventions of one engine version (column separators, step
//! counters, `DONE`/`CACHED` markers) live behind [`LogFormat`] so another
//! format can be supported by adding an adapter.

pub mod listing;
pub mod progress;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::instruction::InstructionGroup;
use crate::layer::{BuildDuration, Layer};

pub use listing::{parse_listing, ListingRow};
pub use progress::{assign_durations, step_blocks, LogAccumulator, StepBlock};

static COLUMN_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{3,}").expect("column separator pattern"));
static BLOCK_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("block separator pattern"));
static STEP_COUNTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*(\d+)/(\d+)\]").expect("step counter pattern"));
static COMPLETION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"DONE\s(\d+\.\d+)s|CACHED").expect("completion pattern"));
static LAYER_INSTRUCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"FROM|RUN|COPY|ADD|WORKDIR").expect("instruction pattern"));

// ============================================================================
// Format adapters
// ============================================================================

/// Textual conventions of one build engine's listing and progress output
pub trait LogFormat {
    /// Split one listing row into its columns
    fn split_row<'a>(&self, row: &'a str) -> Vec<&'a str>;

    /// Split the progress log into blocks
    fn split_blocks<'a>(&self, log: &'a str) -> Vec<&'a str>;

    /// Step counter `(n, m)` of a progress block
    fn step_of(&self, block: &str) -> Option<(usize, usize)>;

    /// Completion marker of a progress block
    fn completion_of(&self, block: &str) -> Option<BuildDuration>;

    /// Whether the block names a layer-producing instruction
    fn names_layer(&self, block: &str) -> bool;
}

/// BuildKit `--progress=plain` log and `docker history` listing
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerPlainFormat;

impl LogFormat for DockerPlainFormat {
    fn split_row<'a>(&self, row: &'a str) -> Vec<&'a str> {
        COLUMN_SEPARATOR.split(row).collect()
    }

    fn split_blocks<'a>(&self, log: &'a str) -> Vec<&'a str> {
        BLOCK_SEPARATOR.split(log).collect()
    }

    fn step_of(&self, block: &str) -> Option<(usize, usize)> {
        let caps = STEP_COUNTER.captures(block)?;
        let step = caps.get(1)?.as_str().parse().ok()?;
        let total = caps.get(2)?.as_str().parse().ok()?;
        Some((step, total))
    }

    fn completion_of(&self, block: &str) -> Option<BuildDuration> {
        let caps = COMPLETION.captures(block)?;
        match caps.get(1) {
            Some(secs) => secs.as_str().parse().ok().map(BuildDuration::Measured),
            None => Some(BuildDuration::CacheHit),
        }
    }

    fn names_layer(&self, block: &str) -> bool {
        LAYER_INSTRUCTION.is_match(block)
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Progress blocks and layers could not be paired one to one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlignmentMismatch {
    /// Number of surviving progress blocks
    pub blocks: usize,
    /// Number of layers from the listing
    pub layers: usize,
}

/// Result of parsing one build's output
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    /// Layers, base image first
    pub layers: Vec<Layer>,
    /// Listing row index separating authored layers from the base image
    pub base_boundary: usize,
    /// Set when progress blocks could not be paired with layers
    pub mismatch: Option<AlignmentMismatch>,
}

/// Parser for the build engine's listing and progress log
#[derive(Debug, Clone, Default)]
pub struct BuildLogParser<F: LogFormat = DockerPlainFormat> {
    format: F,
}

impl BuildLogParser<DockerPlainFormat> {
    pub fn new() -> Self {
        Self {
            format: DockerPlainFormat,
        }
    }
}

impl<F: LogFormat> BuildLogParser<F> {
    /// Create a parser for a different engine format
    pub fn with_format(format: F) -> Self {
        Self { format }
    }

    /// Build the layer list for one build
    ///
    /// `groups` are the instruction groups captured when the build started.
    /// Without a base image group the result is empty.
    pub fn parse(&self, groups: &[InstructionGroup], listing: &str, progress_log: &str) -> ParseReport {
        if groups.is_empty() {
            tracing::debug!("No base image declaration, skipping layer parse");
            return ParseReport::default();
        }

        let (mut layers, base_boundary) = parse_listing(&self.format, groups, listing);
        let blocks = step_blocks(&self.format, progress_log);
        let mismatch = assign_durations(&mut layers, &blocks);

        if let Some(m) = mismatch {
            tracing::warn!(
                "Progress log has {} step blocks for {} layers; durations may be misattributed",
                m.blocks,
                m.layers
            );
        }

        ParseReport {
            layers,
            base_boundary,
            mismatch,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
