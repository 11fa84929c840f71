//! Command modules for the layerprof CLI
//!
//! Each command module implements a single top-level command:
//! - `build` - Build once and report per-layer metrics
//! - `watch` - Build, then track cache invalidation live
//! - `segment` - Print instruction groups
//! - `parse` - Parse saved engine output offline
//!
//! All command handlers take their respective `Args` struct from `cli.rs`
//! and a shared `CommandContext` for output format, verbosity and config.

pub mod build;
pub mod parse;
pub mod segment;
pub mod watch;

pub use build::run_build;
pub use parse::run_parse;
pub use segment::run_segment;
pub use watch::run_watch;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::config::LayerprofConfig;
use crate::error::Result;
use crate::layer::Layer;
use crate::parser::AlignmentMismatch;
use crate::view::LayerView;

/// Shared context passed to all command handlers
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    /// Output format (text or json)
    pub format: OutputFormat,
    /// Show verbose output
    pub verbose: bool,
    /// Loaded configuration
    pub config: LayerprofConfig,
}

impl CommandContext {
    /// Create a new CommandContext from CLI args
    pub fn from_cli(format: OutputFormat, verbose: bool, config: LayerprofConfig) -> Self {
        Self {
            format,
            verbose,
            config,
        }
    }
}

/// Serialize a command result as pretty JSON
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(format!("{}\n", serde_json::to_string_pretty(value)?))
}

/// Layers of one build together with their rendered view
#[derive(Debug, Serialize)]
pub struct LayerReport<'a> {
    pub layers: &'a [Layer],
    pub view: &'a LayerView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch: Option<AlignmentMismatch>,
}

impl LayerReport<'_> {
    /// Render in the requested format
    pub fn render(&self, ctx: &CommandContext) -> Result<String> {
        match ctx.format {
            OutputFormat::Json => to_json(self),
            OutputFormat::Text => Ok(self.to_text(ctx.verbose)),
        }
    }

    fn to_text(&self, verbose: bool) -> String {
        let mut out = String::new();
        out.push_str("═══════════════════════════════════════════\n");
        out.push_str(&format!("  LAYERS ({})\n", self.view.records.len()));
        out.push_str("═══════════════════════════════════════════\n\n");

        for record in &self.view.records {
            out.push_str(&format!(
                "  [{}] {:<8} line {:<4} {:>10} {:>10}{}\n",
                record.index,
                record.instruction.as_str(),
                record.line_num + 1,
                record.converted_size,
                record.duration,
                if record.rebuild { "  (rebuild)" } else { "" }
            ));
            if verbose {
                if let Some(layer) = self.layers.get(record.index) {
                    for dep in &layer.dependencies {
                        match dep {
                            crate::layer::DependencyPath::Path(p) => {
                                out.push_str(&format!("        <- {}\n", p.display()))
                            }
                            crate::layer::DependencyPath::Url(u) => {
                                out.push_str(&format!("        <- {}\n", u))
                            }
                        }
                    }
                }
            }
        }

        out.push_str(&format!(
            "\n  total{:>24} {:>10}\n",
            self.view.aggregate.converted_size, self.view.aggregate.duration
        ));

        if let Some(m) = self.mismatch {
            out.push_str(&format!(
                "\n  warning: {} progress steps for {} layers, durations may be misattributed\n",
                m.blocks, m.layers
            ));
        }
        out
    }
}
