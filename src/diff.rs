//! Cross-build metric diffs
//!
//! Compares the current build's layers with a prior build's, index by index.
//! A layer with no counterpart in the prior build is compared against zero.
//! Cache hits and unreported durations count as zero seconds on both sides.

use std::fmt;

use serde::Serialize;

use crate::layer::{format_seconds, format_size, round2, Layer};

/// Bar colour for a non-negative delta
pub const GROWTH_COLOR: &str = "darkred";
/// Bar colour for a negative delta
pub const SHRINK_COLOR: &str = "darkgreen";

/// Prefix a formatted delta: `+` above zero, `±` at zero, natural sign below
fn signed_text(value: f64, magnitude: String) -> String {
    if value > 0.0 {
        format!("+{}", magnitude)
    } else if value == 0.0 {
        format!("±{}", magnitude)
    } else {
        magnitude
    }
}

/// Display text of a size delta (`+20B`, `±0B`, `-1.5KB`)
pub fn size_delta_text(delta: i64) -> String {
    signed_text(delta as f64, format_size(delta))
}

/// Display text of a duration delta (`+1.25s`, `±0s`, `-2s`)
pub fn duration_delta_text(delta: f64) -> String {
    signed_text(delta, format_seconds(delta))
}

/// Signed bar scaled against the largest magnitude of its metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffBar {
    /// Signed width; negative bars extend left of the centre line
    pub width: f64,
    pub color: &'static str,
}

impl DiffBar {
    fn scaled(delta: f64, max_abs: f64, half_width: f64) -> Self {
        let width = if max_abs != 0.0 {
            delta / max_abs * half_width
        } else {
            0.0
        };
        Self {
            width,
            color: if width >= 0.0 { GROWTH_COLOR } else { SHRINK_COLOR },
        }
    }
}

/// Delta of one metric pair (size and duration) with display text and bars
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDelta {
    pub size_delta: i64,
    pub duration_delta: f64,
    pub size_text: String,
    pub duration_text: String,
    pub size_bar: DiffBar,
    pub duration_bar: DiffBar,
}

/// Result of comparing two builds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildDiff {
    /// One entry per current layer
    pub layers: Vec<MetricDelta>,
    /// Sum of the per-layer deltas
    pub aggregate: MetricDelta,
}

impl BuildDiff {
    /// Whether every delta is zero
    pub fn is_unchanged(&self) -> bool {
        self.aggregate.size_delta == 0
            && self.aggregate.duration_delta == 0.0
            && self
                .layers
                .iter()
                .all(|l| l.size_delta == 0 && l.duration_delta == 0.0)
    }
}

impl fmt::Display for BuildDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, layer) in self.layers.iter().enumerate() {
            writeln!(f, "  [{}] {:>10} {:>10}", i, layer.size_text, layer.duration_text)?;
        }
        write!(
            f,
            "  total {:>10} {:>10}",
            self.aggregate.size_text, self.aggregate.duration_text
        )
    }
}

/// Computes signed per-layer and aggregate deltas between two builds
#[derive(Debug, Clone, Copy)]
pub struct DiffEngine {
    half_bar_width: f64,
}

impl DiffEngine {
    /// `half_bar_width` is the width of a bar at the largest magnitude
    pub fn new(half_bar_width: f64) -> Self {
        Self { half_bar_width }
    }

    pub fn diff(&self, current: &[Layer], prior: &[Layer]) -> BuildDiff {
        let deltas: Vec<(i64, f64)> = current
            .iter()
            .enumerate()
            .map(|(i, layer)| {
                let (prior_size, prior_secs) = prior
                    .get(i)
                    .map_or((0, 0.0), |p| (p.size as i64, p.seconds()));
                (layer.size as i64 - prior_size, round2(layer.seconds() - prior_secs))
            })
            .collect();

        let total_size: i64 = deltas.iter().map(|(s, _)| s).sum();
        let total_secs = round2(deltas.iter().map(|(_, d)| d).sum());

        let max_size = deltas
            .iter()
            .map(|(s, _)| s.unsigned_abs())
            .chain(std::iter::once(total_size.unsigned_abs()))
            .max()
            .unwrap_or(0) as f64;
        let max_secs = deltas
            .iter()
            .map(|(_, d)| d.abs())
            .chain(std::iter::once(total_secs.abs()))
            .fold(0.0, f64::max);

        let delta = |size: i64, secs: f64| MetricDelta {
            size_delta: size,
            duration_delta: secs,
            size_text: size_delta_text(size),
            duration_text: duration_delta_text(secs),
            size_bar: DiffBar::scaled(size as f64, max_size, self.half_bar_width),
            duration_bar: DiffBar::scaled(secs, max_secs, self.half_bar_width),
        };

        BuildDiff {
            layers: deltas.iter().map(|&(s, d)| delta(s, d)).collect(),
            aggregate: delta(total_size, total_secs),
        }
    }
}
