//! Layer records produced by a successful build
//!
//! A `Layer` is created once by the log parser and dependency resolver at the
//! end of a build and is read-only afterwards.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Build duration reported by the engine for one step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "seconds")]
pub enum BuildDuration {
    /// Step executed, taking this many seconds
    Measured(f64),
    /// Step reused from the build cache
    CacheHit,
}

impl BuildDuration {
    /// Seconds counted toward totals and diffs (cache hits count as zero)
    pub fn seconds(&self) -> f64 {
        match self {
            Self::Measured(s) => *s,
            Self::CacheHit => 0.0,
        }
    }

    /// Seconds of an executed step, `None` for a cache hit
    pub fn measured(&self) -> Option<f64> {
        match self {
            Self::Measured(s) => Some(*s),
            Self::CacheHit => None,
        }
    }
}

impl fmt::Display for BuildDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Measured(s) => write!(f, "{}", format_seconds(*s)),
            Self::CacheHit => f.write_str("CACHED"),
        }
    }
}

/// Something a COPY/ADD instruction depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum DependencyPath {
    /// File or directory inside the build context
    Path(PathBuf),
    /// Remote source, recorded verbatim
    Url(String),
}

impl DependencyPath {
    /// Filesystem path, if this is not a URL
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(p) => Some(p),
            Self::Url(_) => None,
        }
    }
}

/// One build step's artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Ordinal position (0 = base image)
    pub index: usize,
    /// Instruction that created the layer
    pub instruction: String,
    /// Size in bytes
    pub size: u64,
    /// Duration, if the progress log reported one
    pub duration: Option<BuildDuration>,
    /// Dependency paths, in resolution order
    pub dependencies: Vec<DependencyPath>,
}

impl Layer {
    pub fn new(index: usize, instruction: impl Into<String>, size: u64) -> Self {
        Self {
            index,
            instruction: instruction.into(),
            size,
            duration: None,
            dependencies: Vec::new(),
        }
    }

    /// Seconds counted toward totals (cache hit and unreported count as zero)
    pub fn seconds(&self) -> f64 {
        self.duration.map_or(0.0, |d| d.seconds())
    }

    /// Display form of the duration (empty when unreported)
    pub fn duration_text(&self) -> String {
        self.duration.map(|d| d.to_string()).unwrap_or_default()
    }

    /// Whether `path` is one of this layer's filesystem dependencies
    pub fn depends_on(&self, path: &Path) -> bool {
        self.dependencies
            .iter()
            .any(|d| d.as_path() == Some(path))
    }
}

// ============================================================================
// Number formatting
// ============================================================================

/// Round to two decimals, halves rounded toward positive infinity
pub fn round2(value: f64) -> f64 {
    (value * 100.0 + 0.5).floor() / 100.0
}

/// Format a number the way a plain decimal renders: no trailing zeros
pub fn format_number(value: f64) -> String {
    let rounded = round2(value);
    if rounded == 0.0 {
        return "0".to_string();
    }
    let text = format!("{:.2}", rounded);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Format seconds as `<n>s`
pub fn format_seconds(seconds: f64) -> String {
    format!("{}s", format_number(seconds))
}

/// Convert a signed byte count to decimal units (B, KB, MB, GB)
///
/// The unit is chosen from the magnitude; the sign is preserved.
pub fn format_size(size: i64) -> String {
    const KB: f64 = 1000.0;
    const MB: f64 = KB * KB;
    const GB: f64 = KB * KB * KB;

    let abs = size.unsigned_abs() as f64;
    let (scaled, unit) = if abs >= GB {
        (abs / GB, "GB")
    } else if abs >= MB {
        (abs / MB, "MB")
    } else if abs >= KB {
        (abs / KB, "KB")
    } else {
        (abs, "B")
    };

    let magnitude = format_number(scaled);
    if size < 0 {
        format!("-{}{}", magnitude, unit)
    } else {
        format!("{}{}", magnitude, unit)
    }
}

// ============================================================================
// Tests
// ============================================================================
