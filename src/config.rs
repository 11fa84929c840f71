//! layerprof configuration
//!
//! Read from `--config PATH` or, by default:
//! - Linux/macOS: `$XDG_CONFIG_HOME/layerprof/config.toml` (`~/.config/layerprof/config.toml`)
//! - Windows: `%APPDATA%\layerprof\config.toml`
//!
//! Every section and key is optional; a missing file means all defaults.
//!
//! ```toml
//! [engine]
//! program = "docker"
//! image_tag = "layerprof-image"
//! prune_after_build = true
//!
//! [history]
//! capacity = 5
//!
//! [view]
//! scale = 1.4
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::deps::DEFAULT_MAX_WALK_DEPTH;
use crate::engine::DEFAULT_IMAGE_TAG;
use crate::error::{LayerprofError, Result};
use crate::fs_utils;
use crate::history::DEFAULT_CAPACITY;
use crate::view::ViewGeometry;

/// layerprof configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerprofConfig {
    /// Build engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Build history settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Filesystem watch settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Dependency resolution settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Bar chart geometry
    #[serde(default)]
    pub view: ViewGeometry,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Build engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine executable
    #[serde(default = "default_program")]
    pub program: String,

    /// Tag given to profiled images
    #[serde(default = "default_image_tag")]
    pub image_tag: String,

    /// Remove dangling images after each build
    #[serde(default = "default_true")]
    pub prune_after_build: bool,
}

fn default_program() -> String {
    "docker".to_string()
}

fn default_image_tag() -> String {
    DEFAULT_IMAGE_TAG.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            image_tag: default_image_tag(),
            prune_after_build: true,
        }
    }
}

/// Build history configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Builds kept for comparison
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// Filesystem watch configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Watch the build context for external changes
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Drop events under hidden directories (`.git`, `.idea`, ...)
    #[serde(default = "default_true")]
    pub ignore_hidden: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ignore_hidden: true,
        }
    }
}

/// Dependency resolution configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Depth bound of directory expansion
    #[serde(default = "default_max_walk_depth")]
    pub max_walk_depth: usize,
}

fn default_max_walk_depth() -> usize {
    DEFAULT_MAX_WALK_DEPTH
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_walk_depth: default_max_walk_depth(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LayerprofConfig {
    /// Default configuration file location
    pub fn default_path() -> PathBuf {
        fs_utils::get_config_base_dir().join("config.toml")
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| LayerprofError::Config {
            message: format!("Failed to parse {}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> Result<()> {
        if self.history.capacity == 0 {
            return Err(LayerprofError::Config {
                message: "history.capacity must be at least 1".to_string(),
            });
        }
        if self.engine.image_tag.trim().is_empty() {
            return Err(LayerprofError::Config {
                message: "engine.image_tag must not be empty".to_string(),
            });
        }
        if !(self.view.scale.is_finite() && self.view.scale > 0.0) {
            return Err(LayerprofError::Config {
                message: format!("view.scale must be positive, got {}", self.view.scale),
            });
        }
        Ok(())
    }
}
