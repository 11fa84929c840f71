//! Error types and exit codes for layerprof

use std::process::ExitCode;
use thiserror::Error;

/// Main error type for layerprof operations
#[derive(Error, Debug)]
pub enum LayerprofError {
    #[error("Source file not found: {path}")]
    SourceNotFound { path: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Build engine error: {message}")]
    Engine { message: String },

    /// The engine ran and exited non-zero. `log` is the raw stderr it produced.
    #[error("Build failed:\n{log}")]
    BuildFailed { log: String },

    #[error("Watcher error: {message}")]
    Watch { message: String },

    #[error("Serialization failed: {message}")]
    Serialization { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LayerprofError {
    /// Convert error to an exit code:
    /// - 0: Success
    /// - 1: Source not found / IO error
    /// - 2: Configuration error
    /// - 3: Engine could not be run
    /// - 4: Build failed
    /// - 5: Watcher error
    /// - 6: Serialization error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::SourceNotFound { .. } => ExitCode::from(1),
            Self::Io(_) => ExitCode::from(1),
            Self::Config { .. } => ExitCode::from(2),
            Self::Engine { .. } => ExitCode::from(3),
            Self::BuildFailed { .. } => ExitCode::from(4),
            Self::Watch { .. } => ExitCode::from(5),
            Self::Serialization { .. } => ExitCode::from(6),
        }
    }
}

impl From<serde_json::Error> for LayerprofError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

/// Result type alias for layerprof operations
pub type Result<T> = std::result::Result<T, LayerprofError>;
