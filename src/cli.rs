//! CLI argument definitions using clap with subcommand architecture

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Dockerfile layer profiler with live build-cache invalidation tracking
#[derive(Parser, Debug)]
#[command(name = "layerprof")]
#[command(about = "Profile Dockerfile layers and track which ones a rebuild would invalidate")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (applies to all commands)
    #[arg(short, long, default_value = "text", value_enum, global = true)]
    pub format: OutputFormat,

    /// Show verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, value_name = "PATH", global = true, env = "LAYERPROF_CONFIG")]
    pub config: Option<PathBuf>,
}

// ============================================
// Main Commands Enum
// ============================================

/// Available subcommands for layerprof
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the image once and report per-layer size and duration
    #[command(visible_alias = "b")]
    Build(BuildArgs),

    /// Build, then track cache invalidation live (JSON lines on stdout)
    #[command(visible_alias = "w")]
    Watch(WatchArgs),

    /// Print the instruction groups of a Dockerfile
    Segment(SegmentArgs),

    /// Parse saved engine output without running a build
    Parse(ParseArgs),
}

// ============================================
// Build Subcommand
// ============================================

/// Arguments for the build command
#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Dockerfile to build
    #[arg(value_name = "DOCKERFILE", default_value = "Dockerfile")]
    pub dockerfile: PathBuf,

    /// Build context directory (defaults to the Dockerfile's directory)
    #[arg(short, long, value_name = "DIR")]
    pub context: Option<PathBuf>,

    /// Comment stored with this build
    #[arg(short = 'm', long, default_value = "")]
    pub comment: String,
}

impl BuildArgs {
    /// Context directory, falling back to the Dockerfile's directory
    pub fn context_dir(&self) -> PathBuf {
        context_or_parent(self.context.as_ref(), &self.dockerfile)
    }
}

// ============================================
// Watch Subcommand
// ============================================

/// Arguments for the watch command
#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Dockerfile to build and track
    #[arg(value_name = "DOCKERFILE", default_value = "Dockerfile")]
    pub dockerfile: PathBuf,

    /// Build context directory (defaults to the Dockerfile's directory)
    #[arg(short, long, value_name = "DIR")]
    pub context: Option<PathBuf>,

    /// Comment stored with the initial build
    #[arg(short = 'm', long, default_value = "")]
    pub comment: String,

    /// Do not build on startup; wait for a build command
    #[arg(long)]
    pub no_initial_build: bool,

    /// Do not watch the build context (editor events only)
    #[arg(long)]
    pub no_watch: bool,
}

impl WatchArgs {
    pub fn context_dir(&self) -> PathBuf {
        context_or_parent(self.context.as_ref(), &self.dockerfile)
    }
}

// ============================================
// Segment Subcommand
// ============================================

/// Arguments for the segment command
#[derive(Args, Debug, Clone)]
pub struct SegmentArgs {
    /// Dockerfile to segment
    #[arg(value_name = "DOCKERFILE", default_value = "Dockerfile")]
    pub dockerfile: PathBuf,
}

// ============================================
// Parse Subcommand
// ============================================

/// Arguments for the parse command
#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    /// Dockerfile the captures were built from
    #[arg(value_name = "DOCKERFILE")]
    pub dockerfile: PathBuf,

    /// Saved `docker history --human=false` output
    #[arg(long, value_name = "FILE")]
    pub history: PathBuf,

    /// Saved `docker build --progress=plain` stderr
    #[arg(long, value_name = "FILE")]
    pub log: PathBuf,

    /// Resolve COPY/ADD dependencies against this context directory
    #[arg(short, long, value_name = "DIR")]
    pub context: Option<PathBuf>,
}

// ============================================
// Output Format
// ============================================

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default for terminal)
    #[default]
    #[value(alias = "pretty")]
    Text,
    /// JSON - standard JSON output for machine parsing
    Json,
}

fn context_or_parent(context: Option<&PathBuf>, dockerfile: &std::path::Path) -> PathBuf {
    match context {
        Some(dir) => dir.clone(),
        None => match dockerfile.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    }
}
