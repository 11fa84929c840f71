//! Build engine adapter
//!
//! The session only needs three things from a container build engine: run a
//! build while streaming its progress log, print the inspection listing of
//! the built image, and clean up dangling images. `DockerCli` does this with
//! subprocess calls to the `docker` CLI.

use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::{LayerprofError, Result};

/// Default image tag used for profiling builds
pub const DEFAULT_IMAGE_TAG: &str = "layerprof-image";

/// What to build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Build description file
    pub source: PathBuf,
    /// Build context directory
    pub context: PathBuf,
    /// Tag given to the built image
    pub tag: String,
}

/// How a build subprocess ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Exit status code, if the process exited normally
    pub exit_code: Option<i32>,
    /// Full stderr (progress log)
    pub log: String,
}

impl BuildOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// The progress log on success, `BuildFailed` with the raw log otherwise
    pub fn into_log(self) -> Result<String> {
        if self.success() {
            Ok(self.log)
        } else {
            Err(LayerprofError::BuildFailed { log: self.log })
        }
    }
}

/// A container build engine
pub trait BuildEngine: Send + Sync {
    /// Run a build, passing every stderr line to `on_line` as it arrives
    fn build(&self, request: &BuildRequest, on_line: &mut dyn FnMut(&str)) -> Result<BuildOutcome>;

    /// Inspection listing of an image, newest layer first
    fn history(&self, tag: &str) -> Result<String>;

    /// Remove dangling images; failures are only logged
    fn prune(&self);
}

/// `docker` CLI adapter
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCli {
    /// Use `program` as the docker executable
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments of the build invocation
    pub fn build_args(request: &BuildRequest) -> Vec<String> {
        vec![
            "build".to_string(),
            "--progress=plain".to_string(),
            "-t".to_string(),
            request.tag.clone(),
            "-f".to_string(),
            request.source.to_string_lossy().into_owned(),
            request.context.to_string_lossy().into_owned(),
        ]
    }

    fn command(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| LayerprofError::Engine {
                message: format!("Failed to execute {}: {}", self.program, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LayerprofError::Engine {
                message: format!("{} {} failed: {}", self.program, args.join(" "), stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Pass every line of `reader` to `on_line` without its line terminator
///
/// Invalid UTF-8 is replaced with U+FFFD; build steps may print arbitrary bytes.
pub fn for_each_line_lossy<R: BufRead>(mut reader: R, on_line: &mut dyn FnMut(&str)) -> io::Result<()> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&buf);
        let text: &str = &text;
        let line = text.strip_suffix('\n').unwrap_or(text);
        on_line(line.strip_suffix('\r').unwrap_or(line));
    }
}

impl BuildEngine for DockerCli {
    fn build(&self, request: &BuildRequest, on_line: &mut dyn FnMut(&str)) -> Result<BuildOutcome> {
        let args = Self::build_args(request);
        tracing::info!("Running {} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| LayerprofError::Engine {
                message: format!("Failed to execute {}: {}", self.program, e),
            })?;

        let mut log = String::new();
        let read = match child.stderr.take() {
            Some(stderr) => for_each_line_lossy(BufReader::new(stderr), &mut |line| {
                on_line(line);
                log.push_str(line);
                log.push('\n');
            }),
            None => Ok(()),
        };

        // Reap the child even when its output could not be read
        let status = child.wait()?;
        read.map_err(|e| LayerprofError::Engine {
            message: format!("Failed to read build output: {}", e),
        })?;
        tracing::info!("Build exited with {}", status);
        Ok(BuildOutcome {
            exit_code: status.code(),
            log,
        })
    }

    fn history(&self, tag: &str) -> Result<String> {
        self.command(&["history", "--human=false", tag])
    }

    fn prune(&self) {
        if let Err(e) = self.command(&["image", "prune", "-f"]) {
            tracing::warn!("Image prune failed: {}", e);
        }
    }
}
