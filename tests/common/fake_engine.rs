//! Scripted build engine
//!
//! Each `build` call consumes the next scripted `FakeBuild` and replays its
//! progress log line by line. The listing of the last successful build is
//! returned by `history`.

use std::collections::VecDeque;

use parking_lot::Mutex;

use layerprof::engine::{BuildEngine, BuildOutcome, BuildRequest};
use layerprof::{LayerprofError, Result};

/// Outcome reported for one build step
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Done(&'static str),
    Cached,
}

/// Engine output of one scripted build
#[derive(Debug, Clone)]
pub struct FakeBuild {
    pub exit_code: i32,
    pub progress_log: String,
    pub listing: String,
}

impl FakeBuild {
    /// A successful build of `instructions` (base image first)
    ///
    /// `sizes` and `steps` are per layer, oldest first.
    pub fn success(instructions: &[&str], sizes: &[u64], steps: &[Step]) -> Self {
        assert_eq!(instructions.len(), sizes.len());
        assert_eq!(instructions.len(), steps.len());
        let n = instructions.len();

        let mut listing = String::from("IMAGE   CREATED AT   CREATED BY   SIZE   COMMENT\n");
        for i in (1..n).rev() {
            let image = if i == n - 1 { "sha256:top" } else { "<missing>" };
            listing.push_str(&format!(
                "{}   2024-05-01T10:00:00Z   {} # buildkit   {}   buildkit.dockerfile.v0\n",
                image, instructions[i], sizes[i]
            ));
        }
        listing.push_str(&format!(
            "<missing>   2024-04-01T00:00:00Z   /bin/sh -c #(nop) ADD file:base in /   {}   \n",
            sizes[0]
        ));

        let mut progress_log =
            String::from("#1 [internal] load build definition from Dockerfile\n#1 DONE 0.0s\n\n");
        for (i, (instruction, step)) in instructions.iter().zip(steps).enumerate() {
            let id = i + 2;
            progress_log.push_str(&format!("#{} [{}/{}] {}\n", id, i + 1, n, instruction));
            match step {
                Step::Done(secs) => progress_log.push_str(&format!("#{} DONE {}s\n\n", id, secs)),
                Step::Cached => progress_log.push_str(&format!("#{} CACHED\n\n", id)),
            }
        }
        progress_log.push_str(&format!("#{} exporting to image\n#{} DONE 0.1s\n", n + 2, n + 2));

        Self {
            exit_code: 0,
            progress_log,
            listing,
        }
    }

    /// A build the engine rejects
    pub fn failure(stderr: &str) -> Self {
        Self {
            exit_code: 1,
            progress_log: stderr.to_string(),
            listing: String::new(),
        }
    }
}

/// Scripted `BuildEngine`
#[derive(Default)]
pub struct FakeEngine {
    scripted: Mutex<VecDeque<FakeBuild>>,
    last_listing: Mutex<Option<String>>,
    requests: Mutex<Vec<BuildRequest>>,
    prunes: Mutex<usize>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the output of the next build
    pub fn script(&self, build: FakeBuild) -> &Self {
        self.scripted.lock().push_back(build);
        self
    }

    pub fn requests(&self) -> Vec<BuildRequest> {
        self.requests.lock().clone()
    }

    pub fn prune_count(&self) -> usize {
        *self.prunes.lock()
    }
}

impl BuildEngine for FakeEngine {
    fn build(&self, request: &BuildRequest, on_line: &mut dyn FnMut(&str)) -> Result<BuildOutcome> {
        self.requests.lock().push(request.clone());
        let build = self.scripted.lock().pop_front().ok_or_else(|| LayerprofError::Engine {
            message: "no scripted build left".to_string(),
        })?;

        for line in build.progress_log.lines() {
            on_line(line);
        }
        if build.exit_code == 0 {
            *self.last_listing.lock() = Some(build.listing);
        }
        Ok(BuildOutcome {
            exit_code: Some(build.exit_code),
            log: build.progress_log,
        })
    }

    fn history(&self, tag: &str) -> Result<String> {
        self.last_listing.lock().clone().ok_or_else(|| LayerprofError::Engine {
            message: format!("no such image: {}", tag),
        })
    }

    fn prune(&self) {
        *self.prunes.lock() += 1;
    }
}
