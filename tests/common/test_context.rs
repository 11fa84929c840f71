//! TestContext builder for build-context fixtures

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use layerprof::events::CapturedEvents;
use layerprof::{EventEmitter, LayerprofConfig, Session, SessionEvent};

use super::FakeEngine;

/// Temporary build context holding a Dockerfile and the files it copies
pub struct TestContext {
    dir: TempDir,
    root: PathBuf,
}

impl TestContext {
    /// Create a new empty build context
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        // The session canonicalizes the context; events must use the same form
        let root = dir.path().canonicalize().expect("Failed to canonicalize temp dir");
        Self { dir, root }
    }

    /// Canonical context root
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a context-relative entry
    pub fn join(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn dockerfile_path(&self) -> PathBuf {
        self.join("Dockerfile")
    }

    /// Write the Dockerfile
    pub fn dockerfile(&self, text: &str) -> &Self {
        self.add_file("Dockerfile", text)
    }

    /// Add a file with the given content, creating parent directories
    pub fn add_file(&self, relative_path: &str, content: &str) -> &Self {
        let full_path = self.join(relative_path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&full_path, content).expect("Failed to write file");
        self
    }

    pub fn remove_file(&self, relative_path: &str) -> &Self {
        fs::remove_file(self.join(relative_path)).expect("Failed to remove file");
        self
    }

    pub fn remove_dir(&self, relative_path: &str) -> &Self {
        fs::remove_dir_all(self.join(relative_path)).expect("Failed to remove dir");
        self
    }

    /// Session over this context with the default config
    pub fn session(&self, engine: Arc<FakeEngine>) -> (Session, CapturedEvents) {
        self.session_with_config(engine, LayerprofConfig::default())
    }

    pub fn session_with_config(
        &self,
        engine: Arc<FakeEngine>,
        config: LayerprofConfig,
    ) -> (Session, CapturedEvents) {
        let (emitter, events) = EventEmitter::capturing();
        let session = Session::new(engine, config, &self.dockerfile_path(), self.path(), emitter)
            .expect("Failed to create session");
        (session, events)
    }
}

/// Editor edit of lines `start..=end` producing `full_text`
pub fn edit(start_line: usize, end_line: usize, inserted: &str, full_text: &str) -> SessionEvent {
    SessionEvent::SourceEdited {
        start_line,
        end_line,
        text: inserted.to_string(),
        full_text: full_text.to_string(),
    }
}
