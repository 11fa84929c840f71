//! Common test utilities and fixtures for layerprof integration tests
//!
//! This module provides:
//! - `TestContext` builder for build contexts with a Dockerfile and files
//! - `FakeEngine`, a scripted `BuildEngine` that never touches Docker
//! - Assertions for view events and command output

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod fake_engine;
pub mod test_context;

pub use assertions::*;
pub use fake_engine::{FakeBuild, FakeEngine, Step};
pub use test_context::{edit, TestContext};
