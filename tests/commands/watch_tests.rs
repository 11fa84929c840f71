//! `watch` loop driven by scripted stdin commands

use std::io::Cursor;
use std::sync::Arc;

use crate::common::*;
use layerprof::cli::WatchArgs;
use layerprof::commands::watch::run_watch_with;
use layerprof::commands::CommandContext;
use layerprof::EventEmitter;

fn args(ctx: &TestContext, no_initial_build: bool) -> WatchArgs {
    WatchArgs {
        dockerfile: ctx.dockerfile_path(),
        context: None,
        comment: "initial".to_string(),
        no_initial_build,
        no_watch: true,
    }
}

fn engine() -> Arc<FakeEngine> {
    let engine = Arc::new(FakeEngine::new());
    engine.script(FakeBuild::success(
        &["FROM base", "RUN a"],
        &[100, 20],
        &[Step::Done("0.00"), Step::Done("1.00")],
    ));
    engine
}

#[test]
fn test_initial_build_then_eof_shutdown() {
    let ctx = TestContext::new();
    ctx.dockerfile("FROM base\nRUN a\n");
    let (emitter, events) = EventEmitter::capturing();

    let output = run_watch_with(
        engine(),
        &args(&ctx, false),
        &CommandContext::default(),
        emitter,
        Cursor::new(String::new()),
    )
    .unwrap();

    assert!(output.is_empty());
    assert_eq!(events.of_type("build_started")[0]["comment"], "initial");
    assert_eq!(events.of_type("layers_rendered").len(), 1);
}

#[test]
fn test_build_command_from_stdin() {
    let ctx = TestContext::new();
    ctx.dockerfile("FROM base\nRUN a\n");
    let (emitter, events) = EventEmitter::capturing();
    let input = "not a command\n{\"command\":\"build\",\"comment\":\"from editor\"}\n";

    run_watch_with(
        engine(),
        &args(&ctx, true),
        &CommandContext::default(),
        emitter,
        Cursor::new(input.to_string()),
    )
    .unwrap();

    let started = events.of_type("build_started");
    assert_eq!(started.len(), 1);
    assert_eq!(started[0]["comment"], "from editor");
    let rendered = events.of_type("layers_rendered");
    assert_eq!(rendered[0]["comments"], serde_json::json!(["from editor"]));
}

#[test]
fn test_no_build_without_request() {
    let ctx = TestContext::new();
    ctx.dockerfile("FROM base\nRUN a\n");
    let (emitter, events) = EventEmitter::capturing();
    let engine = engine();

    run_watch_with(
        engine.clone(),
        &args(&ctx, true),
        &CommandContext::default(),
        emitter,
        Cursor::new("{\"command\":\"shutdown\"}\n".to_string()),
    )
    .unwrap();

    assert!(engine.requests().is_empty());
    assert!(events.events().is_empty());
}
