//! Build lifecycle through the session: rendering, diffs and history

use std::fs;
use std::sync::mpsc;
use std::sync::Arc;

use crate::common::*;
use layerprof::{LayerprofConfig, LayerprofError, SessionEvent, SourceDocument};

const SCENARIO: &str = "FROM base\nRUN a\nCOPY f /x\n";
const INSTRUCTIONS: [&str; 3] = ["FROM base", "RUN a", "COPY f /x"];

fn scenario() -> TestContext {
    let ctx = TestContext::new();
    ctx.dockerfile(SCENARIO).add_file("f", "hello");
    ctx
}

fn build(sizes: [u64; 3], run_secs: &'static str) -> FakeBuild {
    FakeBuild::success(
        &INSTRUCTIONS,
        &sizes,
        &[Step::Done("0.00"), Step::Done(run_secs), Step::Cached],
    )
}

#[test]
fn test_scenario_sizes_and_source_edit() {
    let ctx = scenario();
    let engine = Arc::new(FakeEngine::new());
    engine.script(build([100, 20, 5], "2.00"));
    let (mut session, events) = ctx.session(engine.clone());

    session.build_blocking("").unwrap();

    assert_eq!(view_sizes(&session), vec!["100B", "20B", "5B"]);
    let view = session.view().unwrap();
    assert_eq!(view.aggregate.converted_size, "125B");
    assert_eq!(view.records[1].duration, "2s");
    assert_eq!(view.records[2].duration, "CACHED");
    assert_flags(&session, &[false, false, false]);

    let (tx, _rx) = mpsc::channel();
    session.handle(edit(1, 1, "b", "FROM base\nRUN ab\nCOPY f /x\n"), &tx);

    assert_eq!(session.tracker().boundary().source_boundary, 1);
    assert_flags(&session, &[false, true, true]);
    assert_view_in_sync(&session);

    let changed = events.of_type("invalidation_changed");
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0]["changed"], serde_json::json!([1, 2]));
    assert_eq!(changed[0]["source_boundary"], 1);

    // Undoing the edit restores every flag
    session.handle(edit(1, 1, "", SCENARIO), &tx);
    assert_flags(&session, &[false, false, false]);
}

#[test]
fn test_progress_lines_are_streamed() {
    let ctx = scenario();
    let engine = Arc::new(FakeEngine::new());
    engine.script(build([100, 20, 5], "2.00"));
    let (mut session, events) = ctx.session(engine);

    session.build_blocking("first").unwrap();

    let started = events.of_type("build_started");
    assert_eq!(started.len(), 1);
    assert_eq!(started[0]["comment"], "first");

    let output = events.of_type("build_output");
    assert!(output.iter().any(|e| e["text"] == "#3 [2/3] RUN a"));
    assert_eq!(events.of_type("layers_rendered").len(), 1);
}

#[test]
fn test_second_build_carries_diff() {
    let ctx = scenario();
    let engine = Arc::new(FakeEngine::new());
    engine
        .script(build([100, 20, 5], "2.00"))
        .script(build([100, 50, 5], "3.50"));
    let (mut session, events) = ctx.session(engine);

    session.build_blocking("first").unwrap();
    let view = session.view().unwrap();
    assert!(view.records.iter().all(|r| r.size_diff_bar.is_none()));
    assert_eq!(view.records[0].size_bar.info, "New Layer");
    assert_eq!(view.aggregate.size_bar.info, "New Image");

    session.build_blocking("second").unwrap();
    let view = session.view().unwrap();
    assert_eq!(view.records[0].size_bar.info, "±0B");
    assert_eq!(view.records[1].size_bar.info, "+30B");
    assert_eq!(view.records[1].duration_bar.info, "+1.5s");
    assert_eq!(view.aggregate.size_bar.info, "+30B");

    let bar = view.records[1].size_diff_bar.as_ref().unwrap();
    assert_eq!(bar.color, "darkred");
    assert!(bar.width > 0.0);

    let rendered = events.of_type("layers_rendered");
    assert_eq!(rendered.len(), 2);
    assert_eq!(rendered[1]["comments"], serde_json::json!(["first", "second"]));
    assert_eq!(rendered[1]["prior_count"], 1);
}

#[test]
fn test_history_selection_by_recency() {
    let ctx = scenario();
    let engine = Arc::new(FakeEngine::new());
    engine
        .script(build([100, 20, 5], "2.00"))
        .script(build([100, 50, 5], "2.00"))
        .script(build([100, 10, 5], "2.00"));
    let (mut session, events) = ctx.session(engine);

    for comment in ["a", "b", "c"] {
        session.build_blocking(comment).unwrap();
    }

    let (tx, _rx) = mpsc::channel();
    session.handle(SessionEvent::HistorySelected { index: 0 }, &tx);
    let record = &session.view().unwrap().records[1];
    assert_eq!(record.size_bar.info, "-40B");
    assert_eq!(record.size_diff_bar.as_ref().unwrap().color, "darkgreen");

    session.handle(SessionEvent::HistorySelected { index: 1 }, &tx);
    assert_eq!(session.view().unwrap().records[1].size_bar.info, "-10B");

    let updates = events.of_type("diff_updated");
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[1]["recency"], 1);
    assert_eq!(updates[1]["records"][1]["size_bar"]["info"], "-10B");
}

#[test]
fn test_history_capacity_evicts_oldest() {
    let ctx = scenario();
    let engine = Arc::new(FakeEngine::new());
    for _ in 0..3 {
        engine.script(build([100, 20, 5], "2.00"));
    }
    let mut config = LayerprofConfig::default();
    config.history.capacity = 2;
    let (mut session, events) = ctx.session_with_config(engine, config);

    for comment in ["a", "b", "c"] {
        session.build_blocking(comment).unwrap();
    }

    assert_eq!(session.history().len(), 2);
    assert_eq!(session.history().comments(), vec!["b", "c"]);
    let rendered = events.of_type("layers_rendered");
    assert_eq!(rendered[2]["comments"], serde_json::json!(["b", "c"]));
    assert_eq!(rendered[2]["prior_count"], 1);
}

#[test]
fn test_failed_build_then_recovery() {
    let ctx = scenario();
    let engine = Arc::new(FakeEngine::new());
    engine
        .script(FakeBuild::failure("ERROR: failed to solve: base: not found\n"))
        .script(build([100, 20, 5], "2.00"));
    let (mut session, events) = ctx.session(engine);

    let err = session.build_blocking("").unwrap_err();
    assert!(matches!(err, LayerprofError::BuildFailed { .. }));
    assert!(!session.tracker().is_armed());
    assert!(session.view().is_none());
    assert!(session.history().is_empty());

    let failed = events.of_type("build_failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["log"], "ERROR: failed to solve: base: not found\n");

    // Edits are dropped until a build succeeds
    let (tx, _rx) = mpsc::channel();
    session.handle(edit(1, 1, "b", "FROM base\nRUN ab\nCOPY f /x\n"), &tx);
    assert!(events.of_type("invalidation_changed").is_empty());

    session.build_blocking("").unwrap();
    assert!(session.tracker().is_armed());
    assert_flags(&session, &[false, false, false]);
}

#[test]
fn test_engine_request_and_prune() {
    let ctx = scenario();
    let engine = Arc::new(FakeEngine::new());
    engine
        .script(build([100, 20, 5], "2.00"))
        .script(build([100, 20, 5], "2.00"));

    let mut config = LayerprofConfig::default();
    config.engine.image_tag = "profiled".to_string();
    let (mut session, _events) = ctx.session_with_config(engine.clone(), config.clone());
    session.build_blocking("").unwrap();

    let requests = engine.requests();
    assert_eq!(requests[0].tag, "profiled");
    assert_eq!(requests[0].context, ctx.path());
    assert_eq!(requests[0].source, ctx.dockerfile_path());
    assert_eq!(engine.prune_count(), 1);

    config.engine.prune_after_build = false;
    let (mut session, _events) = ctx.session_with_config(engine.clone(), config);
    session.build_blocking("").unwrap();
    assert_eq!(engine.prune_count(), 1);
}

#[test]
fn test_build_reads_current_dockerfile() {
    let ctx = scenario();
    let engine = Arc::new(FakeEngine::new());
    engine.script(build([100, 20, 5], "2.00")).script(FakeBuild::success(
        &["FROM base", "RUN a", "COPY f /x", "WORKDIR /x"],
        &[100, 20, 5, 0],
        &[Step::Done("0.00"), Step::Cached, Step::Cached, Step::Done("0.05")],
    ));
    let (mut session, _events) = ctx.session(engine);

    session.build_blocking("").unwrap();
    assert_eq!(session.view().unwrap().records.len(), 3);

    fs::write(ctx.dockerfile_path(), "FROM base\nRUN a\nCOPY f /x\nWORKDIR /x\n").unwrap();
    session.build_blocking("").unwrap();

    let view = session.view().unwrap();
    assert_eq!(view.records.len(), 4);
    assert_eq!(view.records[3].instruction.as_str(), "WORKDIR");
    assert_eq!(session.document().text(), "FROM base\nRUN a\nCOPY f /x\nWORKDIR /x\n");
    assert_flags(&session, &[false, false, false, false]);
}

#[test]
fn test_highlight_and_line_tracking() {
    let ctx = scenario();
    let engine = Arc::new(FakeEngine::new());
    engine.script(build([100, 20, 5], "2.00"));
    let (mut session, events) = ctx.session(engine);
    session.build_blocking("").unwrap();

    // Enter at the end of line 0 pushes the later instructions down
    let (tx, _rx) = mpsc::channel();
    session.handle(edit(0, 0, "\n", "FROM base\n\nRUN a\nCOPY f /x\n"), &tx);
    let lines: Vec<usize> = session.view().unwrap().records.iter().map(|r| r.line_num).collect();
    assert_eq!(lines, vec![0, 2, 3]);
    // A blank line does not change any instruction group
    assert_flags(&session, &[false, false, false]);

    session.handle(SessionEvent::ScrollToLine { index: 2 }, &tx);
    session.handle(SessionEvent::Highlight { index: 1 }, &tx);

    assert_eq!(events.of_type("scroll_to_line")[0]["line"], 3);
    let highlight = &events.of_type("highlight")[0];
    assert_eq!(highlight["range"]["start_line"], 2);
    assert_eq!(highlight["range"]["end_line"], 2);
    assert_eq!(highlight["range"]["end_column"], 5);
}
