//! End-to-end runs of the `layerprof` binary (no Docker required)

use std::process::{Command, Output};

use crate::common::*;

fn run_cli(ctx: &TestContext, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_layerprof"))
        .current_dir(ctx.path())
        .env_remove("RUST_LOG")
        .env_remove("LAYERPROF_CONFIG")
        .args(args)
        .output()
        .expect("Failed to run layerprof")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_segment_json() {
    let ctx = TestContext::new();
    ctx.dockerfile("FROM base\n# comment\nRUN a\nCOPY f /x\n");

    let output = run_cli(&ctx, &["segment", "--format", "json"]);
    assert!(output.status.success());
    let json = assert_valid_json(&stdout(&output), "segment");
    assert_eq!(json[0]["text"], "FROM base");
    assert_eq!(json[1]["text"], "RUN a\n");
    assert_eq!(json[2]["keyword"], "COPY");
}

#[test]
fn test_parse_text() {
    let ctx = TestContext::new();
    ctx.dockerfile("FROM base\nRUN a\n");
    let build = FakeBuild::success(
        &["FROM base", "RUN a"],
        &[100, 20],
        &[Step::Done("0.00"), Step::Done("2.00")],
    );
    ctx.add_file("history.txt", &build.listing)
        .add_file("build.log", &build.progress_log);

    let output = run_cli(&ctx, &["parse", "Dockerfile", "--history", "history.txt", "--log", "build.log"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("LAYERS (2)"));
    assert!(text.contains("120B"));
}

#[test]
fn test_missing_dockerfile_exit_code() {
    let ctx = TestContext::new();
    let output = run_cli(&ctx, &["segment", "Nope.Dockerfile"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Source file not found"));
}

#[test]
fn test_invalid_config_exit_code() {
    let ctx = TestContext::new();
    ctx.dockerfile("FROM base\n").add_file("bad.toml", "[history]\ncapacity = 0\n");

    let output = run_cli(&ctx, &["--config", "bad.toml", "segment"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_missing_engine_exit_code() {
    let ctx = TestContext::new();
    ctx.dockerfile("FROM base\nRUN a\n")
        .add_file("config.toml", "[engine]\nprogram = \"layerprof-missing-engine\"\n");

    let output = run_cli(&ctx, &["--config", "config.toml", "build"]);
    assert_eq!(output.status.code(), Some(3));
}
