//! `parse` command over saved engine captures

use crate::common::*;
use layerprof::cli::{OutputFormat, ParseArgs};
use layerprof::commands::{run_parse, CommandContext};

fn captures(ctx: &TestContext, build: &FakeBuild) -> ParseArgs {
    ctx.add_file("history.txt", &build.listing)
        .add_file("build.log", &build.progress_log);
    ParseArgs {
        dockerfile: ctx.dockerfile_path(),
        history: ctx.join("history.txt"),
        log: ctx.join("build.log"),
        context: None,
    }
}

fn json_ctx() -> CommandContext {
    CommandContext {
        format: OutputFormat::Json,
        ..Default::default()
    }
}

#[test]
fn test_parse_captures() {
    let ctx = TestContext::new();
    ctx.dockerfile("FROM alpine\nWORKDIR /app\nRUN make\n");
    let build = FakeBuild::success(
        &["FROM alpine", "WORKDIR /app", "RUN make"],
        &[7000, 0, 300],
        &[Step::Done("0.00"), Step::Done("0.03"), Step::Done("12.40")],
    );

    let output = run_parse(&captures(&ctx, &build), &json_ctx()).unwrap();
    let json = assert_valid_json(&output, "parse");

    let sizes: Vec<u64> = json["layers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["size"].as_u64().unwrap())
        .collect();
    assert_eq!(sizes, vec![7000, 0, 300]);
    assert_eq!(json["view"]["records"][2]["duration"], "12.4s");
    assert_eq!(json["view"]["aggregate"]["converted_size"], "7.3KB");
    assert!(json.get("mismatch").is_none());
}

#[test]
fn test_parse_reports_alignment_mismatch() {
    let ctx = TestContext::new();
    ctx.dockerfile("FROM alpine\nRUN make\n");
    let mut build = FakeBuild::success(
        &["FROM alpine", "RUN make"],
        &[7000, 300],
        &[Step::Done("0.00"), Step::Done("1.00")],
    );
    // A log from a build with a different step count
    build.progress_log = "#4 [2/5] RUN make\n#4 DONE 1.00s\n".to_string();

    let args = captures(&ctx, &build);
    let json = assert_valid_json(&run_parse(&args, &json_ctx()).unwrap(), "parse");
    assert_eq!(json["mismatch"]["blocks"], 1);
    assert_eq!(json["mismatch"]["layers"], 2);

    let text = run_parse(&args, &CommandContext::default()).unwrap();
    assert!(text.contains("1 progress steps for 2 layers"));
}

#[test]
fn test_parse_resolves_context_when_given() {
    let ctx = TestContext::new();
    ctx.dockerfile("FROM alpine\nCOPY conf /etc/app\n")
        .add_file("conf/app.toml", "port = 80\n");
    let build = FakeBuild::success(
        &["FROM alpine", "COPY conf /etc/app"],
        &[7000, 12],
        &[Step::Done("0.00"), Step::Cached],
    );

    let mut args = captures(&ctx, &build);
    let json = assert_valid_json(&run_parse(&args, &json_ctx()).unwrap(), "parse");
    assert!(json["layers"][1]["dependencies"].as_array().unwrap().is_empty());

    args.context = Some(ctx.path().to_path_buf());
    let json = assert_valid_json(&run_parse(&args, &json_ctx()).unwrap(), "parse");
    assert_eq!(json["layers"][1]["dependencies"].as_array().unwrap().len(), 2);
}
