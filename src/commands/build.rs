//! Build command handler - run one build and report its layers

use std::sync::Arc;

use crate::cli::BuildArgs;
use crate::commands::{CommandContext, LayerReport};
use crate::engine::{BuildEngine, DockerCli};
use crate::error::{LayerprofError, Result};
use crate::events::EventEmitter;
use crate::session::Session;

/// Run the build command against the configured `docker` executable
pub fn run_build(args: &BuildArgs, ctx: &CommandContext) -> Result<String> {
    let engine = Arc::new(DockerCli::new(ctx.config.engine.program.clone()));
    run_build_with(engine, args, ctx)
}

/// Run the build command against any engine
pub fn run_build_with(
    engine: Arc<dyn BuildEngine>,
    args: &BuildArgs,
    ctx: &CommandContext,
) -> Result<String> {
    let mut session = Session::new(
        engine,
        ctx.config.clone(),
        &args.dockerfile,
        &args.context_dir(),
        // Progress goes to the log, not stdout
        EventEmitter::new(false),
    )?;

    session.build_blocking(&args.comment)?;

    let view = session.view().ok_or_else(|| LayerprofError::Engine {
        message: "build finished without a layer view".to_string(),
    })?;
    LayerReport {
        layers: session.layers(),
        view,
        mismatch: session.mismatch(),
    }
    .render(ctx)
}
