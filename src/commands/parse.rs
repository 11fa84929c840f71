//! Parse command handler - turn saved engine output into a layer report
//!
//! Useful for inspecting captures from CI without running a build.

use crate::cli::ParseArgs;
use crate::commands::{CommandContext, LayerReport};
use crate::deps::DependencyResolver;
use crate::error::{LayerprofError, Result};
use crate::fs_utils::{canonical_dir, read_lossy};
use crate::instruction::segment;
use crate::parser::BuildLogParser;
use crate::view::LayerView;

pub fn run_parse(args: &ParseArgs, ctx: &CommandContext) -> Result<String> {
    if !args.dockerfile.is_file() {
        return Err(LayerprofError::SourceNotFound {
            path: args.dockerfile.display().to_string(),
        });
    }
    let source = read_lossy(&args.dockerfile)?;
    let listing = read_lossy(&args.history)?;
    let progress_log = read_lossy(&args.log)?;

    let groups = segment(&source);
    let mut report = BuildLogParser::new().parse(&groups, &listing, &progress_log);

    if let Some(context) = &args.context {
        DependencyResolver::new(canonical_dir(context)?)
            .with_max_depth(ctx.config.resolver.max_walk_depth)
            .resolve(&mut report.layers)?;
    }

    tracing::debug!(
        "Parsed {} layers, base boundary at listing row {}",
        report.layers.len(),
        report.base_boundary
    );

    let view = LayerView::build(&ctx.config.view, &source, &report.layers);
    LayerReport {
        layers: &report.layers,
        view: &view,
        mismatch: report.mismatch,
    }
    .render(ctx)
}
