//! Watch command handler
//!
//! Runs a session event loop until stdin closes or a `shutdown` command
//! arrives. Three producers feed the loop:
//! - BuildContextWatcher: filesystem changes under the build context
//! - the command reader: editor JSON lines on stdin
//! - build threads: progress lines and results
//!
//! View events go to stdout as JSON lines; logs go to stderr.

use std::io::{self, BufRead, BufReader};
use std::sync::mpsc;
use std::sync::Arc;

use crate::cli::WatchArgs;
use crate::commands::CommandContext;
use crate::engine::{BuildEngine, DockerCli};
use crate::error::Result;
use crate::events::EventEmitter;
use crate::session::{spawn_command_reader, Session, SessionEvent};
use crate::watcher::BuildContextWatcher;

/// Run the watch command against the configured `docker` executable
pub fn run_watch(args: &WatchArgs, ctx: &CommandContext) -> Result<String> {
    let engine = Arc::new(DockerCli::new(ctx.config.engine.program.clone()));
    run_watch_with(
        engine,
        args,
        ctx,
        EventEmitter::new(true),
        BufReader::new(io::stdin()),
    )
}

/// Run the watch loop with any engine, event sink and command input
pub fn run_watch_with<R>(
    engine: Arc<dyn BuildEngine>,
    args: &WatchArgs,
    ctx: &CommandContext,
    emitter: EventEmitter,
    input: R,
) -> Result<String>
where
    R: BufRead + Send + 'static,
{
    let mut session = Session::new(
        engine,
        ctx.config.clone(),
        &args.dockerfile,
        &args.context_dir(),
        emitter,
    )?;

    let (tx, rx) = mpsc::channel();

    if !args.no_initial_build {
        // Queued ahead of any editor command
        let _ = tx.send(SessionEvent::BuildRequested {
            comment: args.comment.clone(),
        });
    }

    let _watcher_handle = if ctx.config.watch.enabled && !args.no_watch {
        let watcher = BuildContextWatcher::new(
            session.request().context.clone(),
            ctx.config.watch.clone(),
        );
        Some(watcher.start(tx.clone())?)
    } else {
        tracing::info!("Build context watching disabled");
        None
    };

    spawn_command_reader(input, tx.clone());

    session.run(tx, rx);
    Ok(String::new())
}
