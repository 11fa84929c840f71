//! layerprof CLI entry point

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use layerprof::cli::{Cli, Commands};
use layerprof::commands::{run_build, run_parse, run_segment, run_watch, CommandContext};
use layerprof::LayerprofConfig;

fn main() -> ExitCode {
    match run() {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn run() -> layerprof::Result<String> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LayerprofConfig::load_from(path)?,
        None => LayerprofConfig::load()?,
    };
    init_tracing(&config.logging.level, cli.verbose);

    let ctx = CommandContext::from_cli(cli.format, cli.verbose, config);

    match &cli.command {
        Commands::Build(args) => run_build(args, &ctx),
        Commands::Watch(args) => run_watch(args, &ctx),
        Commands::Segment(args) => run_segment(args, &ctx),
        Commands::Parse(args) => run_parse(args, &ctx),
    }
}

/// Log to stderr; stdout carries command output and view events
///
/// `--verbose` forces debug, otherwise `RUST_LOG` wins over the config level.
fn init_tracing(level: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("layerprof=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("layerprof={}", level)))
    };

    // Fails only if a subscriber is already installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
