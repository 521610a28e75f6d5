//! Batch driver for meteor trajectory analyses.
//!
//! Reads a manifest of observation directories, checks each one for the files
//! an analysis needs, generates missing inputs through an external converter,
//! and dispatches one solver run per input listed in each directory's run file.
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod confirm;
mod dispatch;
mod error;
mod jobs;
mod manifest;
mod materialize;
mod paths;
mod pipeline;
mod util;
mod validate;
mod workflow;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let args = cli::RootArgs::parse();
    init_tracing(args.verbose);

    match workflow::run_command(args.command) {
        Ok(status) => status.exit_code(),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
