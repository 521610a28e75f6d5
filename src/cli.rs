//! CLI argument parsing for the batch workflow.
//!
//! Flags override the JSON config; the config overrides built-in defaults.
use crate::config::DEFAULT_CONFIG_FILE;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "mbatch",
    version,
    about = "Validate meteor observation directories and dispatch trajectory analyses",
    after_help = "Commands:\n  init                 Write a default mbatch.json\n  check                Report which target directories are ready\n  plan                 List the jobs each target directory would run\n  run                  Validate, generate missing inputs, confirm, and dispatch\n\nExamples:\n  mbatch init\n  mbatch check --root /data/Meteors --manifest meteors.txt\n  mbatch plan --json\n  mbatch run --run-cmd 'pim-run' --convert-cmd 'pim-convert' --parallel --yes",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Log debug detail to stderr (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level workflow commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Init(InitArgs),
    Check(CheckArgs),
    Plan(PlanArgs),
    Run(RunArgs),
}

/// Inputs shared by every command that reads a manifest.
#[derive(Args, Debug, Clone, Default)]
pub struct BatchArgs {
    /// Batch config JSON (defaults to ./mbatch.json when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Manifest listing one target directory per line
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Field separator used in the manifest
    #[arg(long, value_name = "CHAR")]
    pub separator: Option<char>,

    /// Root directory holding the target directories
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,
}

/// Init command inputs.
#[derive(Parser, Debug)]
#[command(about = "Write a default batch config")]
pub struct InitArgs {
    /// Where to write the config
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,
}

/// Check command inputs.
#[derive(Parser, Debug)]
#[command(about = "Report the requirement status of every target directory")]
pub struct CheckArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Plan command inputs.
#[derive(Parser, Debug)]
#[command(about = "Resolve run files and list the jobs that would be dispatched")]
pub struct PlanArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Run command inputs.
#[derive(Parser, Debug)]
#[command(about = "Validate, generate missing inputs, and dispatch every job")]
pub struct RunArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Command line of the trajectory solver; input and working dir are appended
    #[arg(long, value_name = "CMD")]
    pub run_cmd: Option<String>,

    /// Command line of the XML converter; the batch is written to its stdin
    #[arg(long, value_name = "CMD")]
    pub convert_cmd: Option<String>,

    /// Dispatch each directory's jobs on a worker pool
    #[arg(long)]
    pub parallel: bool,

    /// Worker pool size (defaults to host parallelism)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: Option<u16>,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,

    /// Re-validate after generating inputs and abort if still incomplete
    #[arg(long)]
    pub strict: bool,

    /// Write a JSON batch report
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}
