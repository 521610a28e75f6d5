//! Command entry points.
//!
//! Each command loads the config, applies flag overrides, and hands the
//! resolved settings to the pipeline. Results go to stdout; diagnostics go
//! through tracing.
use crate::cli::{BatchArgs, CheckArgs, Command, InitArgs, PlanArgs, RunArgs};
use crate::config::{
    load_config_or_default, resolve_command_setting, validate_config, write_config, BatchConfig,
    CONVERT_COMMAND_ENV, RUN_COMMAND_ENV,
};
use crate::confirm::{AssumeYes, Confirm, Prompt};
use crate::dispatch::{CommandRunner, DispatchMode};
use crate::jobs::JobDescriptor;
use crate::materialize::{CommandConverter, ConvertRequest, Converter, Materialized};
use crate::paths::BatchPaths;
use crate::pipeline::{
    discover, plan_jobs, run_batch, BatchOutcome, BatchReport, BatchSettings, Collaborators,
};
use crate::util::display_path;
use crate::validate::{directory_status, DirectoryStatus, Requirement};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::process::ExitCode;

/// Exit status for a refusal at the confirmation gate.
pub const EXIT_CANCELLED: u8 = 3;

/// How a command finished, mapped onto the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    Incomplete,
    Cancelled,
}

impl CommandStatus {
    pub fn exit_code(self) -> ExitCode {
        match self {
            CommandStatus::Success => ExitCode::SUCCESS,
            CommandStatus::Incomplete => ExitCode::FAILURE,
            CommandStatus::Cancelled => ExitCode::from(EXIT_CANCELLED),
        }
    }
}

pub fn run_command(command: Command) -> Result<CommandStatus> {
    match command {
        Command::Init(args) => run_init(&args),
        Command::Check(args) => run_check(&args),
        Command::Plan(args) => run_plan(&args),
        Command::Run(args) => run_run(&args),
    }
}

/// Validated config plus the paths derived from it.
struct BatchContext {
    config: BatchConfig,
    paths: BatchPaths,
}

impl BatchContext {
    fn new(config: BatchConfig) -> Result<Self> {
        validate_config(&config)?;
        let paths = BatchPaths::new(config.root.clone(), config.layout()?);
        Ok(Self { config, paths })
    }

    fn settings(&self) -> BatchSettings {
        BatchSettings {
            manifest: self.config.manifest.clone(),
            separator: self.config.separator,
            paths: self.paths.clone(),
            dispatch: self.config.dispatch,
            workers: self.config.workers,
            strict: self.config.strict,
        }
    }
}

fn load_batch_config(args: &BatchArgs) -> Result<BatchConfig> {
    let mut config = load_config_or_default(args.config.as_deref())?;
    if let Some(manifest) = &args.manifest {
        config.manifest = manifest.clone();
    }
    if let Some(separator) = args.separator {
        config.separator = separator;
    }
    if let Some(root) = &args.root {
        config.root = root.clone();
    }
    Ok(config)
}

pub fn run_init(args: &InitArgs) -> Result<CommandStatus> {
    if args.config.is_file() && !args.force {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            args.config.display()
        ));
    }
    write_config(&args.config, &BatchConfig::default())?;
    println!("wrote {}", args.config.display());
    Ok(CommandStatus::Success)
}

#[derive(Serialize)]
struct CheckEntry {
    #[serde(flatten)]
    status: DirectoryStatus,
    missing: Vec<Requirement>,
}

pub fn run_check(args: &CheckArgs) -> Result<CommandStatus> {
    let ctx = BatchContext::new(load_batch_config(&args.batch)?)?;
    let manifest = discover(&ctx.config.manifest, ctx.config.separator, &ctx.paths)?;
    let entries: Vec<CheckEntry> = manifest
        .targets()
        .iter()
        .map(|target| {
            let status = directory_status(&target.directory_name, &ctx.paths);
            let missing = status.missing();
            CheckEntry { status, missing }
        })
        .collect();

    if args.json {
        let text = serde_json::to_string_pretty(&entries).context("serialize check report")?;
        println!("{text}");
    } else {
        for entry in &entries {
            if entry.missing.is_empty() {
                println!(
                    "{}: ready ({} data files)",
                    entry.status.directory,
                    entry.status.data_files.len()
                );
            } else {
                let missing: Vec<&str> = entry.missing.iter().map(Requirement::as_str).collect();
                println!(
                    "{}: missing {}",
                    entry.status.directory,
                    missing.join(", ")
                );
            }
        }
    }

    if entries.iter().all(|entry| entry.status.is_complete()) {
        Ok(CommandStatus::Success)
    } else {
        Ok(CommandStatus::Incomplete)
    }
}

#[derive(Serialize)]
struct PlanEntry {
    directory: String,
    jobs: Vec<JobDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run_plan(args: &PlanArgs) -> Result<CommandStatus> {
    let ctx = BatchContext::new(load_batch_config(&args.batch)?)?;
    let manifest = discover(&ctx.config.manifest, ctx.config.separator, &ctx.paths)?;
    let entries: Vec<PlanEntry> = plan_jobs(&manifest, &ctx.paths)
        .into_iter()
        .map(|plan| match plan.jobs {
            Ok(jobs) => PlanEntry {
                directory: plan.directory,
                jobs,
                error: None,
            },
            Err(err) => PlanEntry {
                directory: plan.directory,
                jobs: Vec::new(),
                error: Some(err.to_string()),
            },
        })
        .collect();

    if args.json {
        let text = serde_json::to_string_pretty(&entries).context("serialize job plan")?;
        println!("{text}");
        return Ok(CommandStatus::Success);
    }

    let root = ctx.paths.root().canonicalize().ok();
    for entry in &entries {
        match &entry.error {
            Some(error) => println!("{}: {error}", entry.directory),
            None => {
                println!("{}: {} jobs", entry.directory, entry.jobs.len());
                for job in &entry.jobs {
                    println!("  {}", display_path(&job.input_path, root.as_deref()));
                }
            }
        }
    }
    Ok(CommandStatus::Success)
}

/// Stands in for the converter when no command is configured.
struct UnconfiguredConverter;

impl Converter for UnconfiguredConverter {
    fn convert(&self, _request: &ConvertRequest) -> Result<()> {
        Err(anyhow!(
            "no convert command configured (pass --convert-cmd, set convert_command, or export {CONVERT_COMMAND_ENV})"
        ))
    }
}

pub fn run_run(args: &RunArgs) -> Result<CommandStatus> {
    let mut config = load_batch_config(&args.batch)?;
    if args.parallel {
        config.dispatch = DispatchMode::Parallel;
    }
    if let Some(workers) = args.workers {
        config.workers = Some(usize::from(workers));
    }
    if args.strict {
        config.strict = true;
    }
    let ctx = BatchContext::new(config)?;

    let run_command = resolve_command_setting(
        args.run_cmd.as_deref(),
        ctx.config.run_command.as_deref(),
        RUN_COMMAND_ENV,
    )
    .ok_or_else(|| {
        anyhow!(
            "no run command configured (pass --run-cmd, set run_command, or export {RUN_COMMAND_ENV})"
        )
    })?;
    let runner = CommandRunner::from_command_line(&run_command)?;
    let converter: Box<dyn Converter> = match resolve_command_setting(
        args.convert_cmd.as_deref(),
        ctx.config.convert_command.as_deref(),
        CONVERT_COMMAND_ENV,
    ) {
        Some(command) => Box::new(CommandConverter::from_command_line(&command)?),
        None => Box::new(UnconfiguredConverter),
    };
    let mut confirm: Box<dyn Confirm> = if args.yes {
        Box::new(AssumeYes)
    } else {
        Box::new(Prompt::stdio())
    };

    let report = run_batch(
        &ctx.settings(),
        Collaborators {
            runner: &runner,
            converter: converter.as_ref(),
            confirm: confirm.as_mut(),
        },
    )?;

    if let Some(path) = &args.report {
        write_report(path, &report)?;
    }
    print_summary(&report);

    match report.outcome {
        BatchOutcome::Completed => Ok(CommandStatus::Success),
        BatchOutcome::Cancelled => {
            println!("Process closed. To proceed with the integration, just restart the program.");
            Ok(CommandStatus::Cancelled)
        }
    }
}

fn print_summary(report: &BatchReport) {
    for line in summary_lines(report) {
        println!("{line}");
    }
}

fn summary_lines(report: &BatchReport) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(gap) = &report.validation_gap {
        let generation = match report.materialized {
            Materialized::Generated => "generated inputs from XML sources",
            Materialized::Failed => "input generation failed, continuing",
            Materialized::Skipped => "input generation skipped",
        };
        lines.push(format!("{}: missing {}; {generation}", gap.directory, gap.missing));
    }
    for directory in &report.directories {
        lines.push(match &directory.run_file_error {
            Some(error) => format!("{}: skipped ({error})", directory.directory),
            None => format!(
                "{}: {} jobs dispatched, {} failed",
                directory.directory, directory.jobs, directory.failed
            ),
        });
    }
    lines
}

/// Write the batch report snapshot.
fn write_report(path: &Path, report: &BatchReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("create report dir")?;
    }
    let text = serde_json::to_string_pretty(report).context("serialize batch report")?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
