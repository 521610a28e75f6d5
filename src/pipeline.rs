//! Discovery, validation, materialization and dispatch of one batch.
//!
//! Stages advance `Idle → Discovering → Validating → (Materializing) →
//! Dispatching → Done`. A missing root or a bad manifest ends in `Aborted`
//! before any directory is touched; so does a refusal at the confirmation gate.
use crate::confirm::{Confirm, PROCEED_QUESTION};
use crate::dispatch::{dispatch, DispatchMode, JobRunner};
use crate::error::{PipelineError, RunFileError};
use crate::jobs::{job_descriptors, resolve_jobs, JobDescriptor};
use crate::manifest::{parse_manifest, DirectoryManifest};
use crate::materialize::{maybe_generate, Converter, Materialized};
use crate::paths::BatchPaths;
use crate::validate::{root_exists, validate_targets, Requirement, Validation};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Pipeline position, recorded in the batch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Discovering,
    Validating,
    Materializing,
    Dispatching,
    Done,
    Aborted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Discovering => "discovering",
            Stage::Validating => "validating",
            Stage::Materializing => "materializing",
            Stage::Dispatching => "dispatching",
            Stage::Done => "done",
            Stage::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Resolved inputs for one batch.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub manifest: PathBuf,
    pub separator: char,
    pub paths: BatchPaths,
    pub dispatch: DispatchMode,
    pub workers: Option<usize>,
    pub strict: bool,
}

/// External collaborators the pipeline drives.
pub struct Collaborators<'a> {
    pub runner: &'a dyn JobRunner,
    pub converter: &'a dyn Converter,
    pub confirm: &'a mut dyn Confirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    Completed,
    Cancelled,
}

/// First gap found by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationGap {
    pub directory: String,
    pub missing: Requirement,
}

/// Dispatch result for one target directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryReport {
    pub directory: String,
    pub jobs: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_file_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub stages: Vec<Stage>,
    pub targets: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_gap: Option<ValidationGap>,
    pub materialized: Materialized,
    pub directories: Vec<DirectoryReport>,
    pub outcome: BatchOutcome,
}

/// Jobs resolved for one target directory.
#[derive(Debug)]
pub struct DirectoryPlan {
    pub directory: String,
    pub jobs: Result<Vec<JobDescriptor>, RunFileError>,
}

struct StageTracker {
    stages: Vec<Stage>,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            stages: vec![Stage::Idle],
        }
    }

    fn enter(&mut self, stage: Stage) {
        tracing::info!(stage = %stage, "batch stage");
        self.stages.push(stage);
    }
}

/// Check the root and parse the manifest, in that order.
///
/// The root is checked first so a missing root aborts before the manifest is
/// even opened.
pub fn discover(
    manifest: &Path,
    separator: char,
    paths: &BatchPaths,
) -> Result<DirectoryManifest, PipelineError> {
    if !root_exists(paths.root()) {
        return Err(PipelineError::RootNotFound {
            path: paths.root().to_path_buf(),
        });
    }
    Ok(parse_manifest(manifest, separator)?)
}

/// Resolve every target's run file into job descriptors, in manifest order.
pub fn plan_jobs(manifest: &DirectoryManifest, paths: &BatchPaths) -> Vec<DirectoryPlan> {
    manifest
        .targets()
        .iter()
        .map(|target| DirectoryPlan {
            directory: target.directory_name.clone(),
            jobs: directory_jobs(&target.directory_name, paths),
        })
        .collect()
}

fn directory_jobs(
    directory: &str,
    paths: &BatchPaths,
) -> Result<Vec<JobDescriptor>, RunFileError> {
    let dir = paths.target_dir(directory);
    let inputs = resolve_jobs(&paths.layout().run_file_name, &dir)?;
    let working_directory = dir.canonicalize().unwrap_or(dir);
    Ok(job_descriptors(inputs, &working_directory))
}

/// Run one batch end to end.
pub fn run_batch(
    settings: &BatchSettings,
    collaborators: Collaborators<'_>,
) -> Result<BatchReport, PipelineError> {
    let mut tracker = StageTracker::new();
    let result = execute(settings, collaborators, &mut tracker);
    if let Err(err) = &result {
        tracker.enter(Stage::Aborted);
        tracing::error!(error = %err, "batch aborted");
    }
    result
}

fn execute(
    settings: &BatchSettings,
    collaborators: Collaborators<'_>,
    tracker: &mut StageTracker,
) -> Result<BatchReport, PipelineError> {
    let Collaborators {
        runner,
        converter,
        confirm,
    } = collaborators;
    let paths = &settings.paths;

    tracker.enter(Stage::Discovering);
    let manifest = discover(&settings.manifest, settings.separator, paths)?;
    let directories = manifest.directories();

    tracker.enter(Stage::Validating);
    let validation = validate_targets(&directories, paths);
    let validation_gap = match &validation {
        Validation::Complete => None,
        Validation::Incomplete { directory, missing } => Some(ValidationGap {
            directory: directory.clone(),
            missing: *missing,
        }),
    };

    let mut materialized = Materialized::Skipped;
    if !validation.is_complete() {
        tracker.enter(Stage::Materializing);
        materialized =
            maybe_generate(&validation, &manifest, paths.root(), converter);
        if settings.strict {
            tracker.enter(Stage::Validating);
            if let Validation::Incomplete { directory, missing } =
                validate_targets(&directories, paths)
            {
                return Err(PipelineError::StillIncomplete {
                    directory,
                    reason: format!("missing {missing}"),
                });
            }
        }
    }

    let mut report = BatchReport {
        stages: Vec::new(),
        targets: manifest.len(),
        validation_gap,
        materialized,
        directories: Vec::new(),
        outcome: BatchOutcome::Completed,
    };

    let proceed = confirm
        .confirm(PROCEED_QUESTION)
        .map_err(PipelineError::Confirmation)?;
    if !proceed {
        tracing::info!("dispatch declined at confirmation");
        tracker.enter(Stage::Aborted);
        report.outcome = BatchOutcome::Cancelled;
        report.stages = tracker.stages.clone();
        return Ok(report);
    }

    tracker.enter(Stage::Dispatching);
    for plan in plan_jobs(&manifest, paths) {
        let directory_report = match plan.jobs {
            Ok(jobs) => {
                let count = jobs.len();
                let summary =
                    dispatch(settings.dispatch, jobs, runner, settings.workers);
                tracing::info!(
                    directory = %plan.directory,
                    jobs = count,
                    failed = summary.failed,
                    "directory dispatched"
                );
                DirectoryReport {
                    directory: plan.directory,
                    jobs: count,
                    failed: summary.failed,
                    run_file_error: None,
                }
            }
            Err(err) => {
                tracing::warn!(directory = %plan.directory, error = %err, "skipping directory");
                DirectoryReport {
                    directory: plan.directory,
                    jobs: 0,
                    failed: 0,
                    run_file_error: Some(err.to_string()),
                }
            }
        };
        report.directories.push(directory_report);
    }

    tracker.enter(Stage::Done);
    report.stages = tracker.stages.clone();
    Ok(report)
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
