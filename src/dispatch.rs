//! Job dispatch.
//!
//! Jobs run either one after another or on a bounded pool of worker threads,
//! each of which hands its job to the Run collaborator. Every job is contained:
//! a failure (or panic) is logged and counted, and the remaining jobs still run.
use crate::jobs::JobDescriptor;
use crate::util::{resolve_command, truncate_string};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

const MAX_STDERR_EXCERPT_BYTES: usize = 2048;

/// External trajectory computation, invoked once per job.
///
/// Implementations report their own outcome; the dispatcher only logs it.
pub trait JobRunner: Sync {
    fn run(&self, job: &JobDescriptor) -> Result<()>;
}

/// Runs each job as a child process: `<command...> <input> <working_dir>`.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandRunner {
    pub fn from_command_line(command: &str) -> Result<Self> {
        let (program, args) = resolve_command(command).context("resolve run command")?;
        Ok(Self { program, args })
    }
}

impl JobRunner for CommandRunner {
    fn run(&self, job: &JobDescriptor) -> Result<()> {
        let start = Instant::now();
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&job.input_path)
            .arg(&job.working_directory)
            .current_dir(&job.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("spawn run command {}", self.program.display()))?;
        let elapsed_ms = start.elapsed().as_millis();

        tracing::debug!(
            elapsed_ms,
            input = %job.input_path.display(),
            status = %output.status,
            "run command complete"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "run command failed with status {}: {}",
                output.status,
                truncate_string(stderr.trim(), MAX_STDERR_EXCERPT_BYTES)
            ));
        }
        Ok(())
    }
}

/// How a directory's jobs are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    #[default]
    Sequential,
    Parallel,
}

/// Counts for one dispatch call. Job output is owned by the Run collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub attempted: usize,
    pub failed: usize,
}

/// Dispatch `jobs` with the chosen strategy.
pub fn dispatch(
    mode: DispatchMode,
    jobs: Vec<JobDescriptor>,
    runner: &dyn JobRunner,
    workers: Option<usize>,
) -> DispatchSummary {
    match mode {
        DispatchMode::Sequential => run_sequential(&jobs, runner),
        DispatchMode::Parallel => {
            let workers = worker_count(workers, jobs.len());
            run_parallel(jobs, runner, workers)
        }
    }
}

/// Run jobs in list order; a failed job never stops the ones after it.
pub fn run_sequential(jobs: &[JobDescriptor], runner: &dyn JobRunner) -> DispatchSummary {
    let mut summary = DispatchSummary::default();
    for job in jobs {
        summary.attempted += 1;
        if !run_contained(runner, job) {
            summary.failed += 1;
        }
    }
    summary
}

/// Run jobs on `workers` threads and return once every job has finished.
///
/// Jobs are moved into a shared queue so each descriptor is owned by exactly
/// one worker. Completion order is unspecified.
pub fn run_parallel(
    jobs: Vec<JobDescriptor>,
    runner: &dyn JobRunner,
    workers: usize,
) -> DispatchSummary {
    if jobs.is_empty() {
        return DispatchSummary::default();
    }
    let attempted = jobs.len();
    let workers = workers.clamp(1, attempted);
    let queue = Mutex::new(VecDeque::from(jobs));
    let failed = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let job = {
                    let mut guard = match queue.lock() {
                        Ok(guard) => guard,
                        Err(_) => return,
                    };
                    guard.pop_front()
                };
                let Some(job) = job else {
                    break;
                };
                if !run_contained(runner, &job) {
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });

    DispatchSummary {
        attempted,
        failed: failed.into_inner(),
    }
}

/// Resolve the pool size: an explicit cap, else host parallelism, never more
/// workers than jobs and never fewer than one.
pub fn worker_count(configured: Option<usize>, jobs: usize) -> usize {
    let available = configured.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });
    available.min(jobs).max(1)
}

fn run_contained(runner: &dyn JobRunner, job: &JobDescriptor) -> bool {
    match catch_unwind(AssertUnwindSafe(|| runner.run(job))) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            tracing::warn!(input = %job.input_path.display(), error = %format!("{err:#}"), "job failed");
            false
        }
        Err(_) => {
            tracing::warn!(input = %job.input_path.display(), "job panicked");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn job(name: &str) -> JobDescriptor {
        JobDescriptor {
            input_path: PathBuf::from(format!("/m/{name}")),
            working_directory: PathBuf::from("/m"),
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
        panic_on: Option<&'static str>,
    }

    impl Recorder {
        fn seen(&self) -> Vec<String> {
            self.seen.lock().expect("lock").clone()
        }
    }

    impl JobRunner for Recorder {
        fn run(&self, job: &JobDescriptor) -> Result<()> {
            let name = job
                .input_path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default()
                .to_string();
            self.seen.lock().expect("lock").push(name.clone());
            if self.panic_on == Some(name.as_str()) {
                panic!("solver crashed on {name}");
            }
            if self.fail_on == Some(name.as_str()) {
                return Err(anyhow!("solver failed on {name}"));
            }
            Ok(())
        }
    }

    #[test]
    fn sequential_keeps_order_and_contains_failures() {
        let runner = Recorder {
            fail_on: Some("J2"),
            ..Default::default()
        };
        let summary = run_sequential(&[job("J1"), job("J2"), job("J3")], &runner);
        assert_eq!(runner.seen(), vec!["J1", "J2", "J3"]);
        assert_eq!(
            summary,
            DispatchSummary {
                attempted: 3,
                failed: 1
            }
        );
    }

    #[test]
    fn sequential_contains_panics() {
        let runner = Recorder {
            panic_on: Some("J1"),
            ..Default::default()
        };
        let summary = run_sequential(&[job("J1"), job("J2")], &runner);
        assert_eq!(runner.seen(), vec!["J1", "J2"]);
        assert_eq!(summary.failed, 1);
    }

    struct Slow {
        finished: AtomicUsize,
        concurrent: AtomicUsize,
        overlapped: AtomicBool,
    }

    impl JobRunner for Slow {
        fn run(&self, _job: &JobDescriptor) -> Result<()> {
            if self.concurrent.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_millis(20));
            self.concurrent.fetch_sub(1, Ordering::SeqCst);
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn parallel_returns_only_after_every_job_finished() {
        let runner = Slow {
            finished: AtomicUsize::new(0),
            concurrent: AtomicUsize::new(0),
            overlapped: AtomicBool::new(false),
        };
        let jobs: Vec<_> = (0..8).map(|idx| job(&format!("J{idx}"))).collect();
        let summary = run_parallel(jobs, &runner, 4);
        assert_eq!(runner.finished.load(Ordering::SeqCst), 8);
        assert_eq!(summary.attempted, 8);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn single_worker_pool_never_overlaps_jobs() {
        let runner = Slow {
            finished: AtomicUsize::new(0),
            concurrent: AtomicUsize::new(0),
            overlapped: AtomicBool::new(false),
        };
        let jobs: Vec<_> = (0..3).map(|idx| job(&format!("J{idx}"))).collect();
        run_parallel(jobs, &runner, 1);
        assert!(!runner.overlapped.load(Ordering::SeqCst));
        assert_eq!(runner.finished.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn parallel_runs_every_job_despite_failures() {
        let runner = Recorder {
            fail_on: Some("J1"),
            panic_on: Some("J3"),
            ..Default::default()
        };
        let jobs: Vec<_> = (0..5).map(|idx| job(&format!("J{idx}"))).collect();
        let summary = run_parallel(jobs, &runner, 3);
        let mut seen = runner.seen();
        seen.sort();
        assert_eq!(seen, vec!["J0", "J1", "J2", "J3", "J4"]);
        assert_eq!(summary.failed, 2);
    }

    #[test]
    fn empty_job_list_dispatches_nothing() {
        let runner = Recorder::default();
        let summary = dispatch(DispatchMode::Parallel, Vec::new(), &runner, None);
        assert_eq!(summary, DispatchSummary::default());
        assert!(runner.seen().is_empty());
    }

    #[test]
    fn worker_count_is_bounded_by_jobs_and_cap() {
        assert_eq!(worker_count(Some(8), 3), 3);
        assert_eq!(worker_count(Some(2), 10), 2);
        assert_eq!(worker_count(Some(4), 0), 1);
        assert!(worker_count(None, 1000) >= 1);
    }

    #[cfg(unix)]
    #[test]
    fn command_runner_appends_input_and_working_directory() {
        if which::which("sh").is_err() {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = CommandRunner::from_command_line(r#"sh -c 'printf "%s" "$1" > "$2/seen.txt"' sh"#)
            .expect("runner");
        let job = JobDescriptor {
            input_path: dir.path().join("run_a.txt"),
            working_directory: dir.path().to_path_buf(),
        };
        runner.run(&job).expect("run job");
        let seen = std::fs::read_to_string(dir.path().join("seen.txt")).expect("read marker");
        assert_eq!(Path::new(&seen), job.input_path);

        let failing = CommandRunner::from_command_line("sh -c 'echo boom >&2; exit 4'")
            .expect("runner");
        let err = failing.run(&job).unwrap_err();
        assert!(format!("{err}").contains("boom"));
    }
}
