//! Run-file resolution into job descriptors.
//!
//! A run file lists one job input per line, bracketed by a header and a footer
//! line that are not jobs.
use crate::error::RunFileError;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One unit of work handed to the Run collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDescriptor {
    pub input_path: PathBuf,
    pub working_directory: PathBuf,
}

/// Resolve `run_file_name` inside `directory` into absolute job input paths.
///
/// `Ok(vec![])` means the run file holds no jobs (fewer than three lines).
pub fn resolve_jobs(run_file_name: &str, directory: &Path) -> Result<Vec<PathBuf>, RunFileError> {
    let run_file = directory.join(run_file_name);
    let read_err = |source: std::io::Error| match source.kind() {
        ErrorKind::NotFound => RunFileError::Missing {
            path: run_file.clone(),
        },
        _ => RunFileError::Read {
            path: run_file.clone(),
            source,
        },
    };
    let base = directory.canonicalize().map_err(read_err)?;
    let text = fs::read_to_string(&run_file).map_err(read_err)?;
    let entries: Vec<PathBuf> = text.lines().map(|line| base.join(line.trim())).collect();
    if entries.len() < 2 {
        return Ok(Vec::new());
    }
    Ok(entries[1..entries.len() - 1].to_vec())
}

/// Pair resolved inputs with the directory they run in.
pub fn job_descriptors(inputs: Vec<PathBuf>, working_directory: &Path) -> Vec<JobDescriptor> {
    inputs
        .into_iter()
        .map(|input_path| JobDescriptor {
            input_path,
            working_directory: working_directory.to_path_buf(),
        })
        .collect()
}
