//! Target directory validation.
//!
//! A batch is valid only when every target directory exists and lists a data
//! file, the run file and the standard file. Batch validation stops at the
//! first gap because artifact generation covers the whole batch anyway;
//! `directory_status` gives the full per-directory picture for reporting.
use crate::paths::{BatchPaths, DirectoryLayout};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;

/// Requirements checked for each target directory, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Directory,
    DataFile,
    RunFile,
    StandardFile,
}

impl Requirement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Requirement::Directory => "directory",
            Requirement::DataFile => "data_file",
            Requirement::RunFile => "run_file",
            Requirement::StandardFile => "standard_file",
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of validating a whole batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Complete,
    /// The first gap found; later directories were not inspected.
    Incomplete {
        directory: String,
        missing: Requirement,
    },
}

impl Validation {
    pub fn is_complete(&self) -> bool {
        matches!(self, Validation::Complete)
    }
}

/// Full requirement picture for one target directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryStatus {
    pub directory: String,
    pub exists: bool,
    pub data_files: Vec<String>,
    pub run_file: bool,
    pub standard_file: bool,
}

impl DirectoryStatus {
    /// Requirements not met, in evaluation order.
    pub fn missing(&self) -> Vec<Requirement> {
        if !self.exists {
            return vec![Requirement::Directory];
        }
        let mut missing = Vec::new();
        if self.data_files.is_empty() {
            missing.push(Requirement::DataFile);
        }
        if !self.run_file {
            missing.push(Requirement::RunFile);
        }
        if !self.standard_file {
            missing.push(Requirement::StandardFile);
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

/// Precondition for any per-target work: the root must be a directory.
pub fn root_exists(root: &Path) -> bool {
    root.is_dir()
}

/// Validate targets in order, stopping at the first missing requirement.
pub fn validate_targets<S: AsRef<str>>(targets: &[S], paths: &BatchPaths) -> Validation {
    for target in targets {
        let status = directory_status(target.as_ref(), paths);
        if let Some(missing) = status.missing().first().copied() {
            tracing::info!(
                directory = %status.directory,
                missing = %missing,
                "target directory incomplete"
            );
            return Validation::Incomplete {
                directory: status.directory,
                missing,
            };
        }
    }
    Validation::Complete
}

/// Inspect one target directory without stopping at the first gap.
pub fn directory_status(directory: &str, paths: &BatchPaths) -> DirectoryStatus {
    let dir = paths.target_dir(directory);
    if !dir.is_dir() {
        return DirectoryStatus {
            directory: directory.to_string(),
            exists: false,
            data_files: Vec::new(),
            run_file: false,
            standard_file: false,
        };
    }
    let listing = list_names(&dir);
    if let Err(err) = &listing {
        tracing::warn!(directory = %dir.display(), error = %err, "cannot list target directory");
    }
    listed_status(directory, listing, paths.layout())
}

/// Status of a directory known to exist. An unreadable listing leaves every
/// file requirement unmet.
fn listed_status(
    directory: &str,
    listing: std::io::Result<Vec<String>>,
    layout: &DirectoryLayout,
) -> DirectoryStatus {
    let mut status = DirectoryStatus {
        directory: directory.to_string(),
        exists: true,
        data_files: Vec::new(),
        run_file: false,
        standard_file: false,
    };
    let Ok(names) = listing else {
        return status;
    };
    status.data_files = names
        .iter()
        .filter(|name| layout.data_file_pattern.is_match(name))
        .cloned()
        .collect();
    status.data_files.sort();
    status.run_file = names.iter().any(|name| name == &layout.run_file_name);
    status.standard_file = names.iter().any(|name| name == &layout.standard_file_name);
    status
}

fn list_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}
