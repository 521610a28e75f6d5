//! Typed failures for the discovery-validation-dispatch pipeline.
//!
//! Fatal errors (`ManifestError`, `PipelineError::RootNotFound`) stop a batch
//! before any directory work. Run-file failures are recovered by the caller.
use std::path::PathBuf;

/// Manifest could not be turned into a complete set of job targets.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest {path} not found")]
    Missing { path: PathBuf },
    #[error("read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("manifest {path} is empty")]
    Empty { path: PathBuf },
    #[error("manifest line {line}: expected 3 fields separated by {separator:?}, found {found}")]
    FieldCount {
        line: usize,
        separator: char,
        found: usize,
    },
    #[error("manifest line {line}: option code {value:?} is not an integer")]
    InvalidOption { line: usize, value: String },
}

/// Per-directory run file could not be read.
#[derive(Debug, thiserror::Error)]
pub enum RunFileError {
    #[error("run file {path} not found")]
    Missing { path: PathBuf },
    #[error("read run file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Batch-level failures that abort the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("root directory {path} does not exist or is not a directory")]
    RootNotFound { path: PathBuf },
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("directory {directory} still incomplete after materialization: {reason}")]
    StillIncomplete { directory: String, reason: String },
    #[error("confirmation failed: {0}")]
    Confirmation(#[source] std::io::Error),
}
