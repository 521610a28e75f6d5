//! Typed paths into a batch root.
//!
//! Every operation receives the root explicitly; nothing relies on the
//! process working directory.
use regex::Regex;
use std::path::{Path, PathBuf};

/// Files every target directory must carry before a job may run.
#[derive(Debug, Clone)]
pub struct DirectoryLayout {
    pub run_file_name: String,
    pub standard_file_name: String,
    /// At least one file name in the directory must match this pattern.
    pub data_file_pattern: Regex,
}

/// Convenience wrapper for locating target directories and their files.
#[derive(Debug, Clone)]
pub struct BatchPaths {
    root: PathBuf,
    layout: DirectoryLayout,
}

impl BatchPaths {
    pub fn new(root: PathBuf, layout: DirectoryLayout) -> Self {
        Self { root, layout }
    }

    /// Return the root directory holding every target directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> &DirectoryLayout {
        &self.layout
    }

    /// Return `<root>/<directory>`.
    pub fn target_dir(&self, directory: &str) -> PathBuf {
        self.root.join(directory)
    }
}
