//! Batch configuration helpers.
//!
//! This module loads, validates, and writes the JSON config that names the
//! manifest, the root directory layout, and the external collaborators.
use crate::dispatch::DispatchMode;
use crate::paths::DirectoryLayout;
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current schema version for the batch config.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;
/// Config picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "mbatch.json";
/// Fallback for the Run collaborator command line.
pub const RUN_COMMAND_ENV: &str = "MBATCH_RUN_COMMAND";
/// Fallback for the Convert collaborator command line.
pub const CONVERT_COMMAND_ENV: &str = "MBATCH_CONVERT_COMMAND";

/// Pack-independent batch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    pub schema_version: u32,
    pub manifest: PathBuf,
    pub separator: char,
    pub root: PathBuf,
    pub run_file_name: String,
    pub standard_file_name: String,
    pub data_file_pattern: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convert_command: Option<String>,
    pub dispatch: DispatchMode,
    /// Pool cap for parallel dispatch; unset means host parallelism.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// Re-validate after artifact generation and abort if still incomplete.
    pub strict: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            manifest: PathBuf::from("meteors.txt"),
            separator: ';',
            root: PathBuf::from("Meteors"),
            run_file_name: "filesRun.txt".to_string(),
            standard_file_name: "standard.txt".to_string(),
            data_file_pattern: r"(?i)\.xls$".to_string(),
            run_command: None,
            convert_command: None,
            dispatch: DispatchMode::Sequential,
            workers: None,
            strict: false,
        }
    }
}

impl BatchConfig {
    /// Build the directory layout, compiling the data file pattern.
    pub fn layout(&self) -> Result<DirectoryLayout> {
        let data_file_pattern = Regex::new(&self.data_file_pattern)
            .with_context(|| format!("compile data_file_pattern {:?}", self.data_file_pattern))?;
        Ok(DirectoryLayout {
            run_file_name: self.run_file_name.clone(),
            standard_file_name: self.standard_file_name.clone(),
            data_file_pattern,
        })
    }
}

/// Load a config from an explicit path.
pub fn load_config(path: &Path) -> Result<BatchConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: BatchConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    Ok(config)
}

/// Load `explicit`, else `./mbatch.json` when present, else the defaults.
pub fn load_config_or_default(explicit: Option<&Path>) -> Result<BatchConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    let implicit = Path::new(DEFAULT_CONFIG_FILE);
    if implicit.is_file() {
        tracing::debug!(path = %implicit.display(), "using config from working directory");
        return load_config(implicit);
    }
    Ok(BatchConfig::default())
}

/// Persist a config to disk in a stable JSON format.
pub fn write_config(path: &Path, config: &BatchConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("create config dir")?;
    }
    let text = serde_json::to_string_pretty(config).context("serialize batch config")?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Validate schema version and user-provided values.
pub fn validate_config(config: &BatchConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    validate_file_name(&config.run_file_name, "run_file_name")?;
    validate_file_name(&config.standard_file_name, "standard_file_name")?;
    if config.separator == '/' || config.separator == ':' {
        return Err(anyhow!(
            "separator {:?} collides with date/time delimiters",
            config.separator
        ));
    }
    if config.workers == Some(0) {
        return Err(anyhow!("workers must be at least 1"));
    }
    config.layout()?;
    Ok(())
}

/// Pick a collaborator command: CLI flag, then config, then environment.
pub fn resolve_command_setting(
    cli: Option<&str>,
    config: Option<&str>,
    env_var: &str,
) -> Option<String> {
    cli.or(config)
        .map(str::to_string)
        .or_else(|| std::env::var(env_var).ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn validate_file_name(name: &str, label: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(anyhow!("{label} must be non-empty"));
    }
    let path = Path::new(name);
    if path.components().count() != 1 || path.is_absolute() || name == ".." || name == "." {
        return Err(anyhow!(
            "{label} must be a plain file name without separators (got {name:?})"
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
