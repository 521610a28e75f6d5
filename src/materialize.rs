//! Generation of missing companion files.
//!
//! When validation finds a gap, the whole batch is handed to the Convert
//! collaborator, which builds run files, standard files and data files from the
//! raw XML sources. Nothing here checks what the converter produced.
use crate::manifest::{DirectoryManifest, Timestamp};
use crate::util::{resolve_command, truncate_string};
use crate::validate::Validation;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

const MAX_STDERR_EXCERPT_BYTES: usize = 2048;

/// Index-aligned batch description sent to the converter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertRequest {
    pub directories: Vec<String>,
    pub timestamps: Vec<Timestamp>,
    pub options: Vec<i64>,
    pub output_root: PathBuf,
}

impl ConvertRequest {
    pub fn new(manifest: &DirectoryManifest, output_root: &Path) -> Self {
        Self {
            directories: manifest.directories(),
            timestamps: manifest.timestamps(),
            options: manifest.options(),
            output_root: output_root.to_path_buf(),
        }
    }
}

/// External XML-to-input-file converter.
pub trait Converter {
    fn convert(&self, request: &ConvertRequest) -> Result<()>;
}

/// Runs the converter as a child process with the request as JSON on stdin.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandConverter {
    pub fn from_command_line(command: &str) -> Result<Self> {
        let (program, args) = resolve_command(command).context("resolve convert command")?;
        Ok(Self { program, args })
    }
}

impl Converter for CommandConverter {
    fn convert(&self, request: &ConvertRequest) -> Result<()> {
        let payload = serde_json::to_vec(request).context("serialize convert request")?;
        let start = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&request.output_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn convert command {}", self.program.display()))?;

        // stdin is closed before waiting; the child is reaped even if the write failed.
        let written = child
            .stdin
            .take()
            .map(|mut stdin| stdin.write_all(&payload));

        let output = child.wait_with_output().context("wait for convert command")?;
        let elapsed_ms = start.elapsed().as_millis();

        match written {
            Some(Err(err)) if err.kind() == ErrorKind::BrokenPipe => {
                tracing::debug!("convert command closed stdin before reading the whole request");
            }
            Some(Err(err)) => {
                return Err(anyhow!(err).context("write convert request to stdin"));
            }
            _ => {}
        }

        tracing::info!(
            elapsed_ms,
            directories = request.directories.len(),
            "convert command complete"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "convert command failed with status {}: {}",
                output.status,
                truncate_string(stderr.trim(), MAX_STDERR_EXCERPT_BYTES)
            ));
        }
        Ok(())
    }
}

/// Whether the gate handed the batch to the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Materialized {
    Skipped,
    Generated,
    Failed,
}

/// Run the converter when, and only when, validation came back incomplete.
///
/// Converter failures are logged, not propagated: dispatch proceeds either way.
pub fn maybe_generate(
    validation: &Validation,
    manifest: &DirectoryManifest,
    root: &Path,
    converter: &dyn Converter,
) -> Materialized {
    if validation.is_complete() {
        return Materialized::Skipped;
    }
    let request = ConvertRequest::new(manifest, root);
    match converter.convert(&request) {
        Ok(()) => Materialized::Generated,
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "artifact generation failed");
            Materialized::Failed
        }
    }
}
