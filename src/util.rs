use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

/// Split a collaborator command line and resolve its program on `PATH`.
pub fn resolve_command(command: &str) -> Result<(PathBuf, Vec<String>)> {
    let mut argv =
        shell_words::split(command).with_context(|| format!("parse command: {command}"))?;
    if argv.is_empty() {
        return Err(anyhow!("command is empty"));
    }
    let program = argv.remove(0);
    let resolved =
        which::which(&program).with_context(|| format!("locate program {program:?}"))?;
    Ok((resolved, argv))
}

pub fn display_path(path: &Path, base: Option<&Path>) -> String {
    if let Some(base) = base {
        if let Ok(relative) = path.strip_prefix(base) {
            return relative.display().to_string();
        }
    }
    path.display().to_string()
}

pub fn truncate_string(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut truncated = String::new();
    for ch in text.chars() {
        if truncated.len() + ch.len_utf8() > max_bytes {
            break;
        }
        truncated.push(ch);
    }
    truncated
}
