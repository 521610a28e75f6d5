//! Shared test infrastructure for integration tests.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Run collaborator that appends each input to `<workdir>/dispatched.log`.
pub const RECORDING_RUN_CMD: &str = r#"sh -c 'printf "%s\n" "$1" >> "$2/dispatched.log"' sh"#;

/// Convert collaborator that saves the request it receives under the root.
pub const RECORDING_CONVERT_CMD: &str = "sh -c 'cat > convert-request.json'";

/// A scratch batch: a working directory holding a manifest and a `Meteors`
/// root.
pub struct BatchFixture {
    pub dir: TempDir,
}

impl BatchFixture {
    pub fn create() -> Self {
        let dir = TempDir::new().expect("tempdir");
        fs::create_dir_all(dir.path().join("Meteors")).expect("create root");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("Meteors")
    }

    pub fn write_manifest(&self, text: &str) {
        fs::write(self.path().join("meteors.txt"), text).expect("write manifest");
    }

    /// Create a target carrying every required file and a run file listing
    /// `jobs` between a header and a footer line.
    pub fn write_complete_target(&self, name: &str, jobs: &[&str]) {
        let dir = self.root().join(name);
        fs::create_dir_all(&dir).expect("create target");
        fs::write(dir.join("observation.xls"), b"").expect("write data file");
        fs::write(dir.join("standard.txt"), b"").expect("write standard file");
        let mut run_file = String::from("# header\n");
        for job in jobs {
            run_file.push_str(job);
            run_file.push('\n');
        }
        run_file.push_str("# footer\n");
        fs::write(dir.join("filesRun.txt"), run_file).expect("write run file");
    }

    pub fn dispatched(&self, name: &str) -> Vec<String> {
        let log = self.root().join(name).join("dispatched.log");
        fs::read_to_string(log)
            .unwrap_or_default()
            .lines()
            .map(|line| {
                Path::new(line)
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or_default()
                    .to_string()
            })
            .collect()
    }

    /// Run `mbatch` inside the fixture directory with `stdin` piped in.
    pub fn run(&self, args: &[&str], stdin: &str) -> Output {
        let mut child = Command::new(env!("CARGO_BIN_EXE_mbatch"))
            .args(args)
            .current_dir(self.path())
            .env_remove("MBATCH_RUN_COMMAND")
            .env_remove("MBATCH_CONVERT_COMMAND")
            .env_remove("RUST_LOG")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn mbatch");
        if let Some(mut input) = child.stdin.take() {
            input.write_all(stdin.as_bytes()).expect("write stdin");
        }
        child.wait_with_output().expect("wait for mbatch")
    }
}

/// Check if `sh` is available; skip test if not.
pub fn skip_without_sh() -> bool {
    let missing = which::which("sh").is_err();
    if missing {
        eprintln!("Skipping: sh not available");
    }
    missing
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
