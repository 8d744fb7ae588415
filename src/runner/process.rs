//! Running predictor scripts as child processes.

use super::{ScriptOutput, ScriptRunner};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Runs scripts with an interpreter inside a working directory.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    interpreter: String,
    interpreter_args: Vec<String>,
    work_dir: PathBuf,
}

impl ProcessRunner {
    pub fn new(
        interpreter: impl Into<String>,
        interpreter_args: Vec<String>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            interpreter_args,
            work_dir: work_dir.into(),
        }
    }
}

impl ScriptRunner for ProcessRunner {
    async fn run_to_completion(&self, script: &Path, stdin: Option<&[u8]>) -> Result<ScriptOutput> {
        debug!(
            "Spawning {} {:?} {} in {}",
            self.interpreter,
            self.interpreter_args,
            script.display(),
            self.work_dir.display()
        );

        let mut child = Command::new(&self.interpreter)
            .args(&self.interpreter_args)
            .arg(script)
            .current_dir(&self.work_dir)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!(
                    "Failed to start '{}' for {}",
                    self.interpreter,
                    script.display()
                )
            })?;

        // Feed stdin while collecting output so neither pipe can fill up and stall.
        let pipe = child.stdin.take();
        let feed = async move {
            if let (Some(payload), Some(mut pipe)) = (stdin, pipe) {
                if let Err(e) = pipe.write_all(payload).await {
                    debug!("stdin of {} closed early: {}", script.display(), e);
                }
            }
        };

        let ((), output) = tokio::join!(feed, child.wait_with_output());
        let output =
            output.with_context(|| format!("Failed to wait for {}", script.display()))?;

        Ok(ScriptOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        })
    }
}
