//! Predictor execution.
//!
//! Every predictor is run exactly once. Failures are reported but never
//! retried; the vote that follows decides whether the missing output is
//! fatal.

pub mod process;

pub use process::ProcessRunner;

use crate::models::{PredictorMetrics, PredictorOutcome, PredictorSpec, RunStatus};
use anyhow::{bail, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Captured result of one script invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ScriptOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs one script to completion.
pub trait ScriptRunner {
    /// Run `script` once, feeding `stdin` if given, and capture its output.
    ///
    /// `Err` means the script could not be run at all; a script that ran
    /// and failed is reported through `ScriptOutput::exit_code`.
    async fn run_to_completion(&self, script: &Path, stdin: Option<&[u8]>) -> Result<ScriptOutput>;
}

/// Options for a batch of predictor runs.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Payload piped to every script.
    pub stdin: Option<Vec<u8>>,
    /// Scripts in flight at once.
    pub concurrency: usize,
    /// Stop at the first failure.
    pub strict: bool,
    /// Draw a progress bar.
    pub show_progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            stdin: None,
            concurrency: 1,
            strict: false,
            show_progress: false,
        }
    }
}

/// Run every predictor and return the outcomes in predictor order.
///
/// In strict mode the first failed predictor ends the batch with an error;
/// predictors still running are dropped, which kills their processes.
pub async fn run_predictors<R: ScriptRunner>(
    runner: &R,
    specs: &[PredictorSpec],
    options: &RunOptions,
) -> Result<Vec<PredictorOutcome>> {
    let progress = progress_bar(specs.len(), options.show_progress);
    let stdin = options.stdin.as_deref();

    let outcomes = stream::iter(specs)
        .map(|spec| run_one(runner, spec, stdin))
        .buffered(options.concurrency.max(1))
        .inspect(|outcome| {
            progress.set_message(format!("{} done", outcome.script));
            progress.inc(1);
        })
        .map(|outcome| {
            if options.strict && !outcome.succeeded() {
                bail!(
                    "Predictor {} ({}) failed: {}",
                    outcome.index,
                    outcome.script,
                    failure_reason(&outcome)
                );
            }
            Ok(outcome)
        })
        .try_collect::<Vec<_>>()
        .await;

    match outcomes {
        Ok(outcomes) => {
            progress.finish_with_message("All predictors finished");
            Ok(outcomes)
        }
        Err(e) => {
            progress.abandon_with_message("Stopped on failure");
            Err(e)
        }
    }
}

async fn run_one<R: ScriptRunner>(
    runner: &R,
    spec: &PredictorSpec,
    stdin: Option<&[u8]>,
) -> PredictorOutcome {
    info!("Running {}...", spec.script.display());
    let start = Instant::now();
    let result = runner.run_to_completion(&spec.script, stdin).await;
    let duration_seconds = start.elapsed().as_secs_f64();

    let outcome = match result {
        Ok(output) => {
            let status = if output.success() {
                RunStatus::Succeeded
            } else {
                RunStatus::Failed
            };
            let metrics = parse_metrics(&output.stdout);
            if let Some(ref m) = metrics {
                debug!(
                    "{}: model={} accuracy={:.4} time={:.2}s",
                    spec.name(),
                    m.model,
                    m.accuracy,
                    m.time
                );
            }

            PredictorOutcome {
                index: spec.index,
                script: spec.name(),
                status,
                exit_code: output.exit_code,
                duration_seconds,
                metrics,
                stderr: (status != RunStatus::Succeeded).then_some(output.stderr),
            }
        }
        Err(e) => PredictorOutcome {
            index: spec.index,
            script: spec.name(),
            status: RunStatus::SpawnError,
            exit_code: None,
            duration_seconds,
            metrics: None,
            stderr: Some(format!("{:#}", e)),
        },
    };

    if outcome.succeeded() {
        info!("{} finished in {:.1}s", outcome.script, duration_seconds);
    } else {
        warn!(
            "{} failed: {}",
            outcome.script,
            failure_reason(&outcome)
        );
        if let Some(ref stderr) = outcome.stderr {
            for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
                warn!("  {}", line);
            }
        }
    }

    outcome
}

fn failure_reason(outcome: &PredictorOutcome) -> String {
    match (outcome.status, outcome.exit_code) {
        (RunStatus::SpawnError, _) => "could not be started".to_string(),
        (_, Some(code)) => format!("exit code {}", code),
        (_, None) => "terminated by signal".to_string(),
    }
}

/// Find the metrics object a script printed on stdout.
///
/// Scripts may print other text as well; the last line that parses as a
/// metrics object wins.
pub fn parse_metrics(stdout: &str) -> Option<PredictorMetrics> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str::<PredictorMetrics>(line).ok())
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}
