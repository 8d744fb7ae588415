//! Data models for the ensemble voter.
//!
//! This module contains the core data structures used throughout
//! the application: prediction sets, the prediction matrix, predictor
//! outcomes and the run report.

use crate::error::VoteError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A predicted class label.
pub type Label = i64;

/// Ordered labels produced by one predictor, one per evaluated row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionSet {
    /// File the labels were loaded from (used in diagnostics).
    pub source: PathBuf,
    /// Labels in row order.
    pub labels: Vec<Label>,
}

impl PredictionSet {
    pub fn new(source: impl Into<PathBuf>, labels: Vec<Label>) -> Self {
        Self {
            source: source.into(),
            labels,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// K equal-length prediction sets, indexed by load order.
#[derive(Debug, Clone)]
pub struct PredictionMatrix {
    sets: Vec<PredictionSet>,
    row_count: usize,
}

impl PredictionMatrix {
    /// Build a matrix, checking that there is at least one set and that
    /// every set has the row count of the first one.
    pub fn new(sets: Vec<PredictionSet>) -> Result<Self, VoteError> {
        let first = sets.first().ok_or(VoteError::NoPredictors)?;
        let row_count = first.len();

        if let Some(bad) = sets.iter().find(|s| s.len() != row_count) {
            return Err(VoteError::LengthMismatch {
                path: bad.source.clone(),
                reference: first.source.clone(),
                expected: row_count,
                found: bad.len(),
            });
        }

        Ok(Self { sets, row_count })
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Number of predictors (K).
    pub fn predictor_count(&self) -> usize {
        self.sets.len()
    }

    /// Every predictor's vote for row `row`, in load order.
    pub fn column(&self, row: usize) -> impl Iterator<Item = Label> + '_ {
        self.sets.iter().map(move |s| s.labels[row])
    }

    #[allow(dead_code)] // Accessor kept for callers needing the source paths
    pub fn sets(&self) -> &[PredictionSet] {
        &self.sets
    }
}

/// The combined majority labels, written once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalPredictions {
    labels: Vec<Label>,
}

impl FinalPredictions {
    pub fn new(labels: Vec<Label>) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// A predictor script scheduled for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictorSpec {
    /// 1-based predictor index (the `N` of `scriptN.py`).
    pub index: usize,
    /// Path to the script.
    pub script: PathBuf,
    /// Where the script is expected to leave its predictions.
    pub predictions: PathBuf,
}

impl PredictorSpec {
    /// Short display name of the script.
    pub fn name(&self) -> String {
        self.script
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.script.display().to_string())
    }
}

/// Metrics object some predictors print on stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorMetrics {
    /// Model name.
    pub model: String,
    /// Training accuracy reported by the script.
    pub accuracy: f64,
    /// Wall time reported by the script, in seconds.
    pub time: f64,
}

/// Status of a predictor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Exited with status 0.
    Succeeded,
    /// Exited with a non-zero status or was killed by a signal.
    Failed,
    /// Could not be started at all.
    SpawnError,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Succeeded => write!(f, "Succeeded"),
            RunStatus::Failed => write!(f, "Failed"),
            RunStatus::SpawnError => write!(f, "Spawn error"),
        }
    }
}

impl RunStatus {
    /// Returns an emoji representation of the status.
    pub fn emoji(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "✅",
            RunStatus::Failed => "❌",
            RunStatus::SpawnError => "⛔",
        }
    }
}

/// Result of running one predictor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorOutcome {
    /// 1-based predictor index.
    pub index: usize,
    /// Script path.
    pub script: String,
    /// Final status.
    pub status: RunStatus,
    /// Process exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    /// Wall time in seconds.
    pub duration_seconds: f64,
    /// Metrics parsed from stdout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PredictorMetrics>,
    /// Captured stderr, kept only for failed runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl PredictorOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}

/// Aggregate statistics of one vote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteSummary {
    /// Number of rows voted on.
    pub rows: usize,
    /// Number of predictors (K).
    pub predictors: usize,
    /// Rows where every predictor agreed.
    pub unanimous_rows: usize,
    /// Rows where two or more labels shared the top count.
    pub tied_rows: usize,
    /// Rows whose winner got no more than K/2 votes.
    pub without_absolute_majority: usize,
    /// How often each label appears in the final predictions.
    pub label_distribution: BTreeMap<Label, usize>,
}

/// Precision / recall / F1 for one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: Label,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Averaged precision / recall / F1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Comparison of the final predictions with ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Fraction of rows predicted correctly.
    pub accuracy: f64,
    /// Per-class metrics, ascending by label.
    pub classes: Vec<ClassMetrics>,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
    /// Number of evaluated rows.
    pub support: usize,
}

/// Metadata about the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Working directory the predictors ran in.
    pub work_dir: String,
    /// Path of the final predictions file.
    pub output_path: String,
    /// Whether the predictors were executed or only their files were voted on.
    pub predictors_executed: bool,
    /// Duration of the whole run in seconds.
    pub duration_seconds: f64,
}

/// The complete run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    /// Outcomes in predictor order (empty for vote-only runs).
    pub predictors: Vec<PredictorOutcome>,
    /// Paths of the prediction files that were voted on.
    pub inputs: Vec<String>,
    pub vote: VoteSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<ClassificationReport>,
}

/// Display a path relative to `base` when possible.
pub fn display_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}
