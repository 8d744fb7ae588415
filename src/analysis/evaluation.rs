//! Evaluation of the final predictions against ground truth.
//!
//! Truth labels come from a column of the raw dataset. When the dataset
//! is longer than the prediction set, the predictions are compared with
//! its last rows.

use crate::error::VoteError;
use crate::models::{AverageMetrics, ClassMetrics, ClassificationReport, FinalPredictions, Label};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Load the truth labels from `column` of a CSV file with a header row.
pub fn load_truth(path: &Path, column: &str) -> Result<Vec<Label>, VoteError> {
    let file = File::open(path).map_err(|source| VoteError::MissingInput {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let csv_err = |source: csv::Error| VoteError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let idx = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| VoteError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        })?;

    let mut labels = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_err)?;
        let token = record.get(idx).unwrap_or("");
        let label = parse_truth_label(token).ok_or_else(|| VoteError::MalformedRow {
            path: path.to_path_buf(),
            line: record.position().map(|p| p.line()).unwrap_or(0),
            token: token.to_string(),
        })?;
        labels.push(label);
    }

    debug!("Loaded {} truth labels from {}", labels.len(), path.display());
    Ok(labels)
}

/// Accept integer labels and integral floats such as `1.0`.
fn parse_truth_label(token: &str) -> Option<Label> {
    if let Ok(label) = token.parse::<Label>() {
        return Some(label);
    }
    let value = token.parse::<f64>().ok()?;
    (value.fract() == 0.0 && value.is_finite()).then_some(value as Label)
}

/// Load truth from `path` and evaluate `predictions` against its tail.
pub fn evaluate_file(
    path: &Path,
    column: &str,
    predictions: &FinalPredictions,
) -> Result<ClassificationReport, VoteError> {
    let truth = load_truth(path, column)?;

    if truth.len() < predictions.len() {
        return Err(VoteError::TruthTooShort {
            path: path.to_path_buf(),
            expected: predictions.len(),
            found: truth.len(),
        });
    }

    let tail = &truth[truth.len() - predictions.len()..];
    info!(
        "Evaluating {} predictions against the last {} rows of {}",
        predictions.len(),
        tail.len(),
        path.display()
    );
    Ok(classification_report(tail, predictions.labels()))
}

/// Compute accuracy and per-class precision / recall / F1.
///
/// `truth` and `predicted` must have the same length. Metrics with a zero
/// denominator are reported as 0.0.
pub fn classification_report(truth: &[Label], predicted: &[Label]) -> ClassificationReport {
    debug_assert_eq!(truth.len(), predicted.len());

    let mut true_pos: BTreeMap<Label, usize> = BTreeMap::new();
    let mut predicted_count: BTreeMap<Label, usize> = BTreeMap::new();
    let mut support: BTreeMap<Label, usize> = BTreeMap::new();
    let mut correct = 0;

    for (&t, &p) in truth.iter().zip(predicted) {
        *support.entry(t).or_default() += 1;
        *predicted_count.entry(p).or_default() += 1;
        if t == p {
            *true_pos.entry(t).or_default() += 1;
            correct += 1;
        }
    }

    let labels: BTreeSet<Label> = support.keys().chain(predicted_count.keys()).copied().collect();

    let classes: Vec<ClassMetrics> = labels
        .into_iter()
        .map(|label| {
            let tp = true_pos.get(&label).copied().unwrap_or(0);
            let n_pred = predicted_count.get(&label).copied().unwrap_or(0);
            let n_true = support.get(&label).copied().unwrap_or(0);

            let precision = ratio(tp, n_pred);
            let recall = ratio(tp, n_true);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            ClassMetrics {
                label,
                precision,
                recall,
                f1,
                support: n_true,
            }
        })
        .collect();

    let total = truth.len();
    let macro_avg = average(&classes, |_| 1.0);
    let weighted_avg = if total > 0 {
        average(&classes, |c| c.support as f64)
    } else {
        AverageMetrics::default()
    };

    ClassificationReport {
        accuracy: ratio(correct, total),
        classes,
        macro_avg,
        weighted_avg,
        support: total,
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn average(classes: &[ClassMetrics], weight: impl Fn(&ClassMetrics) -> f64) -> AverageMetrics {
    let total_weight: f64 = classes.iter().map(&weight).sum();
    if total_weight == 0.0 {
        return AverageMetrics::default();
    }

    let mut avg = AverageMetrics::default();
    for class in classes {
        let w = weight(class);
        avg.precision += class.precision * w;
        avg.recall += class.recall * w;
        avg.f1 += class.f1 * w;
    }
    avg.precision /= total_weight;
    avg.recall /= total_weight;
    avg.f1 /= total_weight;
    avg
}

/// Render the report as a fixed-width text table.
pub fn format_report(report: &ClassificationReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{:>14} {:>10} {:>10} {:>10} {:>10}\n\n",
        "", "precision", "recall", "f1-score", "support"
    ));

    for class in &report.classes {
        out.push_str(&format!(
            "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}\n",
            class.label, class.precision, class.recall, class.f1, class.support
        ));
    }

    out.push('\n');
    out.push_str(&format!(
        "{:>14} {:>10} {:>10} {:>10.2} {:>10}\n",
        "accuracy", "", "", report.accuracy, report.support
    ));
    for (name, avg) in [
        ("macro avg", &report.macro_avg),
        ("weighted avg", &report.weighted_avg),
    ] {
        out.push_str(&format!(
            "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}\n",
            name, avg.precision, avg.recall, avg.f1, report.support
        ));
    }

    out
}
