//! Run report generation.
//!
//! This module renders the run report as Markdown or JSON.

use crate::analysis::format_report;
use crate::cli::ReportFormat;
use crate::models::{ClassificationReport, PredictorOutcome, RunMetadata, RunReport, VoteSummary};
use anyhow::{Context, Result};
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &RunReport) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Ensemble Vote Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_predictors_section(&report.predictors));
    output.push_str(&generate_inputs_section(&report.inputs));
    output.push_str(&generate_vote_section(&report.vote));

    if let Some(ref evaluation) = report.evaluation {
        output.push_str(&generate_evaluation_section(evaluation));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &RunMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Started:** {}\n",
        metadata.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Working Directory:** `{}`\n", metadata.work_dir));
    section.push_str(&format!("- **Output:** `{}`\n", metadata.output_path));
    section.push_str(&format!(
        "- **Predictors Executed:** {}\n",
        if metadata.predictors_executed { "yes" } else { "no (vote only)" }
    ));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the predictor table.
fn generate_predictors_section(outcomes: &[PredictorOutcome]) -> String {
    if outcomes.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Predictors\n\n");
    section.push_str("| # | Script | Status | Exit | Duration | Model | Accuracy |\n");
    section.push_str("|:---:|:---|:---|:---:|:---:|:---|:---:|\n");

    for outcome in outcomes {
        let exit = outcome
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let (model, accuracy) = match outcome.metrics {
            Some(ref m) => (m.model.clone(), format!("{:.4}", m.accuracy)),
            None => ("-".to_string(), "-".to_string()),
        };

        section.push_str(&format!(
            "| {} | `{}` | {} {} | {} | {:.1}s | {} | {} |\n",
            outcome.index,
            outcome.script,
            outcome.status.emoji(),
            outcome.status,
            exit,
            outcome.duration_seconds,
            model,
            accuracy
        ));
    }
    section.push('\n');

    // Captured stderr of failed predictors
    for outcome in outcomes.iter().filter(|o| !o.succeeded()) {
        if let Some(ref stderr) = outcome.stderr {
            if stderr.trim().is_empty() {
                continue;
            }
            section.push_str(&format!(
                "<details>\n<summary>stderr of {}</summary>\n\n```\n",
                outcome.script
            ));
            section.push_str(stderr.trim_end());
            section.push_str("\n```\n</details>\n\n");
        }
    }

    section
}

/// Generate the list of voted files.
fn generate_inputs_section(inputs: &[String]) -> String {
    let mut section = String::new();

    section.push_str("## Inputs\n\n");
    for (i, input) in inputs.iter().enumerate() {
        section.push_str(&format!("{}. `{}`\n", i + 1, input));
    }
    section.push('\n');

    section
}

/// Generate the vote summary section.
fn generate_vote_section(vote: &VoteSummary) -> String {
    let mut section = String::new();

    section.push_str("## Vote\n\n");
    section.push_str("| Rows | Predictors | Unanimous | Tied | No Absolute Majority |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | {} |\n\n",
        vote.rows,
        vote.predictors,
        vote.unanimous_rows,
        vote.tied_rows,
        vote.without_absolute_majority
    ));
    section.push_str("Ties are resolved in favour of the smallest label.\n\n");

    if !vote.label_distribution.is_empty() {
        section.push_str("### Label Distribution\n\n");
        section.push_str("| Label | Rows |\n");
        section.push_str("|:---:|:---:|\n");
        for (label, count) in &vote.label_distribution {
            section.push_str(&format!("| {} | {} |\n", label, count));
        }
        section.push('\n');
    }

    section
}

/// Generate the evaluation section.
fn generate_evaluation_section(evaluation: &ClassificationReport) -> String {
    let mut section = String::new();

    section.push_str("## Evaluation\n\n");
    section.push_str(&format!(
        "**Accuracy:** {:.4} over {} rows\n\n",
        evaluation.accuracy, evaluation.support
    ));
    section.push_str("```\n");
    section.push_str(&format_report(evaluation));
    section.push_str("```\n\n");

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by ensemble-vote v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Render the report in `format` and write it to `path`.
pub fn write_report(report: &RunReport, format: ReportFormat, path: &Path) -> Result<()> {
    let content = match format {
        ReportFormat::Json => generate_json_report(report)?,
        ReportFormat::Markdown => generate_markdown_report(report),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
