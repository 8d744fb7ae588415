//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// ensemble-vote - run classifier scripts and merge their predictions
///
/// Runs every predictor script once, then combines the prediction files
/// they write into a single file by per-row majority vote. Ties go to the
/// smallest label.
///
/// Examples:
///   ensemble-vote
///   ensemble-vote --work-dir lab_5 --concurrency 3
///   ensemble-vote --vote-only --predictors 6
///   ensemble-vote --input a.csv,b.csv,c.csv --output final.csv
///   ensemble-vote --truth input/raw_data.csv --report run.md
///   ensemble-vote --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .ensemble.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Generate a default .ensemble.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Working directory for scripts and relative paths
    #[arg(short, long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Directory scanned for predictor scripts (scriptN.py)
    #[arg(long, value_name = "DIR")]
    pub scripts_dir: Option<PathBuf>,

    /// Directory holding the prediction files
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Final predictions file (relative to the output directory)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Interpreter used to run predictor scripts
    #[arg(long, value_name = "CMD", env = "ENSEMBLE_PYTHON")]
    pub interpreter: Option<String>,

    /// CSV file piped to every predictor's stdin
    #[arg(long, value_name = "FILE")]
    pub stdin_input: Option<PathBuf>,

    /// Number of predictors running at once
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Abort as soon as a predictor fails
    #[arg(long)]
    pub strict: bool,

    /// Skip running predictors and vote on existing prediction files
    #[arg(long)]
    pub vote_only: bool,

    /// Number of prediction files to vote on in vote-only mode
    #[arg(short = 'n', long, value_name = "K")]
    pub predictors: Option<usize>,

    /// Explicit prediction files to vote on (comma-separated)
    ///
    /// Implies --vote-only. Example: --input a.csv,b.csv,c.csv
    #[arg(short, long, value_name = "FILES", value_delimiter = ',')]
    pub input: Option<Vec<PathBuf>>,

    /// Dataset with the ground-truth column for evaluation
    #[arg(long, value_name = "FILE")]
    pub truth: Option<PathBuf>,

    /// Name of the ground-truth column
    #[arg(long, value_name = "NAME")]
    pub target_column: Option<String>,

    /// Write a run report to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Report format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<ReportFormat>,

    /// Dry run: list predictors and expected files without running anything
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Output format for the run report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// True when predictors should not be executed.
    pub fn skip_predictors(&self) -> bool {
        self.vote_only || self.input.is_some()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(concurrency) = self.concurrency {
            if concurrency == 0 {
                return Err("Concurrency must be at least 1".to_string());
            }
        }

        if let Some(count) = self.predictors {
            if count == 0 {
                return Err("At least one predictor is required".to_string());
            }
        }

        if let Some(ref inputs) = self.input {
            if inputs.is_empty() {
                return Err("--input needs at least one file".to_string());
            }
            if self.predictors.is_some() {
                return Err("Cannot use both --input and --predictors".to_string());
            }
        }

        if self.predictors.is_some() && !self.skip_predictors() {
            return Err("--predictors only applies with --vote-only".to_string());
        }

        if self.stdin_input.is_some() && self.skip_predictors() {
            return Err("--stdin-input has no effect when predictors are not run".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate working directory if provided
        if let Some(ref dir) = self.work_dir {
            if !dir.exists() {
                return Err(format!(
                    "Working directory does not exist: {}",
                    dir.display()
                ));
            }
            if !dir.is_dir() {
                return Err(format!(
                    "Working directory is not a directory: {}",
                    dir.display()
                ));
            }
        }

        Ok(())
    }
}
