//! Error taxonomy for loading, voting and evaluation.
//!
//! Every variant is fatal for the run. Load and vote errors are raised
//! before the final predictions are written.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoteError {
    /// A prediction or truth file does not exist or cannot be opened.
    #[error("Missing input {path}: {source}")]
    MissingInput {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A file could be opened but not read as text.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A data line is not a single integer, or the header line is missing.
    #[error("Malformed row in {path} at line {line}: '{token}' is not an integer label")]
    MalformedRow {
        path: PathBuf,
        line: u64,
        token: String,
    },

    /// Prediction sets disagree on row count.
    #[error("Length mismatch: {path} has {found} rows, expected {expected} (from {reference})")]
    LengthMismatch {
        path: PathBuf,
        reference: PathBuf,
        expected: usize,
        found: usize,
    },

    /// Nothing to vote on.
    #[error("No prediction sets to aggregate")]
    NoPredictors,

    #[error("Column '{column}' not found in {path}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Truth file {path} has {found} rows but {expected} predictions need evaluating")]
    TruthTooShort {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
