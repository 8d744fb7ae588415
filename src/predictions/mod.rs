//! Prediction file loading and writing.
//!
//! A prediction file is a CSV with one header line followed by one integer
//! label per line.

use crate::error::VoteError;
use crate::models::{FinalPredictions, Label, PredictionMatrix, PredictionSet};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Default header of the final predictions file.
pub const DEFAULT_HEADER: &str = "prediction";

/// Load one prediction set, discarding the header line.
///
/// Every data line must hold exactly one integer. Blank lines are rejected
/// rather than skipped so rows never shift.
pub fn load_prediction_set(path: &Path) -> Result<PredictionSet, VoteError> {
    debug!("Loading predictions: {}", path.display());

    let mut file = File::open(path).map_err(|source| VoteError::MissingInput {
        path: path.to_path_buf(),
        source,
    })?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|source| VoteError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let malformed = |line: u64, token: &str| VoteError::MalformedRow {
        path: path.to_path_buf(),
        line,
        token: token.to_string(),
    };

    match content.lines().next() {
        Some(header) if !header.trim().is_empty() => {}
        _ => return Err(malformed(1, "")),
    }
    let blank = first_blank_line(&content);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut labels = Vec::new();

    for result in reader.records() {
        let record = result.map_err(|source| VoteError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if let Some(blank) = blank.filter(|&b| b < line) {
            return Err(malformed(blank, ""));
        }

        if record.len() != 1 {
            let fields: Vec<&str> = record.iter().collect();
            return Err(malformed(line, &fields.join(",")));
        }
        let token = record.get(0).unwrap_or("");
        let label = parse_label(token).ok_or_else(|| malformed(line, token))?;

        labels.push(label);
    }

    // blank lines after the last row
    if let Some(blank) = blank {
        return Err(malformed(blank, ""));
    }

    debug!("Loaded {} rows from {}", labels.len(), path.display());
    Ok(PredictionSet::new(path, labels))
}

/// Load every file in order and assemble the matrix.
///
/// Fails on the first missing or malformed file; length agreement is
/// checked once all files are loaded.
pub fn load_matrix(paths: &[PathBuf]) -> Result<PredictionMatrix, VoteError> {
    let sets = paths
        .iter()
        .map(|path| {
            info!("Loading predictions: {}", path.display());
            load_prediction_set(path)
        })
        .collect::<Result<Vec<_>, _>>()?;

    PredictionMatrix::new(sets)
}

/// Write the final predictions: header, then one label per line.
///
/// The content goes to a temporary file in the destination directory which
/// is renamed over `path` only once fully written.
pub fn write_final_predictions(
    path: &Path,
    header: &str,
    predictions: &FinalPredictions,
) -> Result<(), VoteError> {
    let write_err = |source: std::io::Error| VoteError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(write_err)?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(write_err)?;
    tmp.write_all(render_predictions(header, predictions).as_bytes())
        .map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    info!(
        "Wrote {} predictions to {}",
        predictions.len(),
        path.display()
    );
    Ok(())
}

/// Render the output file content.
pub fn render_predictions(header: &str, predictions: &FinalPredictions) -> String {
    let mut out = String::with_capacity(header.len() + 1 + predictions.len() * 3);
    out.push_str(header);
    out.push('\n');
    for label in predictions.labels() {
        out.push_str(&label.to_string());
        out.push('\n');
    }
    out
}

/// 1-based number of the first empty or whitespace-only data line.
fn first_blank_line(content: &str) -> Option<u64> {
    content
        .lines()
        .enumerate()
        .skip(1)
        .find(|(_, line)| line.trim().is_empty())
        .map(|(i, _)| i as u64 + 1)
}

fn parse_label(token: &str) -> Option<Label> {
    token.parse::<Label>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_skips_header() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "p.csv", "prediction\n1\n0\n2\n");

        let set = load_prediction_set(&path).unwrap();
        assert_eq!(set.labels, vec![1, 0, 2]);
        assert_eq!(set.source, path);
    }

    #[test]
    fn test_load_header_only_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "p.csv", "prediction\n");

        let set = load_prediction_set(&path).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_load_handles_crlf_and_negative_labels() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "p.csv", "prediction\r\n-1\r\n 3 \r\n");

        let set = load_prediction_set(&path).unwrap();
        assert_eq!(set.labels, vec![-1, 3]);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions_script4.csv");

        match load_prediction_set(&path).unwrap_err() {
            VoteError::MissingInput { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_malformed_row_reports_line() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "p.csv", "prediction\n1\n1.5\n0\n");

        match load_prediction_set(&path).unwrap_err() {
            VoteError::MalformedRow { line, token, .. } => {
                assert_eq!(line, 3);
                assert_eq!(token, "1.5");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_rejects_blank_line_between_rows() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "p.csv", "prediction\n1\n\n0\n");

        match load_prediction_set(&path).unwrap_err() {
            VoteError::MalformedRow { line, token, .. } => {
                assert_eq!(line, 3);
                assert_eq!(token, "");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_rejects_trailing_blank_line() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "p.csv", "prediction\n1\n0\n\n");

        let err = load_prediction_set(&path).unwrap_err();
        assert!(matches!(err, VoteError::MalformedRow { line: 4, .. }));
    }

    #[test]
    fn test_load_rejects_extra_columns() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "p.csv", "prediction\n1,7\n0\n");

        match load_prediction_set(&path).unwrap_err() {
            VoteError::MalformedRow { line, token, .. } => {
                assert_eq!(line, 2);
                assert_eq!(token, "1,7");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_reports_earliest_problem_first() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "p.csv", "prediction\nx\n\n0\n");

        let err = load_prediction_set(&path).unwrap_err();
        assert!(matches!(err, VoteError::MalformedRow { line: 2, .. }));
    }

    #[test]
    fn test_load_requires_header_line() {
        let dir = TempDir::new().unwrap();
        let empty = write_file(&dir, "empty.csv", "");
        let blank_header = write_file(&dir, "blank.csv", "\n1\n0\n");

        for path in [empty, blank_header] {
            let err = load_prediction_set(&path).unwrap_err();
            assert!(matches!(err, VoteError::MalformedRow { line: 1, .. }));
        }
    }

    #[test]
    fn test_load_matrix_missing_file_aborts() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.csv", "prediction\n1\n");
        let missing = dir.path().join("b.csv");

        let err = load_matrix(&[a, missing.clone()]).unwrap_err();
        assert!(matches!(err, VoteError::MissingInput { path, .. } if path == missing));
    }

    #[test]
    fn test_load_matrix_length_mismatch() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.csv", "prediction\n1\n0\n");
        let b = write_file(&dir, "b.csv", "prediction\n1\n");

        let err = load_matrix(&[a, b]).unwrap_err();
        assert!(matches!(err, VoteError::LengthMismatch { expected: 2, found: 1, .. }));
    }

    #[test]
    fn test_write_creates_directory_and_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output").join("final_predictions.csv");

        write_final_predictions(&path, DEFAULT_HEADER, &FinalPredictions::new(vec![1, 0, 1]))
            .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "prediction\n1\n0\n1\n");
    }

    #[test]
    fn test_write_empty_predictions_is_header_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("final_predictions.csv");

        write_final_predictions(&path, DEFAULT_HEADER, &FinalPredictions::new(Vec::new()))
            .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "prediction\n");
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "final_predictions.csv", "stale\n9\n9\n9\n9\n");

        write_final_predictions(&path, DEFAULT_HEADER, &FinalPredictions::new(vec![2]))
            .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "prediction\n2\n");
    }
}
