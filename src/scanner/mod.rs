//! Predictor script discovery.
//!
//! Scripts are either listed explicitly in the configuration or found in
//! the scripts directory by their `<prefix><N>.<ext>` file name. Files that
//! do not match (shared helper modules and the like) are skipped.

use crate::config::Config;
use crate::models::PredictorSpec;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Configuration for script discovery.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Directory holding the scripts.
    pub scripts_dir: PathBuf,
    /// File stem prefix, e.g. "script".
    pub prefix: String,
    /// Extension without dot, e.g. "py".
    pub extension: String,
    /// Explicit scripts, in order. Overrides discovery when non-empty.
    pub explicit: Vec<PathBuf>,
}

impl From<&Config> for ScanConfig {
    fn from(config: &Config) -> Self {
        Self {
            scripts_dir: config.resolve(&config.predictors.scripts_dir),
            prefix: config.predictors.script_prefix.clone(),
            extension: config.predictors.script_extension.clone(),
            explicit: config
                .predictors
                .scripts
                .iter()
                .map(|s| config.resolve(s))
                .collect(),
        }
    }
}

/// Discovers predictor scripts.
pub struct ScriptScanner {
    config: ScanConfig,
}

impl ScriptScanner {
    /// Create a new script scanner.
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Find the scripts as `(index, path)` pairs, ordered by index.
    pub fn scan(&self) -> Result<Vec<(usize, PathBuf)>> {
        if !self.config.explicit.is_empty() {
            return Ok(self
                .config
                .explicit
                .iter()
                .enumerate()
                .map(|(pos, path)| {
                    let index = trailing_number(path).unwrap_or(pos + 1);
                    (index, path.clone())
                })
                .collect());
        }

        let dir = &self.config.scripts_dir;
        if !dir.is_dir() {
            bail!("Scripts directory not found: {}", dir.display());
        }

        let mut scripts = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry
                .with_context(|| format!("Failed to read scripts directory: {}", dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            match self.script_index(entry.path()) {
                Some(index) => scripts.push((index, entry.path().to_path_buf())),
                None => debug!("Skipping non-predictor file: {}", entry.path().display()),
            }
        }

        scripts.sort_by_key(|(index, _)| *index);
        Ok(scripts)
    }

    /// `N` when `path` is named `<prefix><N>.<ext>`.
    fn script_index(&self, path: &Path) -> Option<usize> {
        let ext = path.extension()?.to_str()?;
        if ext != self.config.extension {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let digits = stem.strip_prefix(self.config.prefix.as_str())?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

/// Number at the end of the file stem (`model_12.py` -> 12).
fn trailing_number(path: &Path) -> Option<usize> {
    let stem = path.file_stem()?.to_str()?;
    let start = stem
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    stem[start..].parse().ok()
}

/// Discover scripts and pair each with its expected prediction file.
pub fn discover_predictors(config: &Config) -> Result<Vec<PredictorSpec>> {
    let scanner = ScriptScanner::new(ScanConfig::from(config));
    let specs: Vec<PredictorSpec> = scanner
        .scan()?
        .into_iter()
        .map(|(index, script)| PredictorSpec {
            index,
            predictions: config.predictions_path(index),
            script,
        })
        .collect();

    if specs.is_empty() {
        bail!(
            "No predictor scripts found in {}",
            config.resolve(&config.predictors.scripts_dir).display()
        );
    }

    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "").unwrap();
    }

    fn config_for(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.general.work_dir = dir.path().display().to_string();
        config
    }

    #[test]
    fn test_discovers_scripts_in_numeric_order() {
        let dir = TempDir::new().unwrap();
        let scripts = dir.path().join("scripts");
        fs::create_dir(&scripts).unwrap();
        for name in ["script10.py", "script2.py", "script1.py", "preprocessing.py", "script3.txt", "scriptx.py"] {
            touch(&scripts, name);
        }
        fs::create_dir(scripts.join("script4.py")).unwrap();

        let specs = discover_predictors(&config_for(&dir)).unwrap();
        let indices: Vec<usize> = specs.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 2, 10]);
        assert!(specs[2]
            .predictions
            .ends_with("output/predictions_script10.csv"));
    }

    #[test]
    fn test_missing_scripts_dir() {
        let dir = TempDir::new().unwrap();
        assert!(discover_predictors(&config_for(&dir)).is_err());
    }

    #[test]
    fn test_empty_scripts_dir() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("scripts")).unwrap();
        touch(&dir.path().join("scripts"), "preprocessing.py");

        let err = discover_predictors(&config_for(&dir)).unwrap_err();
        assert!(err.to_string().contains("No predictor scripts found"));
    }

    #[test]
    fn test_explicit_scripts_keep_order() {
        let dir = TempDir::new().unwrap();
        let mut config = config_for(&dir);
        config.predictors.scripts = vec![
            "models/forest_7.py".to_string(),
            "models/boost.py".to_string(),
        ];

        let specs = discover_predictors(&config).unwrap();
        assert_eq!(specs[0].index, 7);
        assert_eq!(specs[1].index, 2);
        assert!(specs[0].script.ends_with("models/forest_7.py"));
    }

    #[test]
    fn test_trailing_number() {
        assert_eq!(trailing_number(Path::new("script12.py")), Some(12));
        assert_eq!(trailing_number(Path::new("a/model_3.py")), Some(3));
        assert_eq!(trailing_number(Path::new("boost.py")), None);
    }
}
