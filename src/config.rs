//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.ensemble.toml` files.

use crate::cli::ReportFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".ensemble.toml";

/// Placeholder replaced by the predictor index in prediction file names.
pub const INDEX_PLACEHOLDER: &str = "{index}";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Predictor script settings.
    #[serde(default)]
    pub predictors: PredictorsConfig,

    /// Voting settings.
    #[serde(default)]
    pub vote: VoteConfig,

    /// Evaluation settings.
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Working directory; relative paths are resolved against it.
    #[serde(default = "default_work_dir")]
    pub work_dir: String,

    /// Directory holding the prediction files.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            output_dir: default_output_dir(),
            verbose: false,
        }
    }
}

fn default_work_dir() -> String {
    ".".to_string()
}

fn default_output_dir() -> String {
    "output".to_string()
}

/// Predictor script settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorsConfig {
    /// Interpreter used to run each script.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Extra arguments placed before the script path.
    #[serde(default)]
    pub interpreter_args: Vec<String>,

    /// Directory scanned for predictor scripts.
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: String,

    /// File stem prefix of predictor scripts (`script` in `script3.py`).
    #[serde(default = "default_script_prefix")]
    pub script_prefix: String,

    /// Extension of predictor scripts.
    #[serde(default = "default_script_extension")]
    pub script_extension: String,

    /// Explicit script list; discovery is skipped when non-empty.
    #[serde(default)]
    pub scripts: Vec<String>,

    /// CSV file piped to every script's stdin.
    #[serde(default)]
    pub stdin_input: Option<String>,

    /// Number of scripts running at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Abort on the first failing script.
    #[serde(default)]
    pub strict: bool,
}

impl Default for PredictorsConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            interpreter_args: Vec::new(),
            scripts_dir: default_scripts_dir(),
            script_prefix: default_script_prefix(),
            script_extension: default_script_extension(),
            scripts: Vec::new(),
            stdin_input: None,
            concurrency: default_concurrency(),
            strict: false,
        }
    }
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_scripts_dir() -> String {
    "scripts".to_string()
}

fn default_script_prefix() -> String {
    "script".to_string()
}

fn default_script_extension() -> String {
    "py".to_string()
}

fn default_concurrency() -> usize {
    1
}

/// Voting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteConfig {
    /// Prediction file name, `{index}` is the 1-based predictor index.
    #[serde(default = "default_predictions_template")]
    pub predictions_template: String,

    /// Final predictions file, relative to the output directory.
    #[serde(default = "default_output_file")]
    pub output_file: String,

    /// Header line of the final predictions file.
    #[serde(default = "default_header")]
    pub header: String,

    /// Number of prediction files voted on when scripts are not run.
    #[serde(default = "default_predictor_count")]
    pub predictor_count: usize,
}

impl Default for VoteConfig {
    fn default() -> Self {
        Self {
            predictions_template: default_predictions_template(),
            output_file: default_output_file(),
            header: default_header(),
            predictor_count: default_predictor_count(),
        }
    }
}

fn default_predictions_template() -> String {
    "predictions_script{index}.csv".to_string()
}

fn default_output_file() -> String {
    "final_predictions.csv".to_string()
}

fn default_header() -> String {
    crate::predictions::DEFAULT_HEADER.to_string()
}

fn default_predictor_count() -> usize {
    6
}

/// Evaluation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Dataset holding the ground-truth column.
    #[serde(default)]
    pub truth_path: Option<String>,

    /// Name of the ground-truth column.
    #[serde(default = "default_target_column")]
    pub target_column: String,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            truth_path: None,
            target_column: default_target_column(),
        }
    }
}

fn default_target_column() -> String {
    "target".to_string()
}

/// Run report settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Where to write the report; no report when unset.
    #[serde(default)]
    pub path: Option<String>,

    /// Report format.
    #[serde(default)]
    pub format: ReportFormat,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load configuration from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref dir) = args.work_dir {
            self.general.work_dir = dir.display().to_string();
        }
        if let Some(ref dir) = args.output_dir {
            self.general.output_dir = dir.display().to_string();
        }
        if let Some(ref output) = args.output {
            self.vote.output_file = output.display().to_string();
        }

        if let Some(ref interpreter) = args.interpreter {
            self.predictors.interpreter = interpreter.clone();
        }
        if let Some(ref dir) = args.scripts_dir {
            self.predictors.scripts_dir = dir.display().to_string();
        }
        if let Some(ref input) = args.stdin_input {
            self.predictors.stdin_input = Some(input.display().to_string());
        }
        if let Some(concurrency) = args.concurrency {
            self.predictors.concurrency = concurrency;
        }
        if let Some(count) = args.predictors {
            self.vote.predictor_count = count;
        }

        if let Some(ref truth) = args.truth {
            self.evaluation.truth_path = Some(truth.display().to_string());
        }
        if let Some(ref column) = args.target_column {
            self.evaluation.target_column = column.clone();
        }

        if let Some(ref report) = args.report {
            self.report.path = Some(report.display().to_string());
        }
        if let Some(format) = args.format {
            self.report.format = format;
        }

        // Flags always override
        if args.strict {
            self.predictors.strict = true;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Log level for the run. `quiet` wins over a verbose config.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Working directory as a path.
    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.general.work_dir)
    }

    /// Resolve a configured path against the working directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.work_dir().join(path)
        }
    }

    /// Directory holding the prediction files.
    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.general.output_dir)
    }

    /// Path of the final predictions file.
    pub fn output_path(&self) -> PathBuf {
        let file = Path::new(&self.vote.output_file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.output_dir().join(file)
        }
    }

    /// Prediction file expected from predictor `index`.
    pub fn predictions_path(&self, index: usize) -> PathBuf {
        let name = self
            .vote
            .predictions_template
            .replace(INDEX_PLACEHOLDER, &index.to_string());
        self.output_dir().join(name)
    }

    /// Prediction files `1..=predictor_count`, used when scripts are not run.
    pub fn default_prediction_paths(&self) -> Vec<PathBuf> {
        (1..=self.vote.predictor_count)
            .map(|i| self.predictions_path(i))
            .collect()
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.predictors.interpreter, "python3");
        assert_eq!(config.predictors.concurrency, 1);
        assert_eq!(config.vote.predictor_count, 6);
        assert_eq!(config.vote.header, "prediction");
        assert_eq!(config.evaluation.target_column, "target");
        assert!(config.report.path.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
work_dir = "lab_5"
verbose = true

[predictors]
interpreter = "python"
interpreter_args = ["-u"]
concurrency = 3
stdin_input = "input/raw_data.csv"

[vote]
predictor_count = 4

[report]
path = "run.json"
format = "json"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.work_dir, "lab_5");
        assert!(config.general.verbose);
        assert_eq!(config.general.output_dir, "output");
        assert_eq!(config.predictors.interpreter, "python");
        assert_eq!(config.predictors.interpreter_args, vec!["-u"]);
        assert_eq!(config.predictors.concurrency, 3);
        assert_eq!(
            config.predictors.stdin_input.as_deref(),
            Some("input/raw_data.csv")
        );
        assert_eq!(config.vote.predictor_count, 4);
        assert_eq!(config.report.format, ReportFormat::Json);
    }

    #[test]
    fn test_log_level_follows_config_verbosity() {
        let mut config = Config::default();
        assert_eq!(config.log_level(false), tracing::Level::INFO);

        config.general.verbose = true;
        assert_eq!(config.log_level(false), tracing::Level::DEBUG);
        assert_eq!(config.log_level(true), tracing::Level::ERROR);
    }

    #[test]
    fn test_verbose_flag_raises_log_level() {
        let mut config = Config::default();
        let args = crate::cli::Args::try_parse_from(["ensemble-vote", "--verbose"]).unwrap();
        config.merge_with_args(&args);
        assert_eq!(config.log_level(false), tracing::Level::DEBUG);
    }

    #[test]
    fn test_paths_resolve_against_work_dir() {
        let mut config = Config::default();
        config.general.work_dir = "/lab".to_string();

        assert_eq!(
            config.output_path(),
            PathBuf::from("/lab/output/final_predictions.csv")
        );
        assert_eq!(
            config.predictions_path(4),
            PathBuf::from("/lab/output/predictions_script4.csv")
        );
        assert_eq!(config.resolve("/abs/x.csv"), PathBuf::from("/abs/x.csv"));
    }

    #[test]
    fn test_default_prediction_paths() {
        let mut config = Config::default();
        config.vote.predictor_count = 3;

        let paths = config.default_prediction_paths();
        assert_eq!(paths.len(), 3);
        assert!(paths[2].ends_with("output/predictions_script3.csv"));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[predictors]"));
        assert!(toml_str.contains("[vote]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.vote.output_file, "final_predictions.csv");
    }
}
