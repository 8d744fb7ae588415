//! ensemble-vote - run classifier scripts and merge their predictions
//!
//! A CLI tool that runs a set of predictor scripts, waits for all of them,
//! and combines the prediction files they write into a single file by
//! per-row majority vote.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Any error (bad arguments, missing or malformed predictions, etc.)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod predictions;
mod report;
mod runner;
mod scanner;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::Config;
use models::{display_relative, PredictorOutcome, PredictorSpec, RunMetadata, RunReport};
use runner::{ProcessRunner, RunOptions};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration first so its verbosity applies to logging
    let config = match load_effective_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config, args.quiet);

    info!("ensemble-vote v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    info!("Working directory: {}", config.work_dir().display());

    match run(args, config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .ensemble.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to customize the interpreter, scripts, file names, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `RUST_LOG` takes precedence over --verbose / --quiet and the config file.
fn init_logging(config: &Config, quiet: bool) {
    let default_level = config.log_level(quiet).as_str().to_lowercase();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete workflow: predictors, vote, evaluation, report.
async fn run(args: Args, config: Config) -> Result<()> {
    let start_time = Instant::now();
    let started_at = Utc::now();

    let work_dir = config.work_dir();

    // Step 1: Run the predictors (or collect existing prediction files)
    let (outcomes, inputs) = if args.skip_predictors() {
        let inputs = vote_inputs(&args, &config);
        if args.dry_run {
            return handle_dry_run(&[], &inputs, &config);
        }
        (Vec::new(), inputs)
    } else {
        let specs = scanner::discover_predictors(&config)?;
        let inputs: Vec<PathBuf> = specs.iter().map(|s| s.predictions.clone()).collect();
        if args.dry_run {
            return handle_dry_run(&specs, &inputs, &config);
        }
        (run_predictor_stage(&specs, &config, &args).await?, inputs)
    };

    // Step 2: Vote
    println!("\n🗳️  Voting across {} prediction files...", inputs.len());
    for path in &inputs {
        println!("   📄 {}", display_relative(path, &work_dir));
    }

    let matrix = predictions::load_matrix(&inputs)?;
    let final_predictions = analysis::majority_vote(&matrix);
    let vote_summary = analysis::summarize_votes(&matrix);
    if final_predictions.is_empty() {
        warn!("Prediction files contain no data rows; the output will hold only the header");
    }

    // Step 3: Write the final predictions
    let output_path = config.output_path();
    predictions::write_final_predictions(&output_path, &config.vote.header, &final_predictions)?;

    // Step 4: Evaluate
    let evaluation = match config.evaluation.truth_path {
        Some(ref truth) => {
            let truth_path = config.resolve(truth);
            println!(
                "\n📏 Evaluating against {} (column '{}')...",
                display_relative(&truth_path, &work_dir),
                config.evaluation.target_column
            );
            Some(analysis::evaluate_file(
                &truth_path,
                &config.evaluation.target_column,
                &final_predictions,
            )?)
        }
        None => None,
    };

    // Print summary
    println!("\n📊 Vote Summary:");
    for line in analysis::generate_summary_text(&vote_summary).lines() {
        println!("   {}", line);
    }

    if let Some(ref evaluation) = evaluation {
        println!("\n📈 Classification report:\n");
        print!("{}", analysis::format_report(evaluation));
    }

    let duration = start_time.elapsed().as_secs_f64();

    // Step 5: Save the run report
    if let Some(ref report_path) = config.report.path {
        let report_path = config.resolve(report_path);
        let run_report = RunReport {
            metadata: RunMetadata {
                started_at,
                work_dir: work_dir.display().to_string(),
                output_path: display_relative(&output_path, &work_dir),
                predictors_executed: !args.skip_predictors(),
                duration_seconds: duration,
            },
            predictors: outcomes,
            inputs: inputs
                .iter()
                .map(|p| display_relative(p, &work_dir))
                .collect(),
            vote: vote_summary,
            evaluation,
        };
        report::write_report(&run_report, config.report.format, &report_path)?;
        println!("\n📝 Report saved to: {}", report_path.display());
    }

    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Voting complete! Results saved to: {}",
        output_path.display()
    );

    Ok(())
}

/// Run every predictor once and report how each one went.
async fn run_predictor_stage(
    specs: &[PredictorSpec],
    config: &Config,
    args: &Args,
) -> Result<Vec<PredictorOutcome>> {
    let stdin = match config.predictors.stdin_input {
        Some(ref input) => {
            let path = config.resolve(input);
            info!("Piping {} to every predictor", path.display());
            Some(
                std::fs::read(&path)
                    .with_context(|| format!("Failed to read stdin input: {}", path.display()))?,
            )
        }
        None => None,
    };

    println!("🚀 Running {} predictors...", specs.len());
    println!("   Interpreter: {}", config.predictors.interpreter);
    println!("   Concurrency: {}", config.predictors.concurrency);

    let runner = ProcessRunner::new(
        config.predictors.interpreter.clone(),
        config.predictors.interpreter_args.clone(),
        config.work_dir(),
    );
    let options = RunOptions {
        stdin,
        concurrency: config.predictors.concurrency,
        strict: config.predictors.strict,
        show_progress: !args.quiet,
    };

    let outcomes = runner::run_predictors(&runner, specs, &options).await?;

    println!();
    for outcome in &outcomes {
        let metrics = outcome
            .metrics
            .as_ref()
            .map(|m| format!(" | {} accuracy {:.4}", m.model, m.accuracy))
            .unwrap_or_default();
        println!(
            "   {} {} ({:.1}s){}",
            outcome.status.emoji(),
            outcome.script,
            outcome.duration_seconds,
            metrics
        );
        if let Some(ref stderr) = outcome.stderr {
            for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
                eprintln!("      {}", line);
            }
        }
    }

    let failed = outcomes.iter().filter(|o| !o.succeeded()).count();
    if failed > 0 {
        warn!("{} of {} predictors failed", failed, outcomes.len());
        println!(
            "\n⚠️  {} predictor(s) failed; voting on whatever prediction files exist.",
            failed
        );
    } else {
        println!("\n✅ All predictors finished.");
    }

    Ok(outcomes)
}

/// Prediction files to vote on when predictors are not run.
fn vote_inputs(args: &Args, config: &Config) -> Vec<PathBuf> {
    match args.input {
        Some(ref inputs) => inputs.iter().map(|p| config.resolve(p)).collect(),
        None => config.default_prediction_paths(),
    }
}

/// Handle --dry-run: print what would run and which files would be voted on.
fn handle_dry_run(specs: &[PredictorSpec], inputs: &[PathBuf], config: &Config) -> Result<()> {
    let work_dir = config.work_dir();
    println!("\n🔍 Dry run: nothing will be executed or written...\n");

    if !specs.is_empty() {
        println!("   Predictors ({}):", specs.len());
        for spec in specs {
            println!(
                "     {}. {} {} -> {}",
                spec.index,
                config.predictors.interpreter,
                display_relative(&spec.script, &work_dir),
                display_relative(&spec.predictions, &work_dir)
            );
        }
        println!();
    }

    println!("   Prediction files ({}):", inputs.len());
    for path in inputs {
        let marker = if path.exists() { "📄" } else { "❔" };
        println!("     {} {}", marker, display_relative(path, &work_dir));
    }

    println!(
        "\n   Output: {}",
        display_relative(&config.output_path(), &work_dir)
    );
    println!("\n✅ Dry run complete.");
    Ok(())
}

/// Load configuration, merge CLI overrides and pin the working directory.
fn load_effective_config(args: &Args) -> Result<Config> {
    let mut config = load_config(args)?;
    config.merge_with_args(args);

    // A config file inside the working directory wins over the default one
    if args.config.is_none() {
        let dir = config.work_dir();
        if dir != Path::new(".") {
            if let Some(dir_config) = Config::load_from_dir(&dir)? {
                info!("Found {} in {}", config::CONFIG_FILE, dir.display());
                config = dir_config;
                config.merge_with_args(args);
                // keep the directory we found it in
                config.general.work_dir = dir.display().to_string();
            }
        }
    }

    // Scripts run with the working directory as cwd, so every path handed
    // to them must be absolute.
    let work_dir = std::fs::canonicalize(config.work_dir()).with_context(|| {
        format!(
            "Working directory not found: {}",
            config.general.work_dir
        )
    })?;
    config.general.work_dir = work_dir.display().to_string();

    Ok(config)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            // logging is not initialised yet
            eprintln!("⚠️  Failed to load config, using defaults: {:#}", e);
            Ok(Config::default())
        }
    }
}
