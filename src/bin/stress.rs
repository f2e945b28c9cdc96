//! Stress CLI - Command-line interface for Synheart Stress
//!
//! Commands:
//! - train: Fit a classifier and optionally write the artifact
//! - predict: Score activity records or feature maps
//! - evaluate: Evaluate an artifact on a generated test set
//! - schema: Print the feature schema
//! - doctor: Diagnose installation and artifact health

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use synheart_stress::encoder::StressPayload;
use synheart_stress::evaluator::EvaluationConfig;
use synheart_stress::forest::ForestConfig;
use synheart_stress::insights::ImportanceAnalysis;
use synheart_stress::pipeline::StressEngine;
use synheart_stress::schema::FeatureSchema;
use synheart_stress::trainer::{TrainConfig, DEFAULT_N_SAMPLES};
use synheart_stress::{ModelArtifact, StressError, PRODUCER_NAME, STRESS_VERSION};

/// Stress - Digital stress risk scoring and classification
#[derive(Parser)]
#[command(name = "stress")]
#[command(author = "Synheart AI Inc")]
#[command(version = STRESS_VERSION)]
#[command(about = "Classify digital-behavior stress risk", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct TrainArgs {
    /// Corpus seed (omit for a time-derived seed)
    #[arg(long)]
    seed: Option<u64>,

    /// Number of synthetic training samples
    #[arg(long, default_value_t = DEFAULT_N_SAMPLES)]
    samples: usize,

    /// Number of trees in the forest
    #[arg(long, default_value = "300")]
    trees: usize,
}

impl TrainArgs {
    fn config(&self) -> TrainConfig {
        TrainConfig {
            seed: self.seed,
            n_samples: self.samples,
            forest: ForestConfig {
                n_estimators: self.trees,
                ..ForestConfig::default()
            },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Train a classifier on a synthetic corpus
    Train {
        #[command(flatten)]
        train: TrainArgs,

        /// Write the artifact JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score activity records or feature maps
    Predict {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Use a saved artifact instead of training
        #[arg(long)]
        artifact: Option<PathBuf>,

        #[command(flatten)]
        train: TrainArgs,
    },

    /// Evaluate a classifier on a generated test set
    Evaluate {
        /// Use a saved artifact instead of training
        #[arg(long)]
        artifact: Option<PathBuf>,

        #[command(flatten)]
        train: TrainArgs,

        /// Seed of the generated test set
        #[arg(long, default_value = "123")]
        test_seed: u64,

        /// Number of generated test samples
        #[arg(long, default_value = "500")]
        test_samples: usize,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the feature schema
    Schema {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose installation and artifact health
    Doctor {
        /// Check an artifact file
        #[arg(long)]
        artifact: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one request per line)
    Ndjson,
    /// One JSON document holding a request or an array of requests
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one payload per line)
    Ndjson,
    /// JSON array of payloads
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), StressCliError> {
    match cli.command {
        Commands::Train {
            train,
            output,
            json,
        } => cmd_train(&train, output.as_deref(), json),
        Commands::Predict {
            input,
            input_format,
            output_format,
            artifact,
            train,
        } => cmd_predict(&input, input_format, output_format, artifact.as_deref(), &train),
        Commands::Evaluate {
            artifact,
            train,
            test_seed,
            test_samples,
            json,
        } => {
            let config = EvaluationConfig {
                test_seed,
                n_test_samples: test_samples,
                ..EvaluationConfig::default()
            };
            cmd_evaluate(artifact.as_deref(), &train, config, json)
        }
        Commands::Schema { json } => cmd_schema(json),
        Commands::Doctor { artifact, json } => cmd_doctor(artifact.as_deref(), json),
    }
}

fn read_input(input: &Path) -> Result<String, StressCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

/// Load a saved artifact, or train one from the flags
fn load_engine(artifact: Option<&Path>, train: &TrainArgs) -> Result<StressEngine, StressCliError> {
    match artifact {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            Ok(StressEngine::from_artifact(ModelArtifact::from_json(&json)?)?)
        }
        None => Ok(StressEngine::train(&train.config())?),
    }
}

#[derive(serde::Serialize)]
struct TrainSummary {
    artifact_id: String,
    seed: u64,
    origin: String,
    n_samples: usize,
    n_trees: usize,
    oob_accuracy: Option<f64>,
    class_distribution: [usize; 3],
    importance: ImportanceAnalysis,
}

fn cmd_train(train: &TrainArgs, output: Option<&Path>, json: bool) -> Result<(), StressCliError> {
    let engine = StressEngine::train(&train.config())?;
    let artifact = engine.current();

    if let Some(path) = output {
        fs::write(path, engine.save_artifact()?)?;
    }

    let summary = TrainSummary {
        artifact_id: artifact.artifact_id.to_string(),
        seed: artifact.seed,
        origin: format!("{:?}", artifact.origin).to_lowercase(),
        n_samples: artifact.n_samples,
        n_trees: artifact.forest.n_trees(),
        oob_accuracy: artifact.oob_accuracy(),
        class_distribution: artifact.class_distribution,
        importance: ImportanceAnalysis::from_weights(&artifact.global_importance()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Training Summary");
        println!("================");
        println!("Artifact: {}", summary.artifact_id);
        println!("Seed:     {}", summary.seed);
        println!("Origin:   {}", summary.origin);
        println!("Samples:  {}", summary.n_samples);
        println!("Trees:    {}", summary.n_trees);
        match summary.oob_accuracy {
            Some(oob) => println!("OOB accuracy: {:.1}%", oob * 100.0),
            None => println!("OOB accuracy: n/a"),
        }
        println!(
            "Distribution: Rendah={} Sedang={} Tinggi={}",
            summary.class_distribution[0],
            summary.class_distribution[1],
            summary.class_distribution[2]
        );
        println!("\nTop features:");
        for ranked in summary.importance.features.iter().take(5) {
            println!(
                "  {}. {:<22} {:.3} ({:.1}%)  {}",
                ranked.rank,
                ranked.feature.as_str(),
                ranked.importance,
                ranked.percentage,
                ranked.interpretation
            );
        }
        println!(
            "Top 3 share: {:.1}%  Focus: {:?}",
            summary.importance.top3_cumulative_percentage, summary.importance.focus
        );
        if let Some(path) = output {
            println!("\nArtifact written to {}", path.display());
        }
    }
    Ok(())
}

fn cmd_predict(
    input: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    artifact: Option<&Path>,
    train: &TrainArgs,
) -> Result<(), StressCliError> {
    let input_data = read_input(input)?;

    let documents: Vec<&str> = match input_format {
        InputFormat::Ndjson => input_data
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect(),
        InputFormat::Json => vec![input_data.as_str()],
    };
    if documents.is_empty() {
        return Err(StressCliError::NoRequests);
    }

    let engine = load_engine(artifact, train)?;

    let mut payloads: Vec<StressPayload> = Vec::new();
    for document in documents {
        for payload_json in engine.predict_json(document)? {
            payloads.push(serde_json::from_str(&payload_json)?);
        }
    }
    if payloads.is_empty() {
        return Err(StressCliError::NoRequests);
    }

    print!("{}", format_output(&payloads, &output_format)?);
    Ok(())
}

fn format_output(
    payloads: &[StressPayload],
    format: &OutputFormat,
) -> Result<String, StressCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for payload in payloads {
                lines.push(serde_json::to_string(payload)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(payloads)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(payloads)? + "\n"),
    }
}

fn cmd_evaluate(
    artifact: Option<&Path>,
    train: &TrainArgs,
    config: EvaluationConfig,
    json: bool,
) -> Result<(), StressCliError> {
    let engine = load_engine(artifact, train)?.with_evaluation_config(config);
    let report = engine.evaluate(None)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_report());
    }
    Ok(())
}

fn cmd_schema(json: bool) -> Result<(), StressCliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(FeatureSchema::specs())?);
        return Ok(());
    }

    println!("Feature Schema ({} features)", FeatureSchema::specs().len());
    println!();
    println!(
        "  {:<3} {:<22} {:<16} {:>7} {:>7} {:>8}",
        "#", "name", "role", "min", "max", "example"
    );
    for (i, spec) in FeatureSchema::specs().iter().enumerate() {
        println!(
            "  {:<3} {:<22} {:<16} {:>7} {:>7} {:>8}",
            i,
            spec.name,
            format!("{:?}", spec.role),
            spec.min,
            spec.max,
            spec.example
        );
    }
    println!();
    println!("Values outside a feature's range are clamped before scoring.");
    println!("Classes: Rendah (Low), Sedang (Medium), Tinggi (High)");
    Ok(())
}

fn cmd_doctor(artifact: Option<&Path>, json: bool) -> Result<(), StressCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "stress_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Stress version {}", STRESS_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} model features", FeatureSchema::specs().len()),
    });

    if let Some(path) = artifact {
        checks.push(check_artifact(path));
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (predict input ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: STRESS_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Stress Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(StressCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_artifact(path: &Path) -> DoctorCheck {
    let (status, message) = if !path.exists() {
        (CheckStatus::Warning, "Artifact file does not exist".to_string())
    } else {
        match fs::read_to_string(path) {
            Err(e) => (CheckStatus::Error, format!("Cannot read artifact file: {e}")),
            Ok(content) => match ModelArtifact::from_json(&content) {
                Ok(artifact) => (
                    CheckStatus::Ok,
                    format!(
                        "Artifact {} valid ({} trees, trained {})",
                        artifact.artifact_id,
                        artifact.forest.n_trees(),
                        artifact.trained_at.to_rfc3339()
                    ),
                ),
                Err(e) => (CheckStatus::Error, format!("Invalid artifact: {e}")),
            },
        }
    };
    DoctorCheck {
        name: "artifact".to_string(),
        status,
        message,
    }
}

#[derive(Debug)]
enum StressCliError {
    Io(io::Error),
    Engine(StressError),
    Json(serde_json::Error),
    NoRequests,
    DoctorFailed,
}

impl From<io::Error> for StressCliError {
    fn from(e: io::Error) -> Self {
        StressCliError::Io(e)
    }
}

impl From<StressError> for StressCliError {
    fn from(e: StressError) -> Self {
        StressCliError::Engine(e)
    }
}

impl From<serde_json::Error> for StressCliError {
    fn from(e: serde_json::Error) -> Self {
        StressCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<StressCliError> for CliError {
    fn from(e: StressCliError) -> Self {
        match e {
            StressCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            StressCliError::Engine(e) if e.is_schema_error() => CliError {
                code: "SCHEMA_MISMATCH".to_string(),
                message: e.to_string(),
                hint: Some("Run 'stress schema' for the expected feature names".to_string()),
            },
            StressCliError::Engine(e @ StressError::InvalidConfig(_)) => CliError {
                code: "INVALID_CONFIG".to_string(),
                message: e.to_string(),
                hint: Some("Check --samples and --trees".to_string()),
            },
            StressCliError::Engine(e @ StressError::TrainingFailure(_)) => CliError {
                code: "TRAINING_FAILED".to_string(),
                message: e.to_string(),
                hint: Some("Retry with a different --seed".to_string()),
            },
            StressCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            StressCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            StressCliError::NoRequests => CliError {
                code: "NO_REQUESTS".to_string(),
                message: "No requests found in input".to_string(),
                hint: Some("Ensure input is not empty".to_string()),
            },
            StressCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the errors above".to_string()),
            },
        }
    }
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
