//! CLI command definitions for the vehicle price predictor

use clap::{Args, Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use carprice_core::{
    evaluate, evaluation::read_records, FeatureSchema, ModelHandle, ModelSlot, PredictionError,
    PredictionService, RawInput, ValidationOptions, Validator, DEFAULT_TARGET,
};

use super::output::{render, OutputFormat, PredictionOutput};
use super::{CliError, ExitCode};
use crate::config::ServerConfig;
use crate::telemetry::init_tracing;

const DEFAULT_MODEL_PATH: &str = "models/vehicle_price_model.json";

/// Vehicle price predictor
///
/// Serve the prediction API or run predictions, schema listings and model
/// evaluations from the command line.
#[derive(Parser, Debug)]
#[command(name = "carprice")]
#[command(about = "Vehicle price prediction service and tools", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP prediction API
    Serve(ServeArgs),

    /// Predict the price of a single vehicle
    Predict(PredictArgs),

    /// List the input features and their valid values
    Features(FeaturesArgs),

    /// Show metadata for a model artifact
    Inspect(InspectArgs),

    /// Score a model against labeled records (CSV or JSON)
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "CARPRICE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    pub host: Option<String>,

    /// Override the bind port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Override the model artifact path
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Reject unknown fields in prediction requests
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("source").required(true).args(["input", "json"])))]
pub struct PredictArgs {
    /// Path to the model artifact
    #[arg(short, long, env = "CARPRICE_MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model: PathBuf,

    /// File holding one JSON object of vehicle attributes (`-` for stdin)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Inline JSON object of vehicle attributes
    #[arg(long)]
    pub json: Option<String>,

    /// Reject unknown fields
    #[arg(long)]
    pub strict: bool,

    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct FeaturesArgs {
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Path to the model artifact
    #[arg(short, long, env = "CARPRICE_MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model: PathBuf,

    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Path to the model artifact
    #[arg(short, long, env = "CARPRICE_MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model: PathBuf,

    /// Labeled records; `.csv` files are read as CSV, anything else as a JSON array
    #[arg(short, long)]
    pub data: PathBuf,

    /// Column holding the observed price
    #[arg(short, long, default_value = DEFAULT_TARGET)]
    pub target: String,

    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Start the API server and block until it shuts down
pub fn execute_serve(args: ServeArgs) -> Result<ExitCode, CliError> {
    let mut config = ServerConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(model) = args.model {
        config.model_path = model;
    }
    if args.strict {
        config.strict_validation = true;
    }
    config.normalize();
    config.validate()?;

    init_tracing(config.effective_log_level(), config.effective_log_format())
        .map_err(|e| CliError::Server(e.to_string()))?;

    let runtime = tokio::runtime::Runtime::new().map_err(|e| CliError::Server(e.to_string()))?;
    runtime
        .block_on(crate::server::run(config))
        .map_err(|e| CliError::Server(format!("{:#}", e)))?;

    Ok(ExitCode::Success)
}

/// Validate, encode and price one record
pub fn execute_predict(args: PredictArgs) -> Result<ExitCode, CliError> {
    let raw = match (&args.json, &args.input) {
        (Some(json), _) => parse_record(json)?,
        (None, Some(path)) => parse_record(&read_input(path)?)?,
        (None, None) => {
            return Err(CliError::InvalidInput(
                "one of --input or --json is required".to_string(),
            ))
        }
    };

    let schema = Arc::new(FeatureSchema::vehicle());
    let handle = ModelHandle::load(&args.model, &schema)?;
    let slot = Arc::new(ModelSlot::empty(schema));
    slot.install(handle);

    let service = PredictionService::with_options(slot, ValidationOptions { strict: args.strict });
    let mut stdout = std::io::stdout().lock();

    match service.predict(&raw) {
        Ok(result) => {
            info!(price = result.price, confidence = result.confidence, "Prediction complete");
            render(&PredictionOutput::success(result), args.format, &mut stdout)?;
            Ok(ExitCode::Success)
        }
        Err(PredictionError::Rejected(errors)) => {
            render(&PredictionOutput::rejected(&errors), args.format, &mut stdout)?;
            Ok(ExitCode::PredictionRejected)
        }
        Err(err) => Err(err.into()),
    }
}

pub fn execute_features(args: FeaturesArgs) -> Result<ExitCode, CliError> {
    let description = FeatureSchema::vehicle().describe();
    render(&description, args.format, &mut std::io::stdout().lock())?;
    Ok(ExitCode::Success)
}

pub fn execute_inspect(args: InspectArgs) -> Result<ExitCode, CliError> {
    let schema = FeatureSchema::vehicle();
    let handle = ModelHandle::load(&args.model, &schema)?;
    render(handle.metadata(), args.format, &mut std::io::stdout().lock())?;
    Ok(ExitCode::Success)
}

pub fn execute_evaluate(args: EvaluateArgs) -> Result<ExitCode, CliError> {
    let schema = Arc::new(FeatureSchema::vehicle());
    let handle = ModelHandle::load(&args.model, &schema)?;
    let validator = Validator::new(schema);

    let records = read_records(&args.data)?;
    debug!(records = records.len(), data = %args.data.display(), "Loaded evaluation records");

    let report = evaluate(&handle, &validator, &records, &args.target)?;
    render(&report, args.format, &mut std::io::stdout().lock())?;
    Ok(ExitCode::Success)
}

fn read_input(path: &Path) -> Result<String, CliError> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| CliError::FileError(format!("stdin: {}", e)))?;
        return Ok(buffer);
    }
    std::fs::read_to_string(path)
        .map_err(|e| CliError::FileError(format!("{}: {}", path.display(), e)))
}

/// Parse a JSON object of vehicle attributes
pub(crate) fn parse_record(text: &str) -> Result<RawInput, CliError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| CliError::InvalidInput(format!("invalid JSON: {}", e)))?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(CliError::InvalidInput(
            "input must be a JSON object".to_string(),
        )),
    }
}
