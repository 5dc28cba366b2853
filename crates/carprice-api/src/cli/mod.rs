//! CLI module for the vehicle price predictor
//!
//! Serves the HTTP API, runs one-off predictions, prints the feature schema,
//! inspects model artifacts and evaluates a model against labeled data.

pub mod commands;
pub mod output;

pub use commands::{Cli, Commands};
pub use output::{OutputFormat, PredictionOutput};

use colored::Colorize;
use thiserror::Error;

use carprice_core::{EvaluationError, LoadError, PredictionError};

use crate::config::ConfigError;

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful execution
    Success = 0,
    /// Prediction input failed validation
    PredictionRejected = 1,
    /// Invalid input or arguments
    InvalidInput = 3,
    /// File not found or inaccessible
    FileError = 4,
    /// Model artifact could not be loaded
    ModelError = 5,
    /// Internal error
    InternalError = 10,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

/// Errors surfaced by CLI commands
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File error: {0}")]
    FileError(String),

    #[error(transparent)]
    Model(#[from] LoadError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Prediction(#[from] PredictionError),

    #[error("Output error: {0}")]
    Output(String),

    #[error("Server error: {0}")]
    Server(String),
}

impl CliError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::InvalidInput(_) | CliError::Config(_) => ExitCode::InvalidInput,
            CliError::FileError(_) => ExitCode::FileError,
            CliError::Model(LoadError::NotFound(_) | LoadError::Io { .. }) => ExitCode::FileError,
            CliError::Model(_) => ExitCode::ModelError,
            CliError::Evaluation(EvaluationError::Io { .. }) => ExitCode::FileError,
            CliError::Evaluation(_) => ExitCode::InvalidInput,
            CliError::Prediction(PredictionError::Rejected(_)) => ExitCode::PredictionRejected,
            CliError::Prediction(_) | CliError::Output(_) | CliError::Server(_) => {
                ExitCode::InternalError
            }
        }
    }
}

/// Run the CLI with the given arguments and return the exit code
pub fn run(cli: Cli) -> ExitCode {
    let quiet = cli.quiet;
    // serve installs its own subscriber from the server config
    if !matches!(cli.command, Commands::Serve(_)) {
        init_cli_tracing(cli.verbose, quiet);
    }

    let result = match cli.command {
        Commands::Serve(args) => commands::execute_serve(args),
        Commands::Predict(args) => commands::execute_predict(args),
        Commands::Features(args) => commands::execute_features(args),
        Commands::Inspect(args) => commands::execute_inspect(args),
        Commands::Evaluate(args) => commands::execute_evaluate(args),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            if !quiet {
                eprintln!("{} {}", "error:".red().bold(), err);
            }
            err.exit_code()
        }
    }
}

fn init_cli_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::WARN,
        (false, 1) => tracing::Level::INFO,
        (false, 2) => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
