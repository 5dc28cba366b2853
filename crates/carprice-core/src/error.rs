//! Error types for the prediction pipeline
//!
//! Each stage of the pipeline owns a dedicated error enum. The request-level
//! [`PredictionError`] folds them into the three outcomes callers see:
//! rejected input, unavailable service, and internal failure.

use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationErrors;

/// Errors raised while building a [`FeatureSchema`](crate::schema::FeatureSchema)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Duplicate feature name: {0}")]
    DuplicateField(String),

    #[error("Categorical feature {0} has no allowed values")]
    EmptyCategories(String),

    #[error("Categorical feature {field} lists {category} more than once")]
    DuplicateCategory { field: String, category: String },

    #[error("Numeric feature {field} has min {min} greater than max {max}")]
    InvalidRange { field: String, min: i64, max: i64 },
}

/// Errors raised while loading a model artifact
#[derive(Error, Debug)]
pub enum LoadError {
    /// Artifact file does not exist
    #[error("Model artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Artifact exists but could not be read
    #[error("Failed to read model artifact {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Artifact is not a well-formed model document
    #[error("Failed to parse model artifact: {0}")]
    Parse(String),

    #[error("Unsupported artifact format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// Artifact is well-formed but does not fit the feature schema
    #[error("Model artifact is incompatible: {0}")]
    Incompatible(String),

    /// Reload requested but no artifact path was ever configured
    #[error("No model path configured")]
    NoSource,
}

impl LoadError {
    pub fn incompatible(msg: impl Into<String>) -> Self {
        LoadError::Incompatible(msg.into())
    }

    /// Stable, detail-free label for status reporting
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::NotFound(_) => "not_found",
            LoadError::Io { .. } => "io",
            LoadError::Parse(_) => "parse",
            LoadError::UnsupportedVersion { .. } => "unsupported_version",
            LoadError::Incompatible(_) => "incompatible",
            LoadError::NoSource => "no_source",
        }
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        LoadError::Parse(err.to_string())
    }
}

/// Errors raised by the feature encoder
///
/// These only occur when the encoder receives a record that was not produced
/// by a validator for the same schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Validated input is missing field {0}")]
    MissingField(String),

    #[error("Field {field} holds a value of the wrong type (expected {expected})")]
    TypeMismatch { field: String, expected: &'static str },
}

/// Errors raised while scoring a feature vector
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictError {
    #[error("Feature vector has {actual} values, model expects {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Model produced a non-finite output: {0}")]
    NonFinite(f64),
}

/// Terminal failure states of a prediction request
#[derive(Error, Debug)]
pub enum PredictionError {
    /// Input failed validation; the caller can correct it
    #[error("Validation error: {0}")]
    Rejected(ValidationErrors),

    /// No model is loaded
    #[error("Model is not loaded")]
    Unavailable,

    #[error("Feature encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("Model prediction failed: {0}")]
    Predict(#[from] PredictError),
}

impl PredictionError {
    /// Stable machine-readable error kind
    pub fn error_type(&self) -> &'static str {
        match self {
            PredictionError::Rejected(_) => "ValidationError",
            PredictionError::Unavailable => "ServiceUnavailable",
            PredictionError::Encode(_) | PredictionError::Predict(_) => "InternalError",
        }
    }

    /// Message that is safe to hand to a caller
    pub fn public_message(&self) -> String {
        match self {
            PredictionError::Rejected(errors) => format!("Validation error: {}", errors),
            PredictionError::Unavailable => "Model is not loaded".to_string(),
            PredictionError::Encode(_) | PredictionError::Predict(_) => {
                "Internal server error".to_string()
            }
        }
    }

    /// Check if this is a user-facing error (vs internal)
    pub fn is_user_error(&self) -> bool {
        matches!(self, PredictionError::Rejected(_))
    }

    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            PredictionError::Rejected(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Errors raised by offline evaluation
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Failed to read dataset {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse dataset: {0}")]
    Parse(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Dataset contains no usable samples")]
    NoSamples,
}

impl From<serde_json::Error> for EvaluationError {
    fn from(err: serde_json::Error) -> Self {
        EvaluationError::Parse(format!("JSON error: {}", err))
    }
}

/// Result type alias for artifact loading
pub type Result<T> = std::result::Result<T, LoadError>;
