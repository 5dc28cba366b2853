//! Serialized model artifact
//!
//! The training pipeline exports a JSON document holding the column layout,
//! the fitted estimator and optional offline metrics.

use serde::{Deserialize, Serialize};

use crate::encoder::EncodedColumn;
use crate::error::LoadError;

/// Artifact format version this crate reads
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub model_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub columns: Vec<EncodedColumn>,
    pub estimator: EstimatorSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ArtifactMetrics>,
}

impl ModelArtifact {
    /// Parse an artifact, checking the format version first
    pub fn from_slice(bytes: &[u8]) -> Result<Self, LoadError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        let version = value
            .get("format_version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| LoadError::Parse("missing format_version".to_string()))?;
        if version != u64::from(FORMAT_VERSION) {
            return Err(LoadError::UnsupportedVersion {
                found: u32::try_from(version).unwrap_or(u32::MAX),
                expected: FORMAT_VERSION,
            });
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// Fitted estimator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EstimatorSpec {
    /// Averaged regression trees
    Forest { trees: Vec<TreeSpec> },
    /// `base_score + learning_rate * sum(trees)`
    Boosting {
        base_score: f64,
        learning_rate: f64,
        trees: Vec<TreeSpec>,
    },
    Linear {
        intercept: f64,
        coefficients: Vec<f64>,
    },
}

impl EstimatorSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            EstimatorSpec::Forest { .. } => "forest",
            EstimatorSpec::Boosting { .. } => "boosting",
            EstimatorSpec::Linear { .. } => "linear",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeSpec {
    pub nodes: Vec<NodeSpec>,
}

/// Tree node; splits send `x[feature] <= threshold` to `left`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeSpec {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Offline accuracy recorded at training time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rmse: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mae: Option<f64>,
}
