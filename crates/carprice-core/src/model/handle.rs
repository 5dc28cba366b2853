//! Loaded model handle
//!
//! A [`ModelHandle`] bundles a checked estimator with the encoder for its
//! column layout and a metadata snapshot. Handles are immutable once built.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};

use super::artifact::{ArtifactMetrics, ModelArtifact, FORMAT_VERSION};
use super::estimator::{self, Regressor};
use crate::encoder::{FeatureEncoder, FeatureVector};
use crate::error::{EncodeError, LoadError, PredictError};
use crate::schema::FeatureSchema;
use crate::validation::ValidatedInput;

/// Confidence reported for non-ensemble models without a recorded R²
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Metadata describing the loaded model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    /// Estimator class name recorded by the training pipeline
    pub model_type: String,
    /// `forest`, `boosting` or `linear`
    pub estimator: String,
    pub format_version: u32,
    pub loaded_at: DateTime<Utc>,
    pub source_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<String>,
    pub feature_names: Vec<String>,
    pub n_features: usize,
    pub n_estimators: usize,
    /// SHA-256 of the artifact bytes, hex encoded
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ArtifactMetrics>,
}

/// Price and confidence for one vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub price: f64,
    pub confidence: f64,
}

#[derive(Debug)]
pub struct ModelHandle {
    regressor: Box<dyn Regressor>,
    encoder: FeatureEncoder,
    info: ModelInfo,
}

impl ModelHandle {
    /// Read and check the artifact at `path`
    pub fn load(path: impl AsRef<Path>, schema: &FeatureSchema) -> Result<Self, LoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_slice(&bytes, path.display().to_string(), schema)
    }

    /// Build a handle from artifact bytes; `source` is recorded as the origin
    pub fn from_slice(
        bytes: &[u8],
        source: impl Into<String>,
        schema: &FeatureSchema,
    ) -> Result<Self, LoadError> {
        let source = source.into();
        let artifact = ModelArtifact::from_slice(bytes)?;
        debug!(
            source_path = %source,
            columns = artifact.columns.len(),
            estimator = artifact.estimator.kind(),
            "Parsed model artifact"
        );

        let encoder = FeatureEncoder::new(schema, artifact.columns)?;
        let regressor = estimator::build(&artifact.estimator, encoder.width())?;

        if let Some(metrics) = &artifact.metrics {
            let all_finite = [metrics.r2, metrics.rmse, metrics.mae]
                .iter()
                .flatten()
                .all(|v| v.is_finite());
            if !all_finite {
                return Err(LoadError::incompatible("artifact metrics must be finite"));
            }
        }

        let info = ModelInfo {
            model_type: artifact.model_type,
            estimator: artifact.estimator.kind().to_string(),
            format_version: FORMAT_VERSION,
            loaded_at: Utc::now(),
            source_path: source,
            trained_at: artifact.trained_at,
            feature_names: encoder.feature_names(),
            n_features: encoder.width(),
            n_estimators: regressor.n_estimators(),
            sha256: hex::encode(Sha256::digest(bytes)),
            metrics: artifact.metrics,
        };

        info!(
            model_type = %info.model_type,
            source_path = %info.source_path,
            n_features = info.n_features,
            n_estimators = info.n_estimators,
            "Model loaded"
        );

        Ok(Self {
            regressor,
            encoder,
            info,
        })
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn encode(&self, input: &ValidatedInput) -> Result<FeatureVector, EncodeError> {
        self.encoder.encode(input)
    }

    /// Point prediction, clamped at zero
    pub fn predict(&self, vector: &FeatureVector) -> Result<f64, PredictError> {
        self.check_shape(vector)?;
        let raw = self.regressor.predict_raw(vector.as_slice());
        finite(raw).map(|price| price.max(0.0))
    }

    /// Prediction plus a confidence score in `[0, 1]`
    ///
    /// Ensembles derive confidence from the spread of their members:
    /// `1 / (1 + std / max(|mean|, 1))`. Other models report their recorded
    /// R² or [`DEFAULT_CONFIDENCE`].
    pub fn predict_with_confidence(&self, vector: &FeatureVector) -> Result<Prediction, PredictError> {
        self.check_shape(vector)?;
        let features = vector.as_slice();

        let (raw, confidence) = match self.regressor.estimator_outputs(features) {
            Some(outputs) if !outputs.is_empty() => {
                let n = outputs.len() as f64;
                let mean = outputs.iter().sum::<f64>() / n;
                let variance = outputs.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
                let std = variance.sqrt();
                (mean, 1.0 / (1.0 + std / mean.abs().max(1.0)))
            }
            _ => {
                let recorded = self.info.metrics.as_ref().and_then(|m| m.r2);
                (
                    self.regressor.predict_raw(features),
                    recorded.unwrap_or(DEFAULT_CONFIDENCE),
                )
            }
        };

        let price = finite(raw)?.max(0.0);
        let confidence = finite(confidence)?.clamp(0.0, 1.0);
        Ok(Prediction { price, confidence })
    }

    pub fn metadata(&self) -> &ModelInfo {
        &self.info
    }

    fn check_shape(&self, vector: &FeatureVector) -> Result<(), PredictError> {
        let expected = self.regressor.n_features();
        if vector.len() != expected {
            return Err(PredictError::ShapeMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

fn finite(value: f64) -> Result<f64, PredictError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PredictError::NonFinite(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::EncodedColumn;
    use serde_json::json;

    fn artifact(estimator: serde_json::Value, metrics: Option<serde_json::Value>) -> Vec<u8> {
        let schema = FeatureSchema::vehicle();
        let columns = FeatureEncoder::canonical_columns(&schema);
        let mut doc = json!({
            "format_version": 1,
            "model_type": "TestRegressor",
            "columns": columns,
            "estimator": estimator,
        });
        if let Some(metrics) = metrics {
            doc["metrics"] = metrics;
        }
        doc.to_string().into_bytes()
    }

    fn forest(leaves: &[f64]) -> serde_json::Value {
        let trees: Vec<serde_json::Value> = leaves
            .iter()
            .map(|v| json!({"nodes": [{"value": v}]}))
            .collect();
        json!({"type": "forest", "trees": trees})
    }

    fn zeros() -> FeatureVector {
        FeatureVector::from(vec![0.0; 29])
    }

    #[test]
    fn test_metadata() {
        let bytes = artifact(forest(&[1.0, 2.0, 3.0]), None);
        let handle = ModelHandle::from_slice(&bytes, "memory", &FeatureSchema::vehicle()).unwrap();
        let info = handle.metadata();
        assert_eq!(info.model_type, "TestRegressor");
        assert_eq!(info.estimator, "forest");
        assert_eq!(info.n_estimators, 3);
        assert_eq!(info.n_features, 29);
        assert_eq!(info.feature_names[0], "Year");
        assert_eq!(info.source_path, "memory");
        assert_eq!(info.sha256.len(), 64);
    }

    #[test]
    fn test_forest_confidence() {
        let bytes = artifact(forest(&[100.0, 100.0]), None);
        let handle = ModelHandle::from_slice(&bytes, "memory", &FeatureSchema::vehicle()).unwrap();
        let p = handle.predict_with_confidence(&zeros()).unwrap();
        assert_eq!(p.price, 100.0);
        assert_eq!(p.confidence, 1.0);

        let bytes = artifact(forest(&[50.0, 150.0]), None);
        let handle = ModelHandle::from_slice(&bytes, "memory", &FeatureSchema::vehicle()).unwrap();
        let p = handle.predict_with_confidence(&zeros()).unwrap();
        assert_eq!(p.price, 100.0);
        assert!((p.confidence - 1.0 / 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_negative_output_clamped() {
        let bytes = artifact(forest(&[-500.0, -100.0]), None);
        let handle = ModelHandle::from_slice(&bytes, "memory", &FeatureSchema::vehicle()).unwrap();
        assert_eq!(handle.predict(&zeros()).unwrap(), 0.0);
        let p = handle.predict_with_confidence(&zeros()).unwrap();
        assert_eq!(p.price, 0.0);
        assert!((0.0..=1.0).contains(&p.confidence));
    }

    #[test]
    fn test_non_ensemble_confidence() {
        let linear = json!({"type": "linear", "intercept": 5000.0, "coefficients": vec![0.0; 29]});

        let bytes = artifact(linear.clone(), Some(json!({"r2": 0.93})));
        let handle = ModelHandle::from_slice(&bytes, "memory", &FeatureSchema::vehicle()).unwrap();
        let p = handle.predict_with_confidence(&zeros()).unwrap();
        assert_eq!(p.price, 5000.0);
        assert_eq!(p.confidence, 0.93);

        let bytes = artifact(linear.clone(), Some(json!({"r2": -0.2})));
        let handle = ModelHandle::from_slice(&bytes, "memory", &FeatureSchema::vehicle()).unwrap();
        assert_eq!(handle.predict_with_confidence(&zeros()).unwrap().confidence, 0.0);

        let bytes = artifact(linear, None);
        let handle = ModelHandle::from_slice(&bytes, "memory", &FeatureSchema::vehicle()).unwrap();
        assert_eq!(
            handle.predict_with_confidence(&zeros()).unwrap().confidence,
            DEFAULT_CONFIDENCE
        );
    }

    #[test]
    fn test_shape_mismatch() {
        let bytes = artifact(forest(&[1.0]), None);
        let handle = ModelHandle::from_slice(&bytes, "memory", &FeatureSchema::vehicle()).unwrap();
        let err = handle.predict(&FeatureVector::from(vec![0.0; 3])).unwrap_err();
        assert_eq!(
            err,
            PredictError::ShapeMismatch {
                expected: 29,
                actual: 3
            }
        );
    }

    #[test]
    fn test_incompatible_columns_fail_load() {
        let doc = json!({
            "format_version": 1,
            "model_type": "TestRegressor",
            "columns": [EncodedColumn::numeric("Year"), EncodedColumn::numeric("Mileage")],
            "estimator": {"type": "forest", "trees": [{"nodes": [{"value": 1.0}]}]},
        });
        let err = ModelHandle::from_slice(
            doc.to_string().as_bytes(),
            "memory",
            &FeatureSchema::vehicle(),
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::Incompatible(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ModelHandle::load("does/not/exist.json", &FeatureSchema::vehicle()).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }
}
