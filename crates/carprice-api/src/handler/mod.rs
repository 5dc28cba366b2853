//! HTTP handler for the prediction API
//!
//! - `routes` - router, application state and endpoint handlers
//! - `middleware` - request ids, request logging and JSON 405 bodies
//!
//! Every response body is JSON with a `success` flag. Errors carry a stable
//! `error_type` alongside the human-readable `error` message.

pub mod middleware;
pub mod routes;

pub use routes::{create_router, ApiError, AppState};

use carprice_core::{ModelInfo, PredictionResult, SchemaDescription, ValidatedInput};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Successful `POST /predict` body
#[derive(Debug, Clone, Serialize)]
pub struct PredictResponse {
    pub success: bool,
    pub predicted_price: f64,
    pub formatted_price: String,
    pub confidence: f64,
    pub input_features: ValidatedInput,
}

impl From<PredictionResult> for PredictResponse {
    fn from(result: PredictionResult) -> Self {
        Self {
            success: true,
            predicted_price: result.price,
            formatted_price: result.formatted_price,
            confidence: result.confidence,
            input_features: result.input,
        }
    }
}

/// Error body shared by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error_type: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            error_type: error_type.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Model loaded and serving
    Healthy,
    /// Process up but no model loaded
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub model_loaded: bool,
    pub version: String,
    pub environment: String,
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_info: Option<ModelInfo>,
    /// Kind of the last model load failure (`not_found`, `parse`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfoResponse {
    pub success: bool,
    pub model_info: ModelInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeaturesResponse {
    pub success: bool,
    pub features: SchemaDescription,
}

/// Optional `POST /model/reload` body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReloadRequest {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReloadResponse {
    pub success: bool,
    pub model_info: ModelInfo,
    /// Number of models published since startup
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_shape() {
        let body = ErrorResponse::new("NotFoundError", "Endpoint not found");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error_type"], "NotFoundError");
        assert!(json.get("details").is_none());

        let body = body.with_details(serde_json::json!({"Year": "must be between 1900 and 2030"}));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["details"]["Year"], "must be between 1900 and 2030");
    }

    #[test]
    fn test_health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
    }

    #[test]
    fn test_reload_request_defaults() {
        let request: ReloadRequest = serde_json::from_str("{}").unwrap();
        assert!(request.path.is_none());
    }
}
