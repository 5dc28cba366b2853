//! Route definitions for the prediction API
//!
//! All routes are mounted under the configured prefix (`/api/v1` by default):
//! - POST /predict - Price prediction for one vehicle
//! - GET /health - Liveness plus model status
//! - GET /model/info - Metadata of the loaded model
//! - GET /features - Accepted fields and their domains
//! - POST /model/reload - Reload the model artifact
//! - GET /metrics - Prometheus exposition

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use carprice_core::{
    LoadError, ModelSlot, PredictionError, PredictionService, RawInput, ValidationOptions,
};

use super::middleware::{json_method_not_allowed, request_logging_middleware};
use super::{
    ErrorResponse, FeaturesResponse, HealthResponse, HealthStatus, ModelInfoResponse,
    PredictResponse, ReloadRequest, ReloadResponse,
};
use crate::config::ServerConfig;
use crate::telemetry::MetricsRegistry;

/// State shared across all routes
#[derive(Clone)]
pub struct AppState {
    pub service: PredictionService,
    pub metrics: MetricsRegistry,
    pub config: Arc<ServerConfig>,
    /// Start time for uptime calculation
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig, slot: Arc<ModelSlot>, metrics: MetricsRegistry) -> Self {
        let options = ValidationOptions {
            strict: config.strict_validation,
        };
        metrics.prediction().set_model_loaded(slot.is_loaded());
        Self {
            service: PredictionService::with_options(slot, options),
            metrics,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    pub fn slot(&self) -> &Arc<ModelSlot> {
        self.service.slot()
    }
}

/// API error types
#[derive(Debug)]
pub enum ApiError {
    Prediction(PredictionError),
    UnsupportedContentType,
    InvalidBody(String),
    PayloadTooLarge,
    NotFound,
    MethodNotAllowed,
    ModelNotLoaded,
    ReloadPathNotAllowed,
    ModelLoad(LoadError),
    Internal(String),
}

impl ApiError {
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Prediction(err) => err.error_type(),
            ApiError::UnsupportedContentType => "ContentTypeError",
            ApiError::InvalidBody(_) => "ValidationError",
            ApiError::PayloadTooLarge => "PayloadTooLargeError",
            ApiError::NotFound => "NotFoundError",
            ApiError::MethodNotAllowed => "MethodNotAllowedError",
            ApiError::ModelNotLoaded => "ServiceUnavailable",
            ApiError::ReloadPathNotAllowed => "ForbiddenError",
            ApiError::ModelLoad(_) => "ModelLoadError",
            ApiError::Internal(_) => "InternalError",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Prediction(PredictionError::Rejected(_)) => StatusCode::BAD_REQUEST,
            ApiError::Prediction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::UnsupportedContentType | ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::ReloadPathNotAllowed => StatusCode::FORBIDDEN,
            ApiError::ModelNotLoaded | ApiError::ModelLoad(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Caller-facing message; never includes internal detail
    pub fn message(&self) -> String {
        match self {
            ApiError::Prediction(err) => err.public_message(),
            ApiError::UnsupportedContentType => "Content-Type must be application/json".to_string(),
            ApiError::InvalidBody(msg) => msg.clone(),
            ApiError::PayloadTooLarge => "Request body is too large".to_string(),
            ApiError::NotFound => "Endpoint not found".to_string(),
            ApiError::MethodNotAllowed => "Method not allowed".to_string(),
            ApiError::ModelNotLoaded => "Model is not loaded".to_string(),
            ApiError::ReloadPathNotAllowed => {
                "Reloading from a custom path is disabled".to_string()
            }
            ApiError::ModelLoad(_) => "Failed to load model".to_string(),
            ApiError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl From<PredictionError> for ApiError {
    fn from(err: PredictionError) -> Self {
        ApiError::Prediction(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = ErrorResponse::new(self.error_type(), self.message());
        if let ApiError::Prediction(PredictionError::Rejected(errors)) = &self {
            body = body.with_details(Value::Object(errors.to_map()));
        }
        (status, Json(body)).into_response()
    }
}

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Prediction
        .route("/predict", post(predict))
        // Discovery and health
        .route("/health", get(health_check))
        .route("/model/info", get(model_info))
        .route("/features", get(features))
        // Operations
        .route("/model/reload", post(reload_model))
        .route("/metrics", get(metrics));

    let prefix = state.config.api_prefix.clone();
    let router = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(&prefix, api)
    };

    let body_limit = state.config.max_body_bytes;
    let cors = cors_layer(&state.config);

    router
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(json_method_not_allowed))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    if config.cors_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
        })
        .unwrap_or(false)
}

fn read_body(body: Result<Bytes, BytesRejection>) -> Result<Bytes, ApiError> {
    body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::InvalidBody(rejection.body_text())
        }
    })
}

/// Prediction handler
async fn predict(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    if !is_json(&headers) {
        return Err(ApiError::UnsupportedContentType);
    }
    let body = read_body(body)?;

    let raw: RawInput = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            return Err(ApiError::InvalidBody(
                "Request body must be a JSON object".to_string(),
            ))
        }
        Err(err) => return Err(ApiError::InvalidBody(format!("Invalid JSON: {}", err))),
    };

    let timer = state.metrics.prediction().start_timer();
    let result = state.service.predict(&raw);
    timer.finish(&result, |r| (r.price, r.confidence));

    Ok(Json(PredictResponse::from(result?)))
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.slot().status();
    let handle = state.slot().current();
    state.metrics.prediction().set_model_loaded(handle.is_some());

    Json(HealthResponse {
        status: if handle.is_some() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        },
        model_loaded: handle.is_some(),
        version: state.config.api_version.clone(),
        environment: state.config.environment.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        model_info: handle.map(|h| h.metadata().clone()),
        last_error: status.last_error,
    })
}

/// Loaded model metadata
async fn model_info(State(state): State<AppState>) -> Result<Json<ModelInfoResponse>, ApiError> {
    let handle = state.slot().current().ok_or(ApiError::ModelNotLoaded)?;
    Ok(Json(ModelInfoResponse {
        success: true,
        model_info: handle.metadata().clone(),
    }))
}

/// Feature schema
async fn features(State(state): State<AppState>) -> Json<FeaturesResponse> {
    Json(FeaturesResponse {
        success: true,
        features: state.service.validator().schema().describe(),
    })
}

/// Reload the model artifact
///
/// An empty body reloads the configured path. A `{"path": ...}` body is only
/// honoured when `allow_reload_path` is enabled.
async fn reload_model(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ReloadResponse>, ApiError> {
    let body = read_body(body)?;
    let request: ReloadRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ReloadRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| ApiError::InvalidBody(format!("Invalid JSON: {}", err)))?
    };

    let path = match request.path {
        Some(_) if !state.config.allow_reload_path => return Err(ApiError::ReloadPathNotAllowed),
        Some(path) => path,
        None => state.config.model_path.clone(),
    };

    let slot = Arc::clone(state.slot());
    let reload_path = path.clone();
    let outcome = tokio::task::spawn_blocking(move || slot.reload_from(&reload_path))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    match outcome {
        Ok(handle) => {
            state.metrics.prediction().record_reload(true);
            state.metrics.prediction().set_model_loaded(true);
            info!(model_path = %path.display(), "Model reloaded via API");
            Ok(Json(ReloadResponse {
                success: true,
                model_info: handle.metadata().clone(),
                generation: state.slot().status().generation,
            }))
        }
        Err(err) => {
            state.metrics.prediction().record_reload(false);
            state
                .metrics
                .prediction()
                .set_model_loaded(state.slot().is_loaded());
            error!(model_path = %path.display(), error = %err, "Model reload failed");
            Err(ApiError::ModelLoad(err))
        }
    }
}

/// Prometheus text exposition
async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    state
        .metrics
        .prediction()
        .set_model_loaded(state.slot().is_loaded());
    let text = state
        .metrics
        .encode_text()
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        text,
    )
        .into_response())
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}
