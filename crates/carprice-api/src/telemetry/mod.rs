//! Telemetry for the prediction server
//!
//! - `metrics` - Prometheus metrics for predictions and model reloads
//! - [`init_tracing`] - global `tracing` subscriber setup

pub mod metrics;

pub use metrics::{MetricsRegistry, PredictionMetrics, PredictionTimer};

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),

    #[error("Failed to encode metrics: {0}")]
    EncodingFailed(String),

    #[error("Failed to initialize tracing: {0}")]
    SubscriberInit(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(false)).try_init(),
    };
    result.map_err(|e| TelemetryError::SubscriberInit(e.to_string()))
}
