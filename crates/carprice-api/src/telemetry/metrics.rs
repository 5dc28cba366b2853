//! Prometheus metrics for the prediction server
//!
//! - `carprice_prediction_requests_total` (counter) - requests by outcome
//! - `carprice_prediction_duration_seconds` (histogram) - pipeline latency by outcome
//! - `carprice_predicted_price` (histogram) - distribution of returned prices
//! - `carprice_prediction_confidence` (histogram) - distribution of confidence scores
//! - `carprice_validation_field_errors_total` (counter) - rejected fields
//! - `carprice_model_loaded` (gauge) - 1 when a model is being served
//! - `carprice_model_reloads_total` (counter) - reload attempts by result

use prometheus::{CounterVec, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;
use std::time::Instant;

use carprice_core::{PredictionError, ValidationErrors};

use super::{Result, TelemetryError};

const NAMESPACE: &str = "carprice";

/// Request outcome label for a prediction error
pub fn outcome_label(error: &PredictionError) -> &'static str {
    match error {
        PredictionError::Rejected(_) => "rejected",
        PredictionError::Unavailable => "unavailable",
        PredictionError::Encode(_) | PredictionError::Predict(_) => "internal",
    }
}

pub struct PredictionMetrics {
    requests_total: CounterVec,
    duration_seconds: HistogramVec,
    predicted_price: Histogram,
    confidence: Histogram,
    field_errors_total: CounterVec,
    model_loaded: Gauge,
    reloads_total: CounterVec,
}

impl PredictionMetrics {
    /// Create the metrics and register them with `registry`
    pub fn new(registry: &Registry) -> Result<Self> {
        let requests_total = CounterVec::new(
            Opts::new("prediction_requests_total", "Total number of prediction requests")
                .namespace(NAMESPACE),
            &["outcome"],
        )?;

        let duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "prediction_duration_seconds",
                "Prediction pipeline duration in seconds",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1]),
            &["outcome"],
        )?;

        let predicted_price = Histogram::with_opts(
            HistogramOpts::new("predicted_price", "Distribution of predicted prices")
                .namespace(NAMESPACE)
                .buckets(vec![
                    1_000.0, 2_500.0, 5_000.0, 10_000.0, 15_000.0, 20_000.0, 30_000.0, 50_000.0,
                    100_000.0,
                ]),
        )?;

        let confidence = Histogram::with_opts(
            HistogramOpts::new(
                "prediction_confidence",
                "Distribution of prediction confidence scores (0.0 - 1.0)",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0]),
        )?;

        let field_errors_total = CounterVec::new(
            Opts::new(
                "validation_field_errors_total",
                "Total number of rejected input fields",
            )
            .namespace(NAMESPACE),
            &["field"],
        )?;

        let model_loaded = Gauge::with_opts(
            Opts::new("model_loaded", "Whether a model is currently loaded (0 or 1)")
                .namespace(NAMESPACE),
        )?;

        let reloads_total = CounterVec::new(
            Opts::new("model_reloads_total", "Total number of model reload attempts")
                .namespace(NAMESPACE),
            &["result"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(duration_seconds.clone()))?;
        registry.register(Box::new(predicted_price.clone()))?;
        registry.register(Box::new(confidence.clone()))?;
        registry.register(Box::new(field_errors_total.clone()))?;
        registry.register(Box::new(model_loaded.clone()))?;
        registry.register(Box::new(reloads_total.clone()))?;

        Ok(Self {
            requests_total,
            duration_seconds,
            predicted_price,
            confidence,
            field_errors_total,
            model_loaded,
            reloads_total,
        })
    }

    pub fn record_success(&self, price: f64, confidence: f64, duration_secs: f64) {
        self.requests_total.with_label_values(&["success"]).inc();
        self.duration_seconds
            .with_label_values(&["success"])
            .observe(duration_secs);
        self.predicted_price.observe(price);
        self.confidence.observe(confidence);
    }

    pub fn record_failure(&self, error: &PredictionError, duration_secs: f64) {
        let outcome = outcome_label(error);
        self.requests_total.with_label_values(&[outcome]).inc();
        self.duration_seconds
            .with_label_values(&[outcome])
            .observe(duration_secs);
        if let Some(errors) = error.validation_errors() {
            self.record_field_errors(errors);
        }
    }

    pub fn record_field_errors(&self, errors: &ValidationErrors) {
        for error in errors.fields() {
            self.field_errors_total
                .with_label_values(&[error.field.as_str()])
                .inc();
        }
    }

    pub fn set_model_loaded(&self, loaded: bool) {
        self.model_loaded.set(if loaded { 1.0 } else { 0.0 });
    }

    pub fn record_reload(&self, success: bool) {
        let result = if success { "success" } else { "failure" };
        self.reloads_total.with_label_values(&[result]).inc();
    }

    /// Start timing one prediction
    pub fn start_timer(&self) -> PredictionTimer<'_> {
        PredictionTimer {
            start: Instant::now(),
            metrics: self,
        }
    }
}

/// Times a prediction and records its outcome when finished
pub struct PredictionTimer<'a> {
    start: Instant,
    metrics: &'a PredictionMetrics,
}

impl<'a> PredictionTimer<'a> {
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub fn finish<T, F>(self, result: &std::result::Result<T, PredictionError>, scores: F)
    where
        F: Fn(&T) -> (f64, f64),
    {
        let duration = self.elapsed_secs();
        match result {
            Ok(value) => {
                let (price, confidence) = scores(value);
                self.metrics.record_success(price, confidence, duration);
            }
            Err(error) => self.metrics.record_failure(error, duration),
        }
    }
}

/// Registry owning every server metric
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    prediction: Arc<PredictionMetrics>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        let prediction = Arc::new(PredictionMetrics::new(&registry)?);
        Ok(Self {
            registry,
            prediction,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn prediction(&self) -> &PredictionMetrics {
        &self.prediction
    }

    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Encode metrics as text for scraping
    pub fn encode_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.gather(), &mut buffer)
            .map_err(|e| TelemetryError::EncodingFailed(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::EncodingFailed(e.to_string()))
    }
}
