//! Server bootstrap
//!
//! Loads the model into a fresh slot (degraded on failure), binds the
//! listener and serves until Ctrl-C or SIGTERM.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use carprice_core::{FeatureSchema, ModelSlot};

use crate::config::ServerConfig;
use crate::handler::{create_router, AppState};
use crate::telemetry::MetricsRegistry;

/// Build the application state for `config`, attempting the startup model load
pub fn build_state(config: ServerConfig) -> Result<AppState> {
    let schema = Arc::new(FeatureSchema::vehicle());
    let slot = Arc::new(ModelSlot::with_path(schema, config.model_path.clone()));
    if !slot.is_loaded() {
        warn!(
            model_path = %config.model_path.display(),
            "Starting without a model; /predict will report ServiceUnavailable"
        );
    }
    let metrics = MetricsRegistry::new().context("failed to register metrics")?;
    Ok(AppState::new(config, slot, metrics))
}

pub async fn run(config: ServerConfig) -> Result<()> {
    let addr = config.bind_addr();
    let prefix = config.api_prefix.clone();
    let environment = config.environment;

    let state = build_state(config)?;
    let router = create_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(
        address = %addr,
        api_prefix = %prefix,
        environment = %environment,
        version = env!("CARGO_PKG_VERSION"),
        "Vehicle price API listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
