//! Vehicle price prediction API
//!
//! HTTP service and command-line tools around [`carprice_core`].
//!
//! ## Endpoints
//!
//! All routes are mounted under the configured prefix (`/api/v1` by default):
//!
//! - `POST /predict` - price a vehicle
//! - `GET /health` - liveness and model status
//! - `GET /model/info` - metadata for the loaded model
//! - `GET /features` - input schema with valid values
//! - `POST /model/reload` - reload the artifact from disk
//! - `GET /metrics` - Prometheus text exposition
//!
//! ## CLI Usage
//!
//! ```bash
//! # Serve the API
//! carprice serve --config carprice.toml
//!
//! # One-off prediction
//! carprice predict --json '{"Brand": "Toyota", "Model": "Sedan", "Year": 2018, "KM_Driven": 50000,
//!   "Fuel": "Petrol", "Seller_Type": "Individual", "Transmission": "Manual", "Owner": "First Owner"}'
//!
//! # Score a model against labeled data
//! carprice evaluate --data cars.csv --format json
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use carprice_api::{create_router, server::build_state, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let state = build_state(ServerConfig::default())?;
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:5000").await?;
//!     axum::serve(listener, create_router(state)).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod handler;
pub mod server;
pub mod telemetry;

pub use cli::{run as run_cli, Cli, CliError, Commands, ExitCode};
pub use config::{Environment, LogFormat, ServerConfig};
pub use handler::{create_router, ApiError, AppState};
pub use telemetry::MetricsRegistry;
