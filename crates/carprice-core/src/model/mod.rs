//! Model adapter
//!
//! - `artifact` - serialized model format
//! - `estimator` - tree ensembles and linear models behind the [`Regressor`] trait
//! - `handle` - a loaded, immutable model with its encoder and metadata
//! - `slot` - atomically replaceable holder of the current handle

pub mod artifact;
pub mod estimator;
pub mod handle;
pub mod slot;

pub use artifact::{ArtifactMetrics, EstimatorSpec, ModelArtifact, NodeSpec, TreeSpec, FORMAT_VERSION};
pub use estimator::Regressor;
pub use handle::{ModelHandle, ModelInfo, Prediction, DEFAULT_CONFIDENCE};
pub use slot::{ModelSlot, SlotStatus};
