//! Vehicle price prediction core
//!
//! The prediction pipeline behind the `carprice` API server and CLI:
//!
//! 1. **Schema** (`schema`): the accepted fields and their domains.
//! 2. **Validation** (`validation`): untrusted records become typed
//!    [`ValidatedInput`] or an exhaustive [`ValidationErrors`].
//! 3. **Encoding** (`encoder`): validated records become the fixed-order
//!    [`FeatureVector`] the model was trained on.
//! 4. **Model** (`model`): artifact loading, tree-ensemble scoring with
//!    confidence, and the atomically replaceable [`ModelSlot`].
//! 5. **Service** (`service`): orchestrates the above per request.
//!
//! `evaluation` scores a labeled dataset offline.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use carprice_core::{FeatureSchema, ModelSlot, PredictionService};
//!
//! let schema = Arc::new(FeatureSchema::vehicle());
//! let slot = Arc::new(ModelSlot::with_path(schema, "models/vehicle_price_model.json"));
//! let service = PredictionService::new(slot);
//!
//! let input = serde_json::json!({
//!     "Brand": "Toyota", "Model": "Sedan", "Year": 2018, "KM_Driven": 50000,
//!     "Fuel": "Petrol", "Seller_Type": "Individual", "Transmission": "Manual",
//!     "Owner": "First Owner"
//! });
//! if let serde_json::Value::Object(raw) = input {
//!     match service.predict(&raw) {
//!         Ok(result) => println!("{} ({:.2})", result.formatted_price, result.confidence),
//!         Err(err) => eprintln!("{}", err.public_message()),
//!     }
//! }
//! ```

pub mod encoder;
pub mod error;
pub mod evaluation;
pub mod model;
pub mod schema;
pub mod service;
pub mod validation;

pub use encoder::{EncodedColumn, FeatureEncoder, FeatureVector, Standardization};
pub use error::{EncodeError, EvaluationError, LoadError, PredictError, PredictionError, SchemaError};
pub use evaluation::{evaluate, EvaluationReport, DEFAULT_TARGET};
pub use model::{ModelHandle, ModelInfo, ModelSlot, Prediction, SlotStatus};
pub use schema::{FeatureKind, FeatureSchema, FeatureSpec, SchemaDescription};
pub use service::{format_currency, PredictionResult, PredictionService};
pub use validation::{
    FieldError, FieldValue, RawInput, ValidatedInput, ValidationErrors, ValidationOptions,
    Validator,
};
