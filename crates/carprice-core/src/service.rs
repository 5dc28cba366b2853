//! Prediction service
//!
//! Runs one request through validation, encoding and scoring against the
//! slot's current model, and reduces every failure to a [`PredictionError`].

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::PredictionError;
use crate::model::ModelSlot;
use crate::validation::{RawInput, ValidatedInput, ValidationOptions, Validator};

/// Successful prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub price: f64,
    pub formatted_price: String,
    pub confidence: f64,
    pub input: ValidatedInput,
    pub model_type: String,
}

#[derive(Debug, Clone)]
pub struct PredictionService {
    slot: Arc<ModelSlot>,
    validator: Validator,
}

impl PredictionService {
    pub fn new(slot: Arc<ModelSlot>) -> Self {
        let validator = Validator::new(Arc::clone(slot.schema()));
        Self { slot, validator }
    }

    pub fn with_options(slot: Arc<ModelSlot>, options: ValidationOptions) -> Self {
        let validator = Validator::new(Arc::clone(slot.schema())).with_options(options);
        Self { slot, validator }
    }

    pub fn slot(&self) -> &Arc<ModelSlot> {
        &self.slot
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn predict(&self, raw: &RawInput) -> Result<PredictionResult, PredictionError> {
        let handle = match self.slot.current() {
            Some(handle) => handle,
            None => {
                warn!("Prediction requested while no model is loaded");
                return Err(PredictionError::Unavailable);
            }
        };

        let input = self.validator.validate(raw).map_err(|errors| {
            debug!(error_count = errors.len(), errors = %errors, "Prediction input rejected");
            PredictionError::Rejected(errors)
        })?;

        let vector = handle.encode(&input).map_err(|err| {
            error!(
                error = %err,
                model_type = %handle.metadata().model_type,
                source_path = %handle.metadata().source_path,
                "Feature encoding failed for validated input"
            );
            PredictionError::from(err)
        })?;

        let prediction = handle.predict_with_confidence(&vector).map_err(|err| {
            error!(
                error = %err,
                model_type = %handle.metadata().model_type,
                vector_len = vector.len(),
                "Model prediction failed"
            );
            PredictionError::from(err)
        })?;

        debug!(
            field_count = input.len(),
            price = prediction.price,
            confidence = prediction.confidence,
            "Prediction complete"
        );

        Ok(PredictionResult {
            price: prediction.price,
            formatted_price: format_currency(prediction.price),
            confidence: prediction.confidence,
            input,
            model_type: handle.metadata().model_type.clone(),
        })
    }
}

/// Render an amount as `$12,345.67`
///
/// The two decimals are the `{:.2}` rendering of the value itself, so ties
/// resolve on the exact binary value rather than a scaled copy.
pub fn format_currency(amount: f64) -> String {
    let digits = format!("{:.2}", amount.abs());
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let nonzero = digits.bytes().any(|b| b.is_ascii_digit() && b != b'0');
    let sign = if amount < 0.0 && nonzero { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::FeatureEncoder;
    use crate::model::ModelHandle;
    use crate::schema::FeatureSchema;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawInput {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn sample() -> RawInput {
        raw(json!({
            "Brand": "Toyota",
            "Model": "Sedan",
            "Year": 2018,
            "KM_Driven": 50000,
            "Fuel": "Petrol",
            "Seller_Type": "Individual",
            "Transmission": "Manual",
            "Owner": "First Owner"
        }))
    }

    fn loaded_service(leaves: &[f64]) -> PredictionService {
        let schema = Arc::new(FeatureSchema::vehicle());
        let trees: Vec<serde_json::Value> =
            leaves.iter().map(|v| json!({"nodes": [{"value": v}]})).collect();
        let doc = json!({
            "format_version": 1,
            "model_type": "RandomForestRegressor",
            "columns": FeatureEncoder::canonical_columns(&schema),
            "estimator": {"type": "forest", "trees": trees},
        });
        let handle = ModelHandle::from_slice(doc.to_string().as_bytes(), "memory", &schema).unwrap();
        let slot = Arc::new(ModelSlot::empty(schema));
        slot.install(handle);
        PredictionService::new(slot)
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(12300.0), "$12,300.00");
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(999.999), "$1,000.00");
        assert_eq!(format_currency(1234567.891), "$1,234,567.89");
        assert_eq!(format_currency(100.5), "$100.50");
        assert_eq!(format_currency(-42.0), "-$42.00");
        assert_eq!(format_currency(-0.001), "$0.00");
    }

    #[test]
    fn test_format_currency_half_cent_values() {
        // Decimal ties that are not exact in binary round toward the stored value
        assert_eq!(format_currency(2.675), "$2.67");
        assert_eq!(format_currency(12345.675), "$12,345.67");
        assert_eq!(format_currency(0.015), "$0.01");
        assert_eq!(format_currency(1000000.005), "$1,000,000.01");
    }

    #[test]
    fn test_success() {
        let service = loaded_service(&[12000.0, 12600.0]);
        let result = service.predict(&sample()).unwrap();
        assert_eq!(result.price, 12300.0);
        assert_eq!(result.formatted_price, "$12,300.00");
        assert!(result.confidence > 0.0 && result.confidence <= 1.0);
        assert_eq!(result.input.len(), 8);
        assert_eq!(result.model_type, "RandomForestRegressor");
    }

    #[test]
    fn test_rejected() {
        let service = loaded_service(&[1.0]);
        let mut input = sample();
        input.insert("Year".to_string(), json!(1899));
        let err = service.predict(&input).unwrap_err();
        assert_eq!(err.error_type(), "ValidationError");
        assert!(err.validation_errors().unwrap().contains("Year"));
    }

    #[test]
    fn test_unavailable_skips_validation() {
        let slot = Arc::new(ModelSlot::empty(Arc::new(FeatureSchema::vehicle())));
        let service = PredictionService::new(slot);
        let err = service.predict(&RawInput::new()).unwrap_err();
        assert!(matches!(err, PredictionError::Unavailable));
    }

    #[test]
    fn test_strict_options() {
        let schema = Arc::new(FeatureSchema::vehicle());
        let service = PredictionService::with_options(
            Arc::new(ModelSlot::empty(schema)),
            ValidationOptions { strict: true },
        );
        assert!(service.validator().options().strict);
    }
}
