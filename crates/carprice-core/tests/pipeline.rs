//! End-to-end tests of the prediction pipeline against the shipped artifact

use carprice_core::{
    format_currency, EncodedColumn, FeatureEncoder, FeatureSchema, ModelHandle, ModelSlot,
    PredictionError, PredictionService, RawInput, Validator,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

const MODEL_PATH: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../models/vehicle_price_model.json"
);

fn service() -> PredictionService {
    let slot = ModelSlot::with_path(Arc::new(FeatureSchema::vehicle()), MODEL_PATH);
    assert!(slot.is_loaded(), "shipped artifact must load");
    PredictionService::new(Arc::new(slot))
}

fn object(value: Value) -> RawInput {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {}", other),
    }
}

fn sample() -> RawInput {
    object(json!({
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

#[test]
fn test_sample_prediction() {
    let result = service().predict(&sample()).unwrap();

    assert!((result.price - 12300.0).abs() < 1e-9);
    assert_eq!(result.formatted_price, "$12,300.00");
    assert!((result.confidence - 0.92551).abs() < 1e-4);
    assert_eq!(result.input.get("Year").unwrap().as_integer(), Some(2018));
}

#[test]
fn test_year_1899_rejected() {
    let mut input = sample();
    input.insert("Year".to_string(), json!(1899));
    let err = service().predict(&input).unwrap_err();

    assert_eq!(err.error_type(), "ValidationError");
    assert!(err.public_message().contains("Year"));
}

#[test]
fn test_every_missing_field_is_reported() {
    let service = service();
    for field in FeatureSchema::vehicle().names() {
        let mut input = sample();
        input.remove(field);
        let err = service.predict(&input).unwrap_err();
        let errors = err.validation_errors().expect("rejected");
        assert_eq!(errors.message_for(field), Some("required field missing"));
    }
}

#[test]
fn test_unloaded_model_is_unavailable() {
    let slot = ModelSlot::with_path(Arc::new(FeatureSchema::vehicle()), "no/such/model.json");
    let service = PredictionService::new(Arc::new(slot));
    assert!(matches!(
        service.predict(&sample()),
        Err(PredictionError::Unavailable)
    ));
}

#[test]
fn test_shipped_artifact_metadata() {
    let schema = FeatureSchema::vehicle();
    let handle = ModelHandle::load(MODEL_PATH, &schema).unwrap();
    let info = handle.metadata();
    assert_eq!(info.model_type, "RandomForestRegressor");
    assert_eq!(info.n_estimators, 3);

    let canonical: Vec<String> = FeatureEncoder::canonical_columns(&schema)
        .iter()
        .map(EncodedColumn::name)
        .collect();
    assert_eq!(info.feature_names, canonical);
    assert_eq!(info.metrics.as_ref().and_then(|m| m.r2), Some(0.87));
}

/// `formatted` must be `$` plus the `{:.2}` digits of `price`, grouped in threes
fn assert_grouped_two_decimals(formatted: &str, price: f64) -> Result<(), TestCaseError> {
    let body = formatted
        .strip_prefix('$')
        .ok_or_else(|| TestCaseError::fail(format!("missing $: {}", formatted)))?;
    prop_assert_eq!(body.replace(',', ""), format!("{:.2}", price));

    let whole = body.split('.').next().unwrap_or_default();
    let groups: Vec<&str> = whole.split(',').collect();
    prop_assert!((1..=3).contains(&groups[0].len()), "leading group in {}", formatted);
    for group in &groups[1..] {
        prop_assert_eq!(group.len(), 3, "group in {}", formatted);
    }
    Ok(())
}

fn vehicle_input() -> impl Strategy<Value = RawInput> {
    (
        prop::sample::select(vec![
            "Toyota", "Honda", "Ford", "BMW", "Mercedes", "Audi", "Volkswagen", "Hyundai",
        ]),
        prop::sample::select(vec!["Sedan", "SUV", "Hatchback", "Coupe", "Truck", "Convertible"]),
        1900i64..=2030,
        0i64..2_000_000,
        prop::sample::select(vec!["Petrol", "Diesel", "Electric", "Hybrid"]),
        prop::sample::select(vec!["Individual", "Dealer", "Trustmark Dealer"]),
        prop::sample::select(vec!["Manual", "Automatic"]),
        prop::sample::select(vec![
            "First Owner",
            "Second Owner",
            "Third Owner",
            "Fourth & Above Owner",
        ]),
    )
        .prop_map(|(brand, model, year, km, fuel, seller, transmission, owner)| {
            object(json!({
                "Brand": brand,
                "Model": model,
                "Year": year,
                "KM_Driven": km,
                "Fuel": fuel,
                "Seller_Type": seller,
                "Transmission": transmission,
                "Owner": owner
            }))
        })
}

proptest! {
    #[test]
    fn prop_predictions_are_bounded(input in vehicle_input()) {
        let result = service().predict(&input).unwrap();
        prop_assert!(result.price >= 0.0);
        prop_assert!((0.0..=1.0).contains(&result.confidence));
        prop_assert_eq!(&result.formatted_price, &format_currency(result.price));
        assert_grouped_two_decimals(&result.formatted_price, result.price)?;
    }

    #[test]
    fn prop_currency_matches_two_decimal_rendering(price in 0.0f64..1e12) {
        assert_grouped_two_decimals(&format_currency(price), price)?;
    }

    #[test]
    fn prop_encoding_is_deterministic(input in vehicle_input()) {
        let handle = ModelHandle::load(MODEL_PATH, &FeatureSchema::vehicle()).unwrap();
        let validator = Validator::new(Arc::new(FeatureSchema::vehicle()));
        let validated = validator.validate(&input).unwrap();

        let a = handle.encode(&validated).unwrap();
        let b = handle.encode(&validator.validate(&input).unwrap()).unwrap();
        prop_assert_eq!(a.as_slice(), b.as_slice());
        prop_assert_eq!(handle.predict(&a).unwrap().to_bits(), handle.predict(&b).unwrap().to_bits());
    }

    #[test]
    fn prop_out_of_range_year_rejected(year in prop_oneof![i64::MIN..1900i64, 2031i64..i64::MAX]) {
        let mut input = sample();
        input.insert("Year".to_string(), json!(year));
        let validator = Validator::new(Arc::new(FeatureSchema::vehicle()));
        let errors = validator.validate(&input).unwrap_err();
        prop_assert_eq!(errors.message_for("Year"), Some("must be between 1900 and 2030"));
    }
}
