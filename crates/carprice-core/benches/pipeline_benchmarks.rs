use carprice_core::{FeatureSchema, ModelHandle, RawInput, Validator};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use std::sync::Arc;

const MODEL_PATH: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../models/vehicle_price_model.json"
);

fn sample() -> RawInput {
    match json!({
        "Brand": "Toyota",
        "Model": "Sedan",
        "Year": 2018,
        "KM_Driven": 50000,
        "Fuel": "Petrol",
        "Seller_Type": "Individual",
        "Transmission": "Manual",
        "Owner": "First Owner"
    }) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn bench_pipeline(c: &mut Criterion) {
    let schema = Arc::new(FeatureSchema::vehicle());
    let handle = ModelHandle::load(MODEL_PATH, &schema).expect("shipped artifact");
    let validator = Validator::new(schema);
    let raw = sample();
    let validated = validator.validate(&raw).expect("valid sample");
    let vector = handle.encode(&validated).expect("encodable sample");

    let mut group = c.benchmark_group("pipeline");
    group.bench_function("validate", |b| b.iter(|| validator.validate(black_box(&raw))));
    group.bench_function("encode", |b| b.iter(|| handle.encode(black_box(&validated))));
    group.bench_function("predict_with_confidence", |b| {
        b.iter(|| handle.predict_with_confidence(black_box(&vector)))
    });
    group.bench_function("end_to_end", |b| {
        b.iter(|| {
            let input = validator.validate(black_box(&raw)).ok()?;
            let vector = handle.encode(&input).ok()?;
            handle.predict_with_confidence(&vector).ok()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
