//! Offline model evaluation
//!
//! Scores a labeled dataset through the same validation and encoding path the
//! service uses and reports regression accuracy.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Read;
use std::path::Path;
use tracing::{debug, error};

use crate::error::EvaluationError;
use crate::model::ModelHandle;
use crate::validation::{RawInput, Validator};

/// Column holding the observed price in training data
pub const DEFAULT_TARGET: &str = "Selling_Price";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Records that were scored
    pub samples: usize,
    /// Records dropped for failing validation or lacking a numeric target
    pub skipped: usize,
    pub r2: f64,
    pub rmse: f64,
    pub mae: f64,
    /// Mean absolute percentage error over non-zero targets
    pub mape: Option<f64>,
}

/// Evaluate `handle` on `records`, reading the label from `target`
pub fn evaluate(
    handle: &ModelHandle,
    validator: &Validator,
    records: &[RawInput],
    target: &str,
) -> Result<EvaluationReport, EvaluationError> {
    let mut actual = Vec::with_capacity(records.len());
    let mut predicted = Vec::with_capacity(records.len());
    let mut skipped = 0;

    for (row, record) in records.iter().enumerate() {
        let label = match record.get(target).and_then(parse_number) {
            Some(label) => label,
            None => {
                debug!(row, target_column = target, "Skipping record without numeric target");
                skipped += 1;
                continue;
            }
        };
        let input = match validator.validate(record) {
            Ok(input) => input,
            Err(errors) => {
                debug!(row, errors = %errors, "Skipping invalid record");
                skipped += 1;
                continue;
            }
        };
        let vector = match handle.encode(&input) {
            Ok(vector) => vector,
            Err(err) => {
                error!(row, error = %err, "Feature encoding failed; skipping record");
                skipped += 1;
                continue;
            }
        };
        match handle.predict(&vector) {
            Ok(price) => {
                actual.push(label);
                predicted.push(price);
            }
            Err(err) => {
                error!(row, error = %err, "Model prediction failed; skipping record");
                skipped += 1;
            }
        }
    }

    if actual.is_empty() {
        return Err(EvaluationError::NoSamples);
    }

    let n = actual.len() as f64;
    let mean = actual.iter().sum::<f64>() / n;
    let residuals: Vec<f64> = actual.iter().zip(&predicted).map(|(a, p)| a - p).collect();

    let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let r2 = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };

    let percentage: Vec<f64> = actual
        .iter()
        .zip(&residuals)
        .filter(|(a, _)| **a != 0.0)
        .map(|(a, r)| (r / a).abs())
        .collect();
    let mape = if percentage.is_empty() {
        None
    } else {
        Some(percentage.iter().sum::<f64>() / percentage.len() as f64 * 100.0)
    };

    Ok(EvaluationReport {
        samples: actual.len(),
        skipped,
        r2,
        rmse: (ss_res / n).sqrt(),
        mae: residuals.iter().map(|r| r.abs()).sum::<f64>() / n,
        mape,
    })
}

fn parse_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

/// Read a dataset, choosing CSV or JSON by file extension
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<RawInput>, EvaluationError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| EvaluationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        read_csv_records(file)
    } else {
        read_json_records(file)
    }
}

/// Read a JSON array of flat objects
pub fn read_json_records<R: Read>(reader: R) -> Result<Vec<RawInput>, EvaluationError> {
    let value: Value = serde_json::from_reader(reader)?;
    let rows = match value {
        Value::Array(rows) => rows,
        _ => return Err(EvaluationError::Parse("expected a JSON array".to_string())),
    };
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| match row {
            Value::Object(map) => Ok(map),
            _ => Err(EvaluationError::Parse(format!("row {} is not an object", i))),
        })
        .collect()
}

/// Read a CSV file with a header row; every cell becomes a string
pub fn read_csv_records<R: Read>(reader: R) -> Result<Vec<RawInput>, EvaluationError> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers()?.clone();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record: RawInput = headers
            .iter()
            .zip(row.iter())
            .map(|(key, cell)| (key.to_string(), Value::String(cell.to_string())))
            .collect();
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::FeatureEncoder;
    use crate::schema::{FeatureSchema, FeatureSpec};
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn constant_model(value: f64) -> ModelHandle {
        let schema = FeatureSchema::vehicle();
        let doc = json!({
            "format_version": 1,
            "model_type": "RandomForestRegressor",
            "columns": FeatureEncoder::canonical_columns(&schema),
            "estimator": {"type": "forest", "trees": [{"nodes": [{"value": value}]}]},
        });
        ModelHandle::from_slice(doc.to_string().as_bytes(), "memory", &schema).unwrap()
    }

    const CSV: &str = "\
Brand,Model,Year,KM_Driven,Fuel,Seller_Type,Transmission,Owner,Selling_Price
Toyota,Sedan,2018,50000,Petrol,Individual,Manual,First Owner,9000
Honda,SUV,2015,80000,Diesel,Dealer,Automatic,Second Owner,11000
Tesla,Sedan,2020,1000,Electric,Dealer,Automatic,First Owner,40000
";

    #[test]
    fn test_csv_evaluation() {
        let records = read_csv_records(CSV.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);

        let validator = Validator::new(Arc::new(FeatureSchema::vehicle()));
        let report = evaluate(&constant_model(10000.0), &validator, &records, DEFAULT_TARGET).unwrap();

        assert_eq!(report.samples, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.mae, 1000.0);
        assert_eq!(report.rmse, 1000.0);
        assert_eq!(report.r2, 0.0);
        let mape = report.mape.unwrap();
        assert!((mape - (1000.0 / 9000.0 + 1000.0 / 11000.0) / 2.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_json_records() {
        let data = json!([{"Brand": "Toyota", "Selling_Price": 5000}]).to_string();
        let records = read_json_records(data.as_bytes()).unwrap();
        assert_eq!(records[0]["Selling_Price"], 5000);

        assert!(read_json_records(b"{\"a\": 1}".as_slice()).is_err());
        assert!(read_json_records(b"[1, 2]".as_slice()).is_err());
    }

    #[test]
    fn test_encoding_failures_are_logged_and_skipped() {
        // validator schema narrower than the model's columns
        let narrow = FeatureSchema::new(vec![FeatureSpec::categorical("Brand", &["Toyota"])]).unwrap();
        let validator = Validator::new(Arc::new(narrow));
        let records = read_json_records(
            json!([{"Brand": "Toyota", "Selling_Price": 5000}]).to_string().as_bytes(),
        )
        .unwrap();

        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, || {
            evaluate(&constant_model(1.0), &validator, &records, DEFAULT_TARGET)
        });

        assert!(matches!(result, Err(EvaluationError::NoSamples)));
        let output = logs.contents();
        assert!(output.contains("ERROR"), "{}", output);
        assert!(output.contains("Feature encoding failed"), "{}", output);
        assert!(output.contains("row=0"), "{}", output);
    }

    #[test]
    fn test_no_samples() {
        let validator = Validator::new(Arc::new(FeatureSchema::vehicle()));
        let records = vec![RawInput::new()];
        assert!(matches!(
            evaluate(&constant_model(1.0), &validator, &records, DEFAULT_TARGET),
            Err(EvaluationError::NoSamples)
        ));
    }
}
