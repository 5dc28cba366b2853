//! Input validation
//!
//! Turns an untyped [`RawInput`] into a [`ValidatedInput`] that downstream
//! stages trust without re-checking. Validation is exhaustive: every field is
//! checked and all problems are reported together, in schema order.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::schema::{FeatureKind, FeatureSchema, FeatureSpec};

/// Request payload as received at the boundary
pub type RawInput = serde_json::Map<String, Value>;

/// Typed, schema-conformant field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Category(String),
    Integer(i64),
}

impl FieldValue {
    pub fn as_category(&self) -> Option<&str> {
        match self {
            FieldValue::Category(value) => Some(value),
            FieldValue::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(value) => Some(*value),
            FieldValue::Category(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Category(value) => f.write_str(value),
            FieldValue::Integer(value) => write!(f, "{}", value),
        }
    }
}

/// Record that passed validation, held in schema order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedInput {
    values: Vec<(String, FieldValue)>,
}

impl ValidatedInput {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(field, value)| (field.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for ValidatedInput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in &self.values {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

/// A single field-level problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every problem found in one input, in schema order
#[derive(Error, Debug, Clone, PartialEq, Eq, Default)]
#[error("{}", join_field_errors(.errors))]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn fields(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn contains(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// Field name to message, preserving order
    pub fn to_map(&self) -> serde_json::Map<String, Value> {
        self.errors
            .iter()
            .map(|e| (e.field.clone(), Value::String(e.message.clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }
}

impl From<Vec<FieldError>> for ValidationErrors {
    fn from(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|error| format!("{}: {}", error.field, error.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validation behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Report keys that are not in the schema instead of ignoring them
    pub strict: bool,
}

/// Validates raw records against a feature schema
#[derive(Debug, Clone)]
pub struct Validator {
    schema: Arc<FeatureSchema>,
    options: ValidationOptions,
}

impl Validator {
    pub fn new(schema: Arc<FeatureSchema>) -> Self {
        Self {
            schema,
            options: ValidationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn options(&self) -> ValidationOptions {
        self.options
    }

    /// Validate `raw`, collecting every field error before returning
    pub fn validate(&self, raw: &RawInput) -> Result<ValidatedInput, ValidationErrors> {
        let mut values = Vec::with_capacity(self.schema.len());
        let mut errors = ValidationErrors::default();

        for spec in self.schema.fields() {
            match raw.get(&spec.name) {
                None | Some(Value::Null) => {
                    if spec.required {
                        errors.push(&spec.name, "required field missing");
                    }
                }
                Some(value) => match check_field(spec, value) {
                    Ok(parsed) => values.push((spec.name.clone(), parsed)),
                    Err(message) => errors.push(&spec.name, message),
                },
            }
        }

        if self.options.strict {
            for key in raw.keys() {
                if !self.schema.contains(key) {
                    errors.push(key, "unknown field");
                }
            }
        }

        if errors.is_empty() {
            Ok(ValidatedInput { values })
        } else {
            Err(errors)
        }
    }
}

fn check_field(spec: &FeatureSpec, value: &Value) -> Result<FieldValue, String> {
    match &spec.kind {
        FeatureKind::Categorical { allowed_values } => match value {
            Value::String(s) if spec.allows(s) => Ok(FieldValue::Category(s.clone())),
            _ => Err(format!("must be one of: {}", allowed_values.join(", "))),
        },
        FeatureKind::Numeric { min, max } => {
            let parsed = parse_integer(value).ok_or_else(|| "must be a valid integer".to_string())?;
            let in_range = parsed >= *min && max.map_or(true, |max| parsed <= max);
            if in_range {
                Ok(FieldValue::Integer(parsed))
            } else {
                Err(match max {
                    Some(max) => format!("must be between {} and {}", min, max),
                    None => format!("must be at least {}", min),
                })
            }
        }
    }
}

/// Integers arrive as JSON integers, integral floats or numeric strings
fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .filter(|f| *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
