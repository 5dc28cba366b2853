//! Feature encoding
//!
//! Maps a [`ValidatedInput`] onto the fixed column layout a model was trained
//! with. Numeric fields pass through (optionally standardised); categorical
//! fields are one-hot encoded, and categories without a column encode as all
//! zeros.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{EncodeError, LoadError};
use crate::schema::{FeatureKind, FeatureSchema};
use crate::validation::{FieldValue, ValidatedInput};

/// Standardisation applied to a numeric column: `(x - mean) / std`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Standardization {
    pub mean: f64,
    pub std: f64,
}

/// One model input column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EncodedColumn {
    Numeric {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scale: Option<Standardization>,
    },
    Indicator {
        field: String,
        category: String,
    },
}

impl EncodedColumn {
    pub fn numeric(field: impl Into<String>) -> Self {
        EncodedColumn::Numeric {
            field: field.into(),
            scale: None,
        }
    }

    pub fn indicator(field: impl Into<String>, category: impl Into<String>) -> Self {
        EncodedColumn::Indicator {
            field: field.into(),
            category: category.into(),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            EncodedColumn::Numeric { field, .. } | EncodedColumn::Indicator { field, .. } => field,
        }
    }

    /// `Year` for numeric columns, `Brand_Toyota` for indicators
    pub fn name(&self) -> String {
        match self {
            EncodedColumn::Numeric { field, .. } => field.clone(),
            EncodedColumn::Indicator { field, category } => format!("{}_{}", field, category),
        }
    }
}

/// Model-ready numeric input
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

#[derive(Debug, Clone)]
enum FieldPlan {
    Numeric {
        field: String,
        index: usize,
        scale: Option<Standardization>,
    },
    Categorical {
        field: String,
        slots: Vec<(String, usize)>,
    },
}

/// Encoder bound to one column layout
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    columns: Vec<EncodedColumn>,
    plan: Vec<FieldPlan>,
}

impl FeatureEncoder {
    /// Bind `columns` to `schema`, rejecting any layout the schema cannot fill
    pub fn new(schema: &FeatureSchema, columns: Vec<EncodedColumn>) -> Result<Self, LoadError> {
        if columns.is_empty() {
            return Err(LoadError::incompatible("artifact declares no feature columns"));
        }

        let mut names = HashSet::new();
        for column in &columns {
            let spec = schema.get(column.field()).ok_or_else(|| {
                LoadError::incompatible(format!("column {} references unknown field", column.name()))
            })?;

            match (column, &spec.kind) {
                (EncodedColumn::Numeric { scale, .. }, FeatureKind::Numeric { .. }) => {
                    if let Some(scale) = scale {
                        if !scale.mean.is_finite() || !scale.std.is_finite() || scale.std <= 0.0 {
                            return Err(LoadError::incompatible(format!(
                                "column {} has an invalid scale",
                                column.name()
                            )));
                        }
                    }
                }
                (EncodedColumn::Indicator { category, .. }, FeatureKind::Categorical { .. }) => {
                    if !spec.allows(category) {
                        return Err(LoadError::incompatible(format!(
                            "column {} names a category outside the schema",
                            column.name()
                        )));
                    }
                }
                _ => {
                    return Err(LoadError::incompatible(format!(
                        "column {} does not match the kind of field {}",
                        column.name(),
                        spec.name
                    )));
                }
            }

            if !names.insert(column.name()) {
                return Err(LoadError::incompatible(format!(
                    "duplicate column {}",
                    column.name()
                )));
            }
        }

        let mut plan = Vec::with_capacity(schema.len());
        for spec in schema.fields() {
            let owned: Vec<(usize, &EncodedColumn)> = columns
                .iter()
                .enumerate()
                .filter(|(_, column)| column.field() == spec.name)
                .collect();

            match &spec.kind {
                FeatureKind::Numeric { .. } => {
                    if owned.len() != 1 {
                        return Err(LoadError::incompatible(format!(
                            "numeric field {} must map to exactly one column, found {}",
                            spec.name,
                            owned.len()
                        )));
                    }
                    let (index, column) = owned[0];
                    let scale = match column {
                        EncodedColumn::Numeric { scale, .. } => *scale,
                        EncodedColumn::Indicator { .. } => None,
                    };
                    plan.push(FieldPlan::Numeric {
                        field: spec.name.clone(),
                        index,
                        scale,
                    });
                }
                FeatureKind::Categorical { .. } => {
                    if owned.is_empty() {
                        return Err(LoadError::incompatible(format!(
                            "categorical field {} has no indicator columns",
                            spec.name
                        )));
                    }
                    let slots = owned
                        .into_iter()
                        .filter_map(|(index, column)| match column {
                            EncodedColumn::Indicator { category, .. } => {
                                Some((category.clone(), index))
                            }
                            EncodedColumn::Numeric { .. } => None,
                        })
                        .collect();
                    plan.push(FieldPlan::Categorical {
                        field: spec.name.clone(),
                        slots,
                    });
                }
            }
        }

        Ok(Self { columns, plan })
    }

    /// Layout produced by the training pipeline for `schema`
    ///
    /// Numeric fields come first in schema order, followed by each categorical
    /// field's indicators with categories sorted lexicographically.
    pub fn canonical_columns(schema: &FeatureSchema) -> Vec<EncodedColumn> {
        let mut columns = Vec::new();
        for spec in schema.fields() {
            if let FeatureKind::Numeric { .. } = spec.kind {
                columns.push(EncodedColumn::numeric(spec.name.clone()));
            }
        }
        for spec in schema.fields() {
            if let FeatureKind::Categorical { allowed_values } = &spec.kind {
                let mut categories = allowed_values.clone();
                categories.sort();
                for category in categories {
                    columns.push(EncodedColumn::indicator(spec.name.clone(), category));
                }
            }
        }
        columns
    }

    pub fn columns(&self) -> &[EncodedColumn] {
        &self.columns
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.columns.iter().map(EncodedColumn::name).collect()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn encode(&self, input: &ValidatedInput) -> Result<FeatureVector, EncodeError> {
        let mut values = vec![0.0; self.columns.len()];

        for step in &self.plan {
            match step {
                FieldPlan::Numeric {
                    field,
                    index,
                    scale,
                } => {
                    let raw = match input.get(field) {
                        Some(FieldValue::Integer(value)) => *value as f64,
                        Some(FieldValue::Category(_)) => {
                            return Err(EncodeError::TypeMismatch {
                                field: field.clone(),
                                expected: "integer",
                            })
                        }
                        None => return Err(EncodeError::MissingField(field.clone())),
                    };
                    values[*index] = match scale {
                        Some(scale) => (raw - scale.mean) / scale.std,
                        None => raw,
                    };
                }
                FieldPlan::Categorical { field, slots } => {
                    let category = match input.get(field) {
                        Some(FieldValue::Category(value)) => value,
                        Some(FieldValue::Integer(_)) => {
                            return Err(EncodeError::TypeMismatch {
                                field: field.clone(),
                                expected: "category",
                            })
                        }
                        None => return Err(EncodeError::MissingField(field.clone())),
                    };
                    if let Some((_, index)) = slots.iter().find(|(c, _)| c == category) {
                        values[*index] = 1.0;
                    }
                }
            }
        }

        Ok(FeatureVector(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{RawInput, Validator};
    use serde_json::json;
    use std::sync::Arc;

    fn validated(overrides: serde_json::Value) -> ValidatedInput {
        let mut raw: RawInput = match json!({
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
        };
        if let serde_json::Value::Object(extra) = overrides {
            raw.extend(extra);
        }
        Validator::new(Arc::new(FeatureSchema::vehicle()))
            .validate(&raw)
            .unwrap()
    }

    fn canonical() -> FeatureEncoder {
        let schema = FeatureSchema::vehicle();
        FeatureEncoder::new(&schema, FeatureEncoder::canonical_columns(&schema)).unwrap()
    }

    #[test]
    fn test_canonical_layout() {
        let names = canonical().feature_names();
        assert_eq!(names.len(), 29);
        assert_eq!(names[0], "Year");
        assert_eq!(names[1], "KM_Driven");
        assert_eq!(names[2], "Brand_Audi");
        assert_eq!(names[9], "Brand_Volkswagen");
        assert_eq!(names[13], "Model_SUV");
        assert_eq!(names[26], "Owner_Fourth & Above Owner");
    }

    #[test]
    fn test_encode_one_hot() {
        let encoder = canonical();
        let vector = encoder.encode(&validated(json!({}))).unwrap();
        let names = encoder.feature_names();
        let hot: Vec<&str> = names
            .iter()
            .zip(vector.as_slice())
            .filter(|(name, value)| **value == 1.0 && name.contains('_'))
            .map(|(name, _)| name.as_str())
            .collect();

        assert_eq!(vector.as_slice()[0], 2018.0);
        assert_eq!(vector.as_slice()[1], 50000.0);
        assert_eq!(
            hot,
            vec![
                "Brand_Toyota",
                "Model_Sedan",
                "Fuel_Petrol",
                "Seller_Type_Individual",
                "Transmission_Manual",
                "Owner_First Owner"
            ]
        );
    }

    #[test]
    fn test_encode_is_deterministic() {
        let encoder = canonical();
        let input = validated(json!({"Brand": "BMW", "Year": 2001}));
        let a = encoder.encode(&input).unwrap();
        let b = encoder.encode(&input).unwrap();
        assert_eq!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn test_unseen_category_encodes_as_zeros() {
        let schema = FeatureSchema::vehicle();
        let columns: Vec<EncodedColumn> = FeatureEncoder::canonical_columns(&schema)
            .into_iter()
            .filter(|c| c.name() != "Brand_Hyundai")
            .collect();
        let encoder = FeatureEncoder::new(&schema, columns).unwrap();
        let vector = encoder.encode(&validated(json!({"Brand": "Hyundai"}))).unwrap();
        let brand_total: f64 = encoder
            .columns()
            .iter()
            .zip(vector.as_slice())
            .filter(|(c, _)| c.field() == "Brand")
            .map(|(_, v)| v)
            .sum();
        assert_eq!(brand_total, 0.0);
    }

    #[test]
    fn test_scaled_numeric_column() {
        let schema = FeatureSchema::vehicle();
        let mut columns = FeatureEncoder::canonical_columns(&schema);
        columns[1] = EncodedColumn::Numeric {
            field: "KM_Driven".to_string(),
            scale: Some(Standardization {
                mean: 40000.0,
                std: 20000.0,
            }),
        };
        let encoder = FeatureEncoder::new(&schema, columns).unwrap();
        let vector = encoder.encode(&validated(json!({}))).unwrap();
        assert_eq!(vector.as_slice()[1], 0.5);
    }

    #[test]
    fn test_incompatible_layouts() {
        let schema = FeatureSchema::vehicle();
        let base = FeatureEncoder::canonical_columns(&schema);

        let mut duplicate = base.clone();
        duplicate.push(EncodedColumn::indicator("Brand", "BMW"));
        assert!(FeatureEncoder::new(&schema, duplicate).is_err());

        let mut unknown = base.clone();
        unknown.push(EncodedColumn::indicator("Color", "Red"));
        assert!(FeatureEncoder::new(&schema, unknown).is_err());

        let mut bad_category = base.clone();
        bad_category.push(EncodedColumn::indicator("Brand", "Tesla"));
        assert!(FeatureEncoder::new(&schema, bad_category).is_err());

        let missing_year: Vec<EncodedColumn> =
            base.iter().filter(|c| c.name() != "Year").cloned().collect();
        assert!(FeatureEncoder::new(&schema, missing_year).is_err());

        let mut wrong_kind = base.clone();
        wrong_kind.push(EncodedColumn::numeric("Fuel"));
        assert!(FeatureEncoder::new(&schema, wrong_kind).is_err());

        assert!(FeatureEncoder::new(&schema, Vec::new()).is_err());
    }

    #[test]
    fn test_column_serde_shape() {
        let column: EncodedColumn =
            serde_json::from_value(json!({"kind": "indicator", "field": "Fuel", "category": "Diesel"}))
                .unwrap();
        assert_eq!(column.name(), "Fuel_Diesel");

        let column: EncodedColumn =
            serde_json::from_value(json!({"kind": "numeric", "field": "Year"})).unwrap();
        assert_eq!(column, EncodedColumn::numeric("Year"));
    }
}
