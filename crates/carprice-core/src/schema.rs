//! Feature schema
//!
//! Declarative description of every field a prediction request may carry.
//! The order of [`FeatureSchema::fields`] is the canonical field order used by
//! validation, encoding and every serialized echo of the input.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::HashSet;

use crate::error::SchemaError;

/// Domain of a single feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureKind {
    /// String drawn from a closed, case-sensitive set
    Categorical { allowed_values: Vec<String> },
    /// Integer in `[min, max]`; `max: None` is unbounded above
    Numeric { min: i64, max: Option<i64> },
}

/// One accepted input field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSpec {
    pub name: String,
    pub kind: FeatureKind,
    pub required: bool,
}

impl FeatureSpec {
    pub fn categorical(name: impl Into<String>, values: &[&str]) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Categorical {
                allowed_values: values.iter().map(|v| v.to_string()).collect(),
            },
            required: true,
        }
    }

    pub fn numeric(name: impl Into<String>, min: i64, max: Option<i64>) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Numeric { min, max },
            required: true,
        }
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self.kind, FeatureKind::Categorical { .. })
    }

    /// Whether `value` is an allowed category of this feature
    pub fn allows(&self, value: &str) -> bool {
        match &self.kind {
            FeatureKind::Categorical { allowed_values } => {
                allowed_values.iter().any(|v| v == value)
            }
            FeatureKind::Numeric { .. } => false,
        }
    }

    fn check(&self) -> Result<(), SchemaError> {
        match &self.kind {
            FeatureKind::Categorical { allowed_values } => {
                if allowed_values.is_empty() {
                    return Err(SchemaError::EmptyCategories(self.name.clone()));
                }
                let mut seen = HashSet::new();
                for value in allowed_values {
                    if !seen.insert(value.as_str()) {
                        return Err(SchemaError::DuplicateCategory {
                            field: self.name.clone(),
                            category: value.clone(),
                        });
                    }
                }
            }
            FeatureKind::Numeric { min, max: Some(max) } if min > max => {
                return Err(SchemaError::InvalidRange {
                    field: self.name.clone(),
                    min: *min,
                    max: *max,
                });
            }
            FeatureKind::Numeric { .. } => {}
        }
        Ok(())
    }
}

/// Ordered collection of feature specs with unique names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    fields: Vec<FeatureSpec>,
}

impl FeatureSchema {
    /// Build a schema, rejecting duplicate names and malformed domains
    pub fn new(fields: Vec<FeatureSpec>) -> Result<Self, SchemaError> {
        let mut names = HashSet::new();
        for spec in &fields {
            if !names.insert(spec.name.as_str()) {
                return Err(SchemaError::DuplicateField(spec.name.clone()));
            }
            spec.check()?;
        }
        Ok(Self { fields })
    }

    /// The vehicle pricing schema the shipped model is trained on
    pub fn vehicle() -> Self {
        Self {
            fields: vehicle_fields(),
        }
    }

    pub fn fields(&self) -> &[FeatureSpec] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FeatureSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|spec| spec.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Structured dump of the schema for discovery endpoints
    pub fn describe(&self) -> SchemaDescription {
        SchemaDescription {
            fields: self
                .fields
                .iter()
                .map(|spec| (spec.name.clone(), FieldDescription::from(spec)))
                .collect(),
        }
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::vehicle()
    }
}

fn vehicle_fields() -> Vec<FeatureSpec> {
    vec![
        FeatureSpec::categorical(
            "Brand",
            &[
                "Toyota",
                "Honda",
                "Ford",
                "BMW",
                "Mercedes",
                "Audi",
                "Volkswagen",
                "Hyundai",
            ],
        ),
        FeatureSpec::categorical(
            "Model",
            &["Sedan", "SUV", "Hatchback", "Coupe", "Truck", "Convertible"],
        ),
        FeatureSpec::numeric("Year", 1900, Some(2030)),
        FeatureSpec::numeric("KM_Driven", 0, None),
        FeatureSpec::categorical("Fuel", &["Petrol", "Diesel", "Electric", "Hybrid"]),
        FeatureSpec::categorical("Seller_Type", &["Individual", "Dealer", "Trustmark Dealer"]),
        FeatureSpec::categorical("Transmission", &["Manual", "Automatic"]),
        FeatureSpec::categorical(
            "Owner",
            &[
                "First Owner",
                "Second Owner",
                "Third Owner",
                "Fourth & Above Owner",
            ],
        ),
    ]
}

/// Serializable schema dump, an object keyed by field name in schema order
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescription {
    pub fields: Vec<(String, FieldDescription)>,
}

impl SchemaDescription {
    pub fn get(&self, name: &str) -> Option<&FieldDescription> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, description)| description)
    }
}

impl Serialize for SchemaDescription {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, description) in &self.fields {
            map.serialize_entry(name, description)?;
        }
        map.end()
    }
}

/// Description of a single field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescription {
    /// `categorical` or `numerical`
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub required: bool,
    #[serde(flatten)]
    pub domain: FieldDomain,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldDomain {
    Categorical {
        valid_values: Vec<String>,
    },
    Numeric {
        min_value: i64,
        max_value: Option<i64>,
    },
}

impl From<&FeatureSpec> for FieldDescription {
    fn from(spec: &FeatureSpec) -> Self {
        match &spec.kind {
            FeatureKind::Categorical { allowed_values } => Self {
                kind: "categorical",
                required: spec.required,
                domain: FieldDomain::Categorical {
                    valid_values: allowed_values.clone(),
                },
            },
            FeatureKind::Numeric { min, max } => Self {
                kind: "numerical",
                required: spec.required,
                domain: FieldDomain::Numeric {
                    min_value: *min,
                    max_value: *max,
                },
            },
        }
    }
}
