//! Estimator implementations
//!
//! Every estimator is built from its [`EstimatorSpec`] after structural
//! checks, so scoring itself cannot fail or loop.

use std::fmt;

use super::artifact::{EstimatorSpec, NodeSpec, TreeSpec};
use crate::error::LoadError;

/// A fitted regression function over a fixed-width feature vector
pub trait Regressor: Send + Sync + fmt::Debug {
    /// Width of the input vector
    fn n_features(&self) -> usize;

    /// Raw model output, before any clamping
    fn predict_raw(&self, features: &[f64]) -> f64;

    /// Per-member outputs for ensembles whose prediction is their mean
    fn estimator_outputs(&self, _features: &[f64]) -> Option<Vec<f64>> {
        None
    }

    fn n_estimators(&self) -> usize {
        1
    }
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf(f64),
}

/// Binary regression tree stored as a flat node array
#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Build a tree, requiring children to point strictly forward
    pub fn from_spec(spec: &TreeSpec, n_features: usize) -> Result<Self, LoadError> {
        let len = spec.nodes.len();
        if len == 0 {
            return Err(LoadError::incompatible("tree has no nodes"));
        }

        let mut nodes = Vec::with_capacity(len);
        for (i, node) in spec.nodes.iter().enumerate() {
            let node = match *node {
                NodeSpec::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= n_features {
                        return Err(LoadError::incompatible(format!(
                            "node {} splits on feature {} but the model has {} features",
                            i, feature, n_features
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(LoadError::incompatible(format!(
                            "node {} has a non-finite threshold",
                            i
                        )));
                    }
                    for child in [left, right] {
                        if child <= i || child >= len {
                            return Err(LoadError::incompatible(format!(
                                "node {} has invalid child index {}",
                                i, child
                            )));
                        }
                    }
                    Node::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    }
                }
                NodeSpec::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(LoadError::incompatible(format!(
                            "leaf {} has a non-finite value",
                            i
                        )));
                    }
                    Node::Leaf(value)
                }
            };
            nodes.push(node);
        }

        Ok(Self { nodes })
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                Node::Leaf(value) => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features[feature] <= threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Mean of independently trained trees
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl Regressor for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_raw(&self, features: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(features)).sum();
        sum / self.trees.len() as f64
    }

    fn estimator_outputs(&self, features: &[f64]) -> Option<Vec<f64>> {
        Some(self.trees.iter().map(|tree| tree.predict(features)).collect())
    }

    fn n_estimators(&self) -> usize {
        self.trees.len()
    }
}

/// Additive boosted trees
#[derive(Debug, Clone)]
pub struct GradientBoosting {
    base_score: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl Regressor for GradientBoosting {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_raw(&self, features: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(features)).sum();
        self.base_score + self.learning_rate * sum
    }

    fn n_estimators(&self) -> usize {
        self.trees.len()
    }
}

#[derive(Debug, Clone)]
pub struct LinearModel {
    intercept: f64,
    coefficients: Vec<f64>,
}

impl Regressor for LinearModel {
    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn predict_raw(&self, features: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }
}

fn build_trees(trees: &[TreeSpec], n_features: usize) -> Result<Vec<RegressionTree>, LoadError> {
    if trees.is_empty() {
        return Err(LoadError::incompatible("ensemble has no trees"));
    }
    trees
        .iter()
        .map(|tree| RegressionTree::from_spec(tree, n_features))
        .collect()
}

/// Build a checked estimator for a vector of width `n_features`
pub fn build(spec: &EstimatorSpec, n_features: usize) -> Result<Box<dyn Regressor>, LoadError> {
    match spec {
        EstimatorSpec::Forest { trees } => Ok(Box::new(RandomForest {
            trees: build_trees(trees, n_features)?,
            n_features,
        })),
        EstimatorSpec::Boosting {
            base_score,
            learning_rate,
            trees,
        } => {
            if !base_score.is_finite() || !learning_rate.is_finite() {
                return Err(LoadError::incompatible(
                    "boosting parameters must be finite",
                ));
            }
            Ok(Box::new(GradientBoosting {
                base_score: *base_score,
                learning_rate: *learning_rate,
                trees: build_trees(trees, n_features)?,
                n_features,
            }))
        }
        EstimatorSpec::Linear {
            intercept,
            coefficients,
        } => {
            if coefficients.len() != n_features {
                return Err(LoadError::incompatible(format!(
                    "linear model has {} coefficients for {} features",
                    coefficients.len(),
                    n_features
                )));
            }
            if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                return Err(LoadError::incompatible("linear weights must be finite"));
            }
            Ok(Box::new(LinearModel {
                intercept: *intercept,
                coefficients: coefficients.clone(),
            }))
        }
    }
}
