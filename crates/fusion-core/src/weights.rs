use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{FusionError, Result};

/// Allowed deviation of a weight vector's sum from 1.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Per-source fusion weights. Always a partition of 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct WeightVector {
    weights: BTreeMap<String, f64>,
}

impl WeightVector {
    /// Validates every weight in [0, 1] and the sum within tolerance of 1.
    /// An empty map is the empty vector.
    pub fn new(weights: BTreeMap<String, f64>) -> Result<Self> {
        if weights.is_empty() {
            return Ok(Self::default());
        }
        for (source, w) in &weights {
            if !w.is_finite() || *w < 0.0 || *w > 1.0 {
                return Err(FusionError::invalid(format!(
                    "weight for '{}' must be within [0, 1], got {}",
                    source, w
                )));
            }
        }
        let sum: f64 = weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(FusionError::invalid(format!(
                "weights must sum to 1, got {:.8}",
                sum
            )));
        }
        Ok(Self { weights })
    }

    pub fn uniform<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = sources.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Self::default();
        }
        let w = 1.0 / names.len() as f64;
        Self {
            weights: names.into_iter().map(|n| (n, w)).collect(),
        }
    }

    /// Scales non-negative raw scores into a partition. Negative or
    /// non-finite entries count as zero; an all-zero input becomes uniform.
    pub fn normalized(raw: BTreeMap<String, f64>) -> Self {
        let cleaned: BTreeMap<String, f64> = raw
            .into_iter()
            .map(|(k, v)| (k, if v.is_finite() && v > 0.0 { v } else { 0.0 }))
            .collect();
        let total: f64 = cleaned.values().sum();
        if total <= f64::EPSILON {
            return Self::uniform(cleaned.into_keys());
        }
        Self {
            weights: cleaned.into_iter().map(|(k, v)| (k, v / total)).collect(),
        }
    }

    pub fn get(&self, source: &str) -> Option<f64> {
        self.weights.get(source).copied()
    }

    pub fn contains(&self, source: &str) -> bool {
        self.weights.contains_key(source)
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }
}

impl TryFrom<BTreeMap<String, f64>> for WeightVector {
    type Error = FusionError;

    fn try_from(weights: BTreeMap<String, f64>) -> Result<Self> {
        Self::new(weights)
    }
}

impl From<WeightVector> for BTreeMap<String, f64> {
    fn from(v: WeightVector) -> Self {
        v.weights
    }
}

/// Copy-on-write handle to the current weight vector.
///
/// Readers clone the inner `Arc` and keep a consistent vector for as long as
/// they need it; writers replace the whole vector.
#[derive(Debug, Clone, Default)]
pub struct SharedWeights {
    inner: Arc<RwLock<Arc<WeightVector>>>,
}

impl SharedWeights {
    pub fn new(initial: WeightVector) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    pub fn snapshot(&self) -> Arc<WeightVector> {
        self.inner.read().clone()
    }

    pub fn publish(&self, vector: WeightVector) {
        *self.inner.write() = Arc::new(vector);
    }
}
