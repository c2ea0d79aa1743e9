//! The four concrete fusion rules. Adaptive fusion only picks among them.

use fusion_core::stats::{median, weighted_mean};
use fusion_core::WeightVector;
use std::collections::BTreeMap;

/// A data point that survived pre-validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub source: String,
    pub value: f64,
    pub confidence: f64,
    pub quality: f64,
}

/// Fused value plus the normalized per-sample weights that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub value: f64,
    pub weights: Vec<f64>,
}

impl Aggregate {
    pub fn confidence(&self, samples: &[Sample]) -> f64 {
        self.blend(samples, |s| s.confidence)
    }

    pub fn quality(&self, samples: &[Sample]) -> f64 {
        self.blend(samples, |s| s.quality)
    }

    /// Per-source weights; repeated sources accumulate.
    pub fn source_weights(&self, samples: &[Sample]) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        for (s, w) in samples.iter().zip(&self.weights) {
            *out.entry(s.source.clone()).or_insert(0.0) += w;
        }
        out
    }

    fn blend(&self, samples: &[Sample], field: impl Fn(&Sample) -> f64) -> f64 {
        weighted_mean(samples.iter().zip(&self.weights).map(|(s, w)| (field(s), *w))).unwrap_or(0.0)
    }
}

/// Weights from the shared vector. Sources missing from it get 1/n.
pub fn weighted_average(samples: &[Sample], vector: &WeightVector) -> Aggregate {
    let uniform = 1.0 / samples.len() as f64;
    let raw: Vec<f64> = samples
        .iter()
        .map(|s| vector.get(&s.source).unwrap_or(uniform))
        .collect();
    combine(samples, raw)
}

pub fn median_fusion(samples: &[Sample]) -> Aggregate {
    let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
    Aggregate {
        value: median(&values),
        weights: vec![1.0 / samples.len() as f64; samples.len()],
    }
}

pub fn confidence_weighted(samples: &[Sample]) -> Aggregate {
    combine(samples, samples.iter().map(|s| s.confidence).collect())
}

pub fn quality_weighted(samples: &[Sample]) -> Aggregate {
    combine(samples, samples.iter().map(|s| s.quality).collect())
}

/// Normalizes `raw` and takes the weighted mean. All-zero weights fall back
/// to uniform.
fn combine(samples: &[Sample], raw: Vec<f64>) -> Aggregate {
    let total: f64 = raw.iter().sum();
    let weights: Vec<f64> = if total > f64::EPSILON {
        raw.iter().map(|w| w / total).collect()
    } else {
        vec![1.0 / samples.len() as f64; samples.len()]
    };
    let value = weighted_mean(samples.iter().zip(&weights).map(|(s, w)| (s.value, *w))).unwrap_or(0.0);
    Aggregate { value, weights }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(source: &str, value: f64, confidence: f64, quality: f64) -> Sample {
        Sample {
            source: source.to_string(),
            value,
            confidence,
            quality,
        }
    }

    #[test]
    fn test_zero_weights_fall_back_to_uniform() {
        let samples = vec![sample("a", 10.0, 0.0, 0.0), sample("b", 20.0, 0.0, 0.0)];
        let agg = confidence_weighted(&samples);
        assert_eq!(agg.value, 15.0);
        assert_eq!(agg.weights, vec![0.5, 0.5]);
    }

    #[test]
    fn test_weighted_average_fills_missing_sources() {
        let vector = WeightVector::new(
            [("a".to_string(), 0.75), ("z".to_string(), 0.25)].into_iter().collect(),
        )
        .unwrap();
        let samples = vec![sample("a", 10.0, 1.0, 1.0), sample("b", 20.0, 1.0, 1.0)];
        let agg = weighted_average(&samples, &vector);

        // a keeps 0.75, b gets 1/2, then both are normalized.
        assert!((agg.weights[0] - 0.6).abs() < 1e-12);
        assert!((agg.value - 14.0).abs() < 1e-12);
    }

    #[test]
    fn test_repeated_sources_accumulate() {
        let samples = vec![
            sample("a", 10.0, 1.0, 1.0),
            sample("a", 11.0, 1.0, 1.0),
            sample("b", 12.0, 1.0, 1.0),
        ];
        let weights = median_fusion(&samples).source_weights(&samples);
        assert!((weights["a"] - 2.0 / 3.0).abs() < 1e-12);
    }
}
