use chrono::Utc;
use fusion_core::stats::{clamp_unit, dispersion};
use fusion_core::{
    DataPoint, Degradation, FusionAlgorithm, FusionError, FusionResult, Result, SharedWeights,
};
use tracing::{debug, warn};

use crate::algorithms::{self, Aggregate, Sample};
use crate::config::FusionConfig;

/// Combines same-typed data points from several providers into one value.
///
/// Reads the current weight snapshot on every call and never mutates it.
#[derive(Debug, Clone)]
pub struct FusionEngine {
    config: FusionConfig,
    weights: SharedWeights,
}

impl FusionEngine {
    pub fn new(config: FusionConfig, weights: SharedWeights) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, weights })
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn fuse_default(&self, points: &[DataPoint]) -> Result<FusionResult> {
        self.fuse(points, self.config.default_algorithm)
    }

    pub fn fuse(&self, points: &[DataPoint], algorithm: FusionAlgorithm) -> Result<FusionResult> {
        let first = points
            .first()
            .ok_or_else(|| FusionError::invalid("cannot fuse an empty point set"))?;
        let data_type = first.data_type;
        if let Some(other) = points.iter().find(|p| p.data_type != data_type) {
            return Err(FusionError::invalid(format!(
                "mixed data types: {} and {}",
                data_type, other.data_type
            )));
        }

        let (samples, degradations) = prepare(points);
        if samples.is_empty() {
            return Err(FusionError::invalid(format!(
                "all {} {} values are non-finite",
                points.len(),
                data_type
            )));
        }
        if !degradations.is_empty() {
            warn!(data_type = %data_type, issues = degradations.len(), "Fusing degraded input");
        }

        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        let spread = dispersion(&values, self.config.mean_epsilon);
        let (resolved, aggregate) = self.apply(algorithm, &samples, spread);

        let penalty = 1.0 / (1.0 + self.config.confidence_dispersion_penalty * spread);
        let result = FusionResult {
            data_type,
            fused_value: aggregate.value,
            confidence: clamp_unit(aggregate.confidence(&samples) * penalty),
            quality_score: clamp_unit(aggregate.quality(&samples)),
            algorithm,
            resolved_algorithm: resolved,
            dispersion: spread,
            source_weights: aggregate.source_weights(&samples),
            contributing_sources: contributing_sources(&samples),
            degradations,
            timestamp: Utc::now(),
        };

        debug!(
            data_type = %data_type,
            algorithm = %algorithm,
            resolved = %resolved,
            sources = samples.len(),
            dispersion = spread,
            value = result.fused_value,
            "Fused data points"
        );
        Ok(result)
    }

    /// Runs `algorithm` and returns the rule that actually produced the
    /// aggregate. Adaptive fusion picks its rule from `spread`.
    fn apply(&self, algorithm: FusionAlgorithm, samples: &[Sample], spread: f64) -> (FusionAlgorithm, Aggregate) {
        let aggregate = match algorithm {
            FusionAlgorithm::WeightedAverage => {
                let snapshot = self.weights.snapshot();
                algorithms::weighted_average(samples, &snapshot)
            }
            FusionAlgorithm::MedianFusion => algorithms::median_fusion(samples),
            FusionAlgorithm::ConfidenceWeighted => algorithms::confidence_weighted(samples),
            FusionAlgorithm::QualityWeighted => algorithms::quality_weighted(samples),
            FusionAlgorithm::AdaptiveFusion => {
                return self.apply(self.config.resolve_adaptive(spread), samples, spread);
            }
        };
        (algorithm, aggregate)
    }
}

/// Drops non-finite values and clamps scores into [0, 1], reporting both.
fn prepare(points: &[DataPoint]) -> (Vec<Sample>, Vec<Degradation>) {
    let mut samples = Vec::with_capacity(points.len());
    let mut degradations = Vec::new();

    for p in points {
        if !p.value.is_finite() {
            degradations.push(Degradation::NonFiniteValue {
                source: p.source.clone(),
            });
            continue;
        }
        let mut score = |field: &str, raw: f64| {
            let clamped = clamp_unit(raw);
            if clamped != raw {
                degradations.push(Degradation::ClampedScore {
                    source: p.source.clone(),
                    field: field.to_string(),
                    value: raw,
                });
            }
            clamped
        };
        let quality = score("quality_score", p.quality_score);
        let confidence = score("confidence", p.confidence);
        samples.push(Sample {
            source: p.source.clone(),
            value: p.value,
            confidence,
            quality,
        });
    }
    (samples, degradations)
}

fn contributing_sources(samples: &[Sample]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(samples.len());
    for s in samples {
        if !out.contains(&s.source) {
            out.push(s.source.clone());
        }
    }
    out
}
