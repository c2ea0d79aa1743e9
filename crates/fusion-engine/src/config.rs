use anyhow::Result as AnyResult;
use fusion_core::config::{ensure_non_negative, ensure_ordered, ensure_positive, env_or, load_dotenv};
use fusion_core::{FusionAlgorithm, Result};
use serde::{Deserialize, Serialize};

/// Adaptive thresholds and confidence shaping for the fusion engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Below this dispersion adaptive fusion trusts the weight vector.
    pub low_cv: f64,
    /// Above this dispersion adaptive fusion falls back to the median.
    pub high_cv: f64,
    /// |mean| under which the coefficient of variation is replaced by a
    /// scaled IQR.
    pub mean_epsilon: f64,
    pub confidence_dispersion_penalty: f64,
    pub default_algorithm: FusionAlgorithm,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            low_cv: 0.05,
            high_cv: 0.20,
            mean_epsilon: 1e-6,
            confidence_dispersion_penalty: 1.0,
            default_algorithm: FusionAlgorithm::AdaptiveFusion,
        }
    }
}

impl FusionConfig {
    pub fn from_env() -> AnyResult<Self> {
        load_dotenv();
        let defaults = Self::default();
        let config = Self {
            low_cv: env_or("FUSION_ADAPTIVE_LOW_CV", defaults.low_cv)?,
            high_cv: env_or("FUSION_ADAPTIVE_HIGH_CV", defaults.high_cv)?,
            default_algorithm: env_or("FUSION_DEFAULT_ALGORITHM", defaults.default_algorithm)?,
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("low_cv", self.low_cv)?;
        ensure_non_negative("high_cv", self.high_cv)?;
        ensure_ordered("adaptive cv thresholds", self.low_cv, self.high_cv)?;
        ensure_positive("mean_epsilon", self.mean_epsilon)?;
        ensure_non_negative("confidence_dispersion_penalty", self.confidence_dispersion_penalty)?;
        Ok(())
    }

    /// Algorithm adaptive fusion applies at the given dispersion.
    pub fn resolve_adaptive(&self, dispersion: f64) -> FusionAlgorithm {
        if dispersion < self.low_cv {
            FusionAlgorithm::WeightedAverage
        } else if dispersion > self.high_cv {
            FusionAlgorithm::MedianFusion
        } else {
            FusionAlgorithm::QualityWeighted
        }
    }
}
