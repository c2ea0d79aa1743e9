use fusion_core::config::{ensure_non_negative, ensure_partition, ensure_positive, ensure_strictly_decreasing, ensure_unit};
use fusion_core::{DataType, FusionError, QualityGrade, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Weights of the six quality dimensions in the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionWeights {
    pub completeness: f64,
    pub accuracy: f64,
    pub timeliness: f64,
    pub consistency: f64,
    pub validity: f64,
    pub reliability: f64,
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            completeness: 0.20,
            accuracy: 0.25,
            timeliness: 0.20,
            consistency: 0.15,
            validity: 0.15,
            reliability: 0.05,
        }
    }
}

impl DimensionWeights {
    fn as_pairs(&self) -> [(&'static str, f64); 6] {
        [
            ("completeness", self.completeness),
            ("accuracy", self.accuracy),
            ("timeliness", self.timeliness),
            ("consistency", self.consistency),
            ("validity", self.validity),
            ("reliability", self.reliability),
        ]
    }
}

/// Lower bounds of each grade. Anything below `fair` is poor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeThresholds {
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
}

impl Default for GradeThresholds {
    fn default() -> Self {
        Self {
            excellent: 0.90,
            good: 0.75,
            fair: 0.60,
        }
    }
}

impl GradeThresholds {
    pub fn grade_for(&self, score: f64) -> QualityGrade {
        if score >= self.excellent {
            QualityGrade::Excellent
        } else if score >= self.good {
            QualityGrade::Good
        } else if score >= self.fair {
            QualityGrade::Fair
        } else {
            QualityGrade::Poor
        }
    }
}

/// Age window for one data type: full score up to `budget_secs`, zero from
/// `cutoff_secs` on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Freshness {
    pub budget_secs: i64,
    pub cutoff_secs: i64,
}

impl Freshness {
    pub const fn new(budget_secs: i64, cutoff_secs: i64) -> Self {
        Self { budget_secs, cutoff_secs }
    }
}

const DEFAULT_FRESHNESS: Freshness = Freshness::new(30 * 60, 72 * 3600);

fn default_freshness_table() -> BTreeMap<DataType, Freshness> {
    BTreeMap::from([
        (DataType::Price, Freshness::new(30 * 60, 24 * 3600)),
        (DataType::Volume, Freshness::new(30 * 60, 24 * 3600)),
        (DataType::Technical, Freshness::new(30 * 60, 24 * 3600)),
        (DataType::Sentiment, Freshness::new(2 * 3600, 72 * 3600)),
        (DataType::News, Freshness::new(2 * 3600, 72 * 3600)),
        (DataType::Fundamental, Freshness::new(24 * 3600, 30 * 24 * 3600)),
    ])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub dimension_weights: DimensionWeights,
    pub grade_thresholds: GradeThresholds,
    pub freshness: BTreeMap<DataType, Freshness>,
    /// Relative deviation from the reference at which consistency reaches 0.
    pub consistency_tolerance: f64,
    /// Score used when a dimension cannot be evaluated.
    pub neutral_score: f64,
    /// Reliability assumed for sources the monitor does not know.
    pub default_reliability: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            dimension_weights: DimensionWeights::default(),
            grade_thresholds: GradeThresholds::default(),
            freshness: default_freshness_table(),
            consistency_tolerance: 0.05,
            neutral_score: 0.5,
            default_reliability: 0.5,
        }
    }
}

impl QualityConfig {
    pub fn validate(&self) -> Result<()> {
        ensure_partition("dimension_weights", &self.dimension_weights.as_pairs())?;

        let g = &self.grade_thresholds;
        for (name, v) in [("excellent", g.excellent), ("good", g.good), ("fair", g.fair)] {
            ensure_unit(&format!("grade_thresholds.{}", name), v)?;
        }
        ensure_strictly_decreasing("grade_thresholds", &[g.excellent, g.good, g.fair])?;

        for (data_type, f) in &self.freshness {
            ensure_non_negative(&format!("freshness.{}.budget_secs", data_type), f.budget_secs as f64)?;
            if f.budget_secs >= f.cutoff_secs {
                return Err(FusionError::config(format!(
                    "freshness.{}: budget {}s must be below cutoff {}s",
                    data_type, f.budget_secs, f.cutoff_secs
                )));
            }
        }

        ensure_positive("consistency_tolerance", self.consistency_tolerance)?;
        ensure_unit("neutral_score", self.neutral_score)?;
        ensure_unit("default_reliability", self.default_reliability)?;
        Ok(())
    }

    pub fn freshness_for(&self, data_type: DataType) -> Freshness {
        self.freshness.get(&data_type).copied().unwrap_or(DEFAULT_FRESHNESS)
    }
}
