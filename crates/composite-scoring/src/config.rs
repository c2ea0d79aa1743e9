use fusion_core::config::{ensure_partition, ensure_positive, ensure_strictly_decreasing};
use fusion_core::{FusionAlgorithm, FusionError, Result};
use serde::{Deserialize, Serialize};

use crate::types::{Grade, Recommendation, RiskLevel, ScoreCategory};

/// Share of each category in the overall score. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    pub technical: f64,
    pub fundamental: f64,
    pub sentiment: f64,
    pub quality: f64,
    pub risk: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            technical: 0.25,
            fundamental: 0.30,
            sentiment: 0.20,
            quality: 0.15,
            risk: 0.10,
        }
    }
}

impl CategoryWeights {
    pub fn get(&self, category: ScoreCategory) -> f64 {
        match category {
            ScoreCategory::Technical => self.technical,
            ScoreCategory::Fundamental => self.fundamental,
            ScoreCategory::Sentiment => self.sentiment,
            ScoreCategory::Quality => self.quality,
            ScoreCategory::Risk => self.risk,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tier<T> {
    pub min_score: f64,
    pub value: T,
}

/// Score cutoffs listed best first; scores below every cutoff get `otherwise`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable<T> {
    pub tiers: Vec<Tier<T>>,
    pub otherwise: T,
}

impl<T: Copy> ThresholdTable<T> {
    fn new(tiers: &[(f64, T)], otherwise: T) -> Self {
        Self {
            tiers: tiers.iter().map(|&(min_score, value)| Tier { min_score, value }).collect(),
            otherwise,
        }
    }

    pub fn lookup(&self, score: f64) -> T {
        self.tiers
            .iter()
            .find(|t| score >= t.min_score)
            .map(|t| t.value)
            .unwrap_or(self.otherwise)
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        let cutoffs: Vec<f64> = self.tiers.iter().map(|t| t.min_score).collect();
        ensure_strictly_decreasing(name, &cutoffs)?;
        if let Some(bad) = cutoffs.iter().find(|c| !(0.0..=100.0).contains(*c)) {
            return Err(FusionError::config(format!(
                "{} cutoff {} is outside [0, 100]",
                name, bad
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub category_weights: CategoryWeights,
    pub grades: ThresholdTable<Grade>,
    pub recommendations: ThresholdTable<Recommendation>,
    /// Looked up with the risk subscore, where higher means safer.
    pub risk_levels: ThresholdTable<RiskLevel>,
    pub fusion_algorithm: FusionAlgorithm,
    /// Age at which a news signal counts half.
    pub sentiment_half_life_hours: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            category_weights: CategoryWeights::default(),
            grades: ThresholdTable::new(
                &[
                    (90.0, Grade::APlus),
                    (85.0, Grade::A),
                    (80.0, Grade::AMinus),
                    (75.0, Grade::BPlus),
                    (70.0, Grade::B),
                    (65.0, Grade::BMinus),
                    (60.0, Grade::CPlus),
                    (55.0, Grade::C),
                    (50.0, Grade::CMinus),
                ],
                Grade::D,
            ),
            recommendations: ThresholdTable::new(
                &[
                    (80.0, Recommendation::StrongBuy),
                    (70.0, Recommendation::Buy),
                    (60.0, Recommendation::CautiousBuy),
                    (50.0, Recommendation::Hold),
                ],
                Recommendation::Avoid,
            ),
            risk_levels: ThresholdTable::new(
                &[(80.0, RiskLevel::Low), (60.0, RiskLevel::Medium), (40.0, RiskLevel::MediumHigh)],
                RiskLevel::High,
            ),
            fusion_algorithm: FusionAlgorithm::AdaptiveFusion,
            sentiment_half_life_hours: 24.0,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        let w = &self.category_weights;
        ensure_partition(
            "category_weights",
            &[
                ("technical", w.technical),
                ("fundamental", w.fundamental),
                ("sentiment", w.sentiment),
                ("quality", w.quality),
                ("risk", w.risk),
            ],
        )?;
        self.grades.validate("grades")?;
        self.recommendations.validate("recommendations")?;
        self.risk_levels.validate("risk_levels")?;
        ensure_positive("sentiment_half_life_hours", self.sentiment_half_life_hours)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tables() {
        let config = ScoringConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grades.lookup(92.0), Grade::APlus);
        assert_eq!(config.grades.lookup(85.0), Grade::A);
        assert_eq!(config.grades.lookup(49.9), Grade::D);
        assert_eq!(config.recommendations.lookup(65.0), Recommendation::CautiousBuy);
        assert_eq!(config.risk_levels.lookup(39.0), RiskLevel::High);
    }

    #[test]
    fn test_grade_is_monotonic_in_score() {
        let config = ScoringConfig::default();
        let order = |g: Grade| config.grades.tiers.iter().position(|t| t.value == g).unwrap_or(usize::MAX);
        let mut last = order(config.grades.lookup(0.0));
        for step in 1..=100 {
            let current = order(config.grades.lookup(step as f64));
            assert!(current <= last, "grade got worse at {}", step);
            last = current;
        }
    }

    #[test]
    fn test_rejects_bad_weights_and_tables() {
        let mut config = ScoringConfig::default();
        config.category_weights.risk = 0.2;
        assert!(matches!(config.validate(), Err(FusionError::Configuration(_))));

        let mut config = ScoringConfig::default();
        config.recommendations.tiers[1].min_score = 85.0;
        assert!(config.validate().is_err());

        let mut config = ScoringConfig::default();
        config.grades.tiers[0].min_score = 120.0;
        assert!(config.validate().is_err());
    }
}
