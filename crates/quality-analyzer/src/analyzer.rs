use chrono::{DateTime, Utc};
use fusion_core::stats::{clamp_unit, linear_decay};
use fusion_core::{
    DataType, Degradation, HealthView, QualityMetrics, RawObservation, Result, TimestampField,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::QualityConfig;
use crate::rules::{rules_for, BoundOutcome, FieldSpec, RuleSet};

/// References closer to zero than this are compared by absolute deviation.
const REFERENCE_EPSILON: f64 = 1e-9;

const REQUIRED_SHARE: f64 = 0.7;
const OPTIONAL_SHARE: f64 = 0.3;

/// Scores a single raw observation along six quality dimensions.
///
/// Pure with respect to its inputs: the only outside state it reads is the
/// optional health view for the reliability dimension.
pub struct QualityAnalyzer {
    config: QualityConfig,
    health: Option<Arc<dyn HealthView>>,
}

impl QualityAnalyzer {
    pub fn new(config: QualityConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, health: None })
    }

    /// Attach a reliability source, usually the running monitor.
    pub fn with_health(mut self, health: Arc<dyn HealthView>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    pub fn analyze(&self, source: &str, raw: &RawObservation, data_type: DataType) -> QualityMetrics {
        self.analyze_at(source, raw, data_type, None, Utc::now())
    }

    /// `reference` is the current fused value or the sibling consensus.
    pub fn analyze_with_reference(
        &self,
        source: &str,
        raw: &RawObservation,
        data_type: DataType,
        reference: Option<f64>,
    ) -> QualityMetrics {
        self.analyze_at(source, raw, data_type, reference, Utc::now())
    }

    /// Same as [`analyze_with_reference`](Self::analyze_with_reference) with an explicit clock.
    pub fn analyze_at(
        &self,
        source: &str,
        raw: &RawObservation,
        data_type: DataType,
        reference: Option<f64>,
        now: DateTime<Utc>,
    ) -> QualityMetrics {
        let rules = rules_for(data_type);
        let mut degradations = Vec::new();

        let completeness = self.completeness(rules, raw, &mut degradations);
        let accuracy = self.accuracy(rules, raw);
        let timeliness = self.timeliness(data_type, raw, now, &mut degradations);
        let consistency = self.consistency(rules, raw, reference);
        let validity = self.validity(rules, raw, &mut degradations);
        let reliability = self.reliability(source);

        let w = &self.config.dimension_weights;
        let overall_score = clamp_unit(
            completeness * w.completeness
                + accuracy * w.accuracy
                + timeliness * w.timeliness
                + consistency * w.consistency
                + validity * w.validity
                + reliability * w.reliability,
        );
        let grade = self.config.grade_thresholds.grade_for(overall_score);

        if degradations.is_empty() {
            debug!(source, data_type = %data_type, score = overall_score, "Quality analyzed");
        } else {
            warn!(
                source,
                data_type = %data_type,
                score = overall_score,
                issues = degradations.len(),
                "Degraded observation"
            );
        }

        QualityMetrics {
            source: source.to_string(),
            data_type,
            completeness,
            accuracy,
            timeliness,
            consistency,
            validity,
            reliability,
            overall_score,
            grade,
            degradations,
            analyzed_at: now,
        }
    }

    fn completeness(&self, rules: &RuleSet, raw: &RawObservation, degradations: &mut Vec<Degradation>) -> f64 {
        let weighted_presence = |fields: &[FieldSpec]| -> Option<f64> {
            let total: f64 = fields.iter().map(|f| f.importance).sum();
            if total <= 0.0 {
                return None;
            }
            let present: f64 = fields
                .iter()
                .filter(|f| raw.is_present(f.name))
                .map(|f| f.importance)
                .sum();
            Some(present / total)
        };

        let missing: Vec<String> = rules
            .required
            .iter()
            .filter(|f| !raw.is_present(f.name))
            .map(|f| f.name.to_string())
            .collect();
        if !missing.is_empty() {
            degradations.push(Degradation::MissingFields { fields: missing });
        }

        let required = weighted_presence(rules.required).unwrap_or(0.0);
        let score = match weighted_presence(rules.optional) {
            Some(optional) => required * REQUIRED_SHARE + optional * OPTIONAL_SHARE,
            None => required,
        };
        clamp_unit(score)
    }

    fn accuracy(&self, rules: &RuleSet, raw: &RawObservation) -> f64 {
        let outcomes: Vec<bool> = rules.checks.iter().filter_map(|c| c.evaluate(raw)).collect();
        if outcomes.is_empty() {
            return self.config.neutral_score;
        }
        outcomes.iter().filter(|ok| **ok).count() as f64 / outcomes.len() as f64
    }

    fn timeliness(
        &self,
        data_type: DataType,
        raw: &RawObservation,
        now: DateTime<Utc>,
        degradations: &mut Vec<Degradation>,
    ) -> f64 {
        match raw.timestamp() {
            TimestampField::Missing => {
                degradations.push(Degradation::MissingTimestamp);
                self.config.neutral_score
            }
            TimestampField::Malformed(text) => {
                degradations.push(Degradation::MalformedTimestamp { raw: text });
                0.0
            }
            TimestampField::Parsed(ts) => {
                // Future timestamps count as fresh.
                let age_secs = (now - ts).num_seconds().max(0);
                let freshness = self.config.freshness_for(data_type);
                if age_secs > freshness.budget_secs {
                    degradations.push(Degradation::StaleTimestamp { age_secs });
                }
                linear_decay(
                    age_secs as f64,
                    freshness.budget_secs as f64,
                    freshness.cutoff_secs as f64,
                )
            }
        }
    }

    fn consistency(&self, rules: &RuleSet, raw: &RawObservation, reference: Option<f64>) -> f64 {
        let (Some(value), Some(reference)) = (
            raw.number(rules.value_field).filter(|v| v.is_finite()),
            reference.filter(|r| r.is_finite()),
        ) else {
            return self.config.neutral_score;
        };

        let deviation = if reference.abs() < REFERENCE_EPSILON {
            (value - reference).abs()
        } else {
            (value - reference).abs() / reference.abs()
        };
        (1.0 - deviation / self.config.consistency_tolerance).max(0.0)
    }

    fn validity(&self, rules: &RuleSet, raw: &RawObservation, degradations: &mut Vec<Degradation>) -> f64 {
        let mut applicable = 0usize;
        let mut satisfied = 0usize;
        for bound in rules.bounds {
            match bound.evaluate(raw) {
                BoundOutcome::NotApplicable => {}
                BoundOutcome::Satisfied => {
                    applicable += 1;
                    satisfied += 1;
                }
                BoundOutcome::Violated { field, value } => {
                    applicable += 1;
                    degradations.push(Degradation::OutOfRange {
                        field: field.to_string(),
                        value,
                    });
                }
            }
        }
        if applicable == 0 {
            return self.config.neutral_score;
        }
        satisfied as f64 / applicable as f64
    }

    fn reliability(&self, source: &str) -> f64 {
        self.health
            .as_ref()
            .and_then(|h| h.reliability_score(source))
            .filter(|r| r.is_finite())
            .map(clamp_unit)
            .unwrap_or(self.config.default_reliability)
    }
}

impl Default for QualityAnalyzer {
    fn default() -> Self {
        Self {
            config: QualityConfig::default(),
            health: None,
        }
    }
}
