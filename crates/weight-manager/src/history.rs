use chrono::{DateTime, Utc};
use fusion_core::WeightVector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::strategy::AdjustmentStrategy;

/// Deltas smaller than this do not count as an adjustment.
const CHANGE_EPSILON: f64 = 1e-9;
/// Net change over the trend window that separates a trend from noise.
const TREND_BAND: f64 = 0.005;
const TREND_WINDOW: usize = 5;

/// One published update cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightAdjustment {
    pub timestamp: DateTime<Utc>,
    pub strategy: AdjustmentStrategy,
    /// New weight minus previously published weight, per source.
    pub deltas: BTreeMap<String, f64>,
    pub weights: WeightVector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightTrend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAdjustmentSummary {
    pub adjustments: usize,
    pub total_abs_change: f64,
    pub mean_abs_change: f64,
    pub last_weight: f64,
    pub trend: WeightTrend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentSummary {
    pub since: Option<DateTime<Utc>>,
    pub cycles: usize,
    pub sources_adjusted: usize,
    pub sources: BTreeMap<String, SourceAdjustmentSummary>,
}

impl AdjustmentSummary {
    pub(crate) fn from_history<'a, I>(since: Option<DateTime<Utc>>, entries: I) -> Self
    where
        I: IntoIterator<Item = &'a WeightAdjustment>,
    {
        let mut cycles = 0usize;
        let mut per_source: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut last_weights: BTreeMap<String, f64> = BTreeMap::new();

        for entry in entries {
            if since.map(|t| entry.timestamp < t).unwrap_or(false) {
                continue;
            }
            cycles += 1;
            for (source, delta) in &entry.deltas {
                per_source.entry(source.clone()).or_default().push(*delta);
            }
            for (source, weight) in entry.weights.iter() {
                last_weights.insert(source.to_string(), weight);
            }
        }

        let sources: BTreeMap<String, SourceAdjustmentSummary> = per_source
            .into_iter()
            .map(|(source, deltas)| {
                let changed: Vec<f64> = deltas.iter().copied().filter(|d| d.abs() > CHANGE_EPSILON).collect();
                let total_abs_change: f64 = changed.iter().map(|d| d.abs()).sum();
                let mean_abs_change = if changed.is_empty() {
                    0.0
                } else {
                    total_abs_change / changed.len() as f64
                };
                let summary = SourceAdjustmentSummary {
                    adjustments: changed.len(),
                    total_abs_change,
                    mean_abs_change,
                    last_weight: last_weights.get(&source).copied().unwrap_or(0.0),
                    trend: trend_of(&deltas),
                };
                (source, summary)
            })
            .collect();

        Self {
            since,
            cycles,
            sources_adjusted: sources.values().filter(|s| s.adjustments > 0).count(),
            sources,
        }
    }
}

fn trend_of(deltas: &[f64]) -> WeightTrend {
    let start = deltas.len().saturating_sub(TREND_WINDOW);
    let net: f64 = deltas[start..].iter().sum();
    if net > TREND_BAND {
        WeightTrend::Increasing
    } else if net < -TREND_BAND {
        WeightTrend::Decreasing
    } else {
        WeightTrend::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn adjustment(at: DateTime<Utc>, deltas: &[(&str, f64)], weights: &[(&str, f64)]) -> WeightAdjustment {
        WeightAdjustment {
            timestamp: at,
            strategy: AdjustmentStrategy::Balanced,
            deltas: deltas.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            weights: WeightVector::new(weights.iter().map(|(k, v)| (k.to_string(), *v)).collect()).unwrap(),
        }
    }

    #[test]
    fn test_summary_trends() {
        let t0 = Utc::now();
        let history = vec![
            adjustment(t0, &[("a", 0.02), ("b", -0.02)], &[("a", 0.52), ("b", 0.48)]),
            adjustment(t0 + Duration::seconds(1), &[("a", 0.02), ("b", -0.02)], &[("a", 0.54), ("b", 0.46)]),
            adjustment(t0 + Duration::seconds(2), &[("a", 0.0), ("b", 0.0)], &[("a", 0.54), ("b", 0.46)]),
        ];

        let summary = AdjustmentSummary::from_history(None, &history);
        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.sources_adjusted, 2);
        let a = &summary.sources["a"];
        assert_eq!(a.adjustments, 2);
        assert!((a.total_abs_change - 0.04).abs() < 1e-12);
        assert!((a.mean_abs_change - 0.02).abs() < 1e-12);
        assert_eq!(a.last_weight, 0.54);
        assert_eq!(a.trend, WeightTrend::Increasing);
        assert_eq!(summary.sources["b"].trend, WeightTrend::Decreasing);

        let later = AdjustmentSummary::from_history(Some(t0 + Duration::seconds(2)), &history);
        assert_eq!(later.cycles, 1);
        assert_eq!(later.sources_adjusted, 0);
        assert_eq!(later.sources["a"].trend, WeightTrend::Stable);
    }
}
