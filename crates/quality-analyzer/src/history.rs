use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fusion_core::{stats, DataType, QualityMetrics};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Samples averaged for the current and previous trend windows.
const TREND_WINDOW: usize = 10;
/// Change in average quality that counts as a trend.
const TREND_BAND: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualitySample {
    pub score: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTrend {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityTrendSummary {
    pub source: String,
    pub data_type: DataType,
    pub current_average: f64,
    pub previous_average: f64,
    pub change: f64,
    pub trend: QualityTrend,
    pub sample_count: usize,
}

/// Bounded quality history per (source, data type). Safe to record into from
/// many tasks at once.
pub struct QualityHistory {
    samples: DashMap<(String, DataType), VecDeque<QualitySample>>,
    capacity: usize,
}

impl QualityHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, metrics: &QualityMetrics) {
        let mut entry = self
            .samples
            .entry((metrics.source.clone(), metrics.data_type))
            .or_default();
        if entry.len() >= self.capacity {
            entry.pop_front();
        }
        entry.push_back(QualitySample {
            score: metrics.overall_score,
            recorded_at: metrics.analyzed_at,
        });
    }

    pub fn sample_count(&self, source: &str, data_type: DataType) -> usize {
        self.samples
            .get(&(source.to_string(), data_type))
            .map(|s| s.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean of the last `n` scores.
    pub fn recent_average(&self, source: &str, data_type: DataType, n: usize) -> Option<f64> {
        let entry = self.samples.get(&(source.to_string(), data_type))?;
        if entry.is_empty() || n == 0 {
            return None;
        }
        let scores: Vec<f64> = entry.iter().rev().take(n).map(|s| s.score).collect();
        Some(stats::mean(&scores))
    }

    /// Trend per key, optionally restricted to one source. Sorted by source
    /// then data type.
    pub fn summary(&self, source_filter: Option<&str>) -> Vec<QualityTrendSummary> {
        let mut out: Vec<QualityTrendSummary> = self
            .samples
            .iter()
            .filter(|e| source_filter.map_or(true, |s| e.key().0 == s))
            .filter(|e| !e.value().is_empty())
            .map(|e| {
                let (source, data_type) = e.key().clone();
                let scores: Vec<f64> = e.value().iter().map(|s| s.score).collect();
                summarize(source, data_type, &scores)
            })
            .collect();
        out.sort_by(|a, b| (&a.source, a.data_type).cmp(&(&b.source, b.data_type)));
        out
    }

    pub fn clear(&self) {
        self.samples.clear();
    }
}

impl Default for QualityHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

fn summarize(source: String, data_type: DataType, scores: &[f64]) -> QualityTrendSummary {
    let split = scores.len().saturating_sub(TREND_WINDOW);
    let (older, recent) = scores.split_at(split);
    let previous_window = &older[older.len().saturating_sub(TREND_WINDOW)..];

    let current_average = stats::mean(recent);
    let previous_average = if previous_window.is_empty() {
        current_average
    } else {
        stats::mean(previous_window)
    };
    let change = current_average - previous_average;
    let trend = if change > TREND_BAND {
        QualityTrend::Improving
    } else if change < -TREND_BAND {
        QualityTrend::Declining
    } else {
        QualityTrend::Stable
    };

    QualityTrendSummary {
        source,
        data_type,
        current_average,
        previous_average,
        change,
        trend,
        sample_count: scores.len(),
    }
}
