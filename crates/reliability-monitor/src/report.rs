use chrono::{DateTime, Utc};
use fusion_core::{stats, HealthState, ProviderHealth};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::alerts::Alert;
use crate::config::MonitorThresholds;
use crate::tracker::reliability_score;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub healthy: usize,
    pub warning: usize,
    pub critical: usize,
    pub offline: usize,
    pub unknown: usize,
}

impl StateCounts {
    fn add(&mut self, state: HealthState) {
        match state {
            HealthState::Healthy => self.healthy += 1,
            HealthState::Warning => self.warning += 1,
            HealthState::Critical => self.critical += 1,
            HealthState::Offline => self.offline += 1,
            HealthState::Unknown => self.unknown += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.healthy + self.warning + self.critical + self.offline + self.unknown
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub avg_response_ms: f64,
    pub overall_success_rate: f64,
    pub overall_uptime: f64,
    pub best_source: Option<String>,
    pub worst_source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringReport {
    pub timestamp: DateTime<Utc>,
    pub overall_status: HealthState,
    pub counts: StateCounts,
    pub sources: BTreeMap<String, ProviderHealth>,
    pub active_alerts: Vec<Alert>,
    pub performance_summary: PerformanceSummary,
}

impl MonitoringReport {
    pub fn build(
        health: &HashMap<String, ProviderHealth>,
        active_alerts: Vec<Alert>,
        thresholds: &MonitorThresholds,
    ) -> Self {
        let sources: BTreeMap<String, ProviderHealth> =
            health.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        let mut counts = StateCounts::default();
        for h in sources.values() {
            counts.add(h.state);
        }

        Self {
            timestamp: Utc::now(),
            overall_status: overall_status(sources.values()),
            counts,
            performance_summary: summarize(&sources, thresholds),
            sources,
            active_alerts,
        }
    }
}

/// Critical when a critical source is down, warning when anything is
/// degraded, healthy otherwise.
pub fn overall_status<'a>(sources: impl Iterator<Item = &'a ProviderHealth>) -> HealthState {
    let mut status = HealthState::Healthy;
    for h in sources {
        if h.critical && matches!(h.state, HealthState::Critical | HealthState::Offline) {
            return HealthState::Critical;
        }
        if h.state.is_degraded() {
            status = HealthState::Warning;
        }
    }
    status
}

fn summarize(sources: &BTreeMap<String, ProviderHealth>, thresholds: &MonitorThresholds) -> PerformanceSummary {
    let probed: Vec<&ProviderHealth> = sources.values().filter(|h| h.total_probes > 0).collect();
    if probed.is_empty() {
        return PerformanceSummary::default();
    }

    let latencies: Vec<f64> = probed.iter().map(|h| h.avg_latency_ms).collect();
    let success: Vec<f64> = probed.iter().map(|h| h.success_rate).collect();
    let uptime: Vec<f64> = probed.iter().map(|h| h.uptime).collect();

    let mut ranked: Vec<(&str, f64)> = probed
        .iter()
        .filter_map(|h| reliability_score(h, thresholds).map(|s| (h.source.as_str(), s)))
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    PerformanceSummary {
        avg_response_ms: stats::mean(&latencies),
        overall_success_rate: stats::mean(&success),
        overall_uptime: stats::mean(&uptime),
        best_source: ranked.first().map(|(s, _)| s.to_string()),
        worst_source: ranked.last().map(|(s, _)| s.to_string()),
    }
}
