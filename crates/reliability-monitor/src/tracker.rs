use chrono::{DateTime, Utc};
use fusion_core::{stats, HealthState, ProviderHealth};
use std::collections::VecDeque;

use crate::config::MonitorThresholds;
use crate::probe::{ProbeError, ProbeOutcome};

/// One recorded probe cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSample {
    pub at: DateTime<Utc>,
    pub success: bool,
    pub latency_ms: f64,
    pub quality: Option<f64>,
    pub error: Option<ProbeError>,
}

impl ProbeSample {
    pub fn from_outcome(outcome: ProbeOutcome, measured_ms: f64, at: DateTime<Utc>) -> Self {
        let latency_ms = outcome
            .latency_ms
            .filter(|l| l.is_finite() && *l >= 0.0)
            .unwrap_or(measured_ms);
        let quality = outcome.quality().map(stats::clamp_unit);
        let error = if outcome.success {
            None
        } else {
            Some(ProbeError::Failure(
                outcome.error.unwrap_or_else(|| "probe reported failure".to_string()),
            ))
        };
        Self {
            at,
            success: outcome.success,
            latency_ms,
            quality,
            error,
        }
    }

    pub fn from_error(error: ProbeError, measured_ms: f64, at: DateTime<Utc>) -> Self {
        Self {
            at,
            success: false,
            latency_ms: measured_ms,
            quality: None,
            error: Some(error),
        }
    }

    pub fn timed_out(&self) -> bool {
        matches!(self.error, Some(ProbeError::Timeout { .. }))
    }
}

/// Rolling statistics and current state of one source. Only the source's own
/// probe cycle writes to it.
#[derive(Debug, Clone)]
pub struct SourceTracker {
    source: String,
    critical: bool,
    samples: VecDeque<ProbeSample>,
    consecutive_failures: u32,
    consecutive_timeouts: u32,
    total_probes: u64,
    error_count: u64,
    last_error: Option<String>,
    state: HealthState,
}

/// Aggregates over the evaluation windows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub uptime: f64,
    pub quality: Option<f64>,
}

impl SourceTracker {
    pub fn new(source: impl Into<String>, critical: bool) -> Self {
        Self {
            source: source.into(),
            critical,
            samples: VecDeque::new(),
            consecutive_failures: 0,
            consecutive_timeouts: 0,
            total_probes: 0,
            error_count: 0,
            last_error: None,
            state: HealthState::Unknown,
        }
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    pub fn set_critical(&mut self, critical: bool) {
        self.critical = critical;
    }

    /// Records a sample and re-evaluates. Returns `(old, new)` on a state change.
    pub fn record(
        &mut self,
        sample: ProbeSample,
        thresholds: &MonitorThresholds,
    ) -> Option<(HealthState, HealthState)> {
        self.total_probes += 1;
        if sample.success {
            self.consecutive_failures = 0;
            self.consecutive_timeouts = 0;
        } else {
            self.consecutive_failures += 1;
            self.error_count += 1;
            if sample.timed_out() {
                self.consecutive_timeouts += 1;
            } else {
                self.consecutive_timeouts = 0;
            }
            self.last_error = sample.error.as_ref().map(|e| e.to_string());
        }

        let capacity = thresholds.window_size.max(thresholds.uptime_window);
        self.samples.push_back(sample);
        while self.samples.len() > capacity {
            self.samples.pop_front();
        }

        let next = self.evaluate(thresholds);
        let previous = self.state;
        self.state = next;
        (previous != next).then_some((previous, next))
    }

    pub fn window_stats(&self, thresholds: &MonitorThresholds) -> WindowStats {
        let recent: Vec<&ProbeSample> = self.samples.iter().rev().take(thresholds.window_size).collect();
        let success_rate = if recent.is_empty() {
            0.0
        } else {
            recent.iter().filter(|s| s.success).count() as f64 / recent.len() as f64
        };

        let latencies: Vec<f64> = recent.iter().filter(|s| s.success).map(|s| s.latency_ms).collect();
        let qualities: Vec<f64> = recent.iter().filter_map(|s| s.quality).collect();

        let uptime_samples: Vec<bool> = self
            .samples
            .iter()
            .rev()
            .take(thresholds.uptime_window)
            .map(|s| s.success)
            .collect();
        let uptime = if uptime_samples.is_empty() {
            0.0
        } else {
            uptime_samples.iter().filter(|ok| **ok).count() as f64 / uptime_samples.len() as f64
        };

        WindowStats {
            success_rate,
            avg_latency_ms: stats::mean(&latencies),
            uptime,
            quality: (!qualities.is_empty()).then(|| stats::mean(&qualities)),
        }
    }

    fn evaluate(&self, t: &MonitorThresholds) -> HealthState {
        let Some(last) = self.samples.back() else {
            return HealthState::Unknown;
        };
        if self.consecutive_timeouts >= t.offline_after_timeouts {
            return HealthState::Offline;
        }

        // A failure streak shorter than the critical limit leaves a settled
        // state alone; the streak limit or the window decides once it ends.
        let settled = !matches!(self.state, HealthState::Unknown | HealthState::Offline);
        if settled && !last.success && self.consecutive_failures < t.consecutive_failures_critical {
            return self.state;
        }

        let w = self.window_stats(t);
        let quality_below = |limit: f64| w.quality.map_or(false, |q| q < limit);
        // Leaving Critical takes a success rate back at the warning level.
        let success_critical = if self.state == HealthState::Critical {
            t.success_rate_warning
        } else {
            t.success_rate_critical
        };

        if w.success_rate < success_critical
            || w.avg_latency_ms > t.response_time_critical_ms
            || self.consecutive_failures >= t.consecutive_failures_critical
            || quality_below(t.quality_score_critical)
        {
            HealthState::Critical
        } else if w.success_rate < t.success_rate_warning
            || w.avg_latency_ms > t.response_time_warning_ms
            || quality_below(t.quality_score_warning)
            || self.poor_uptime(t, w.uptime)
        {
            HealthState::Warning
        } else {
            HealthState::Healthy
        }
    }

    /// Uptime only counts once its window is full, and never beyond Warning.
    fn poor_uptime(&self, t: &MonitorThresholds, uptime: f64) -> bool {
        self.samples.len() >= t.uptime_window && uptime < t.uptime_warning
    }

    pub fn health(&self, thresholds: &MonitorThresholds) -> ProviderHealth {
        let last = self.samples.back();
        if last.is_none() {
            return ProviderHealth::unknown(self.source.clone(), self.critical);
        }
        let w = self.window_stats(thresholds);
        ProviderHealth {
            source: self.source.clone(),
            state: self.state,
            critical: self.critical,
            last_latency_ms: last.map(|s| s.latency_ms),
            last_success: last.map(|s| s.success),
            consecutive_failures: self.consecutive_failures,
            success_rate: w.success_rate,
            avg_latency_ms: w.avg_latency_ms,
            uptime: w.uptime,
            data_quality: w.quality,
            total_probes: self.total_probes,
            error_count: self.error_count,
            last_error: self.last_error.clone(),
            last_checked: last.map(|s| s.at),
        }
    }
}

/// Weighted reliability in [0, 1] from a health snapshot: 0.3 success rate,
/// 0.3 uptime, 0.2 response time, 0.2 data quality. The quality share is
/// spread over the rest when the source reports no quality.
pub fn reliability_score(health: &ProviderHealth, thresholds: &MonitorThresholds) -> Option<f64> {
    if health.total_probes == 0 {
        return None;
    }
    let response = (1.0 - health.avg_latency_ms / thresholds.response_time_critical_ms).max(0.0);
    let base = 0.3 * health.success_rate + 0.3 * health.uptime + 0.2 * response;
    let score = match health.data_quality {
        Some(q) => base + 0.2 * q,
        None => base / 0.8,
    };
    Some(stats::clamp_unit(score))
}
