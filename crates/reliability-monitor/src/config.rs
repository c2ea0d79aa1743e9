use anyhow::Result as AnyResult;
use fusion_core::config::{ensure_non_negative, ensure_ordered, ensure_unit, env_or, load_dotenv};
use fusion_core::{FusionError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits that classify a source's rolling statistics into a health state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorThresholds {
    pub response_time_warning_ms: f64,
    pub response_time_critical_ms: f64,
    pub success_rate_warning: f64,
    pub success_rate_critical: f64,
    pub quality_score_warning: f64,
    pub quality_score_critical: f64,
    /// Uptime below this over a full `uptime_window` keeps a source at
    /// Warning or worse.
    pub uptime_warning: f64,
    pub consecutive_failures_critical: u32,
    /// Consecutive timeouts before a source is declared offline.
    pub offline_after_timeouts: u32,
    /// Samples used for success rate, latency and quality.
    pub window_size: usize,
    /// Samples used for uptime. At least `window_size`.
    pub uptime_window: usize,
}

impl Default for MonitorThresholds {
    fn default() -> Self {
        Self {
            response_time_warning_ms: 5000.0,
            response_time_critical_ms: 10000.0,
            success_rate_warning: 0.9,
            success_rate_critical: 0.8,
            quality_score_warning: 0.7,
            quality_score_critical: 0.5,
            uptime_warning: 0.95,
            consecutive_failures_critical: 3,
            offline_after_timeouts: 2,
            window_size: 10,
            uptime_window: 288,
        }
    }
}

impl MonitorThresholds {
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("response_time_warning_ms", self.response_time_warning_ms)?;
        ensure_ordered(
            "response_time_warning_ms < response_time_critical_ms",
            self.response_time_warning_ms,
            self.response_time_critical_ms,
        )?;

        for (name, critical, warning) in [
            ("success_rate", self.success_rate_critical, self.success_rate_warning),
            ("quality_score", self.quality_score_critical, self.quality_score_warning),
        ] {
            ensure_unit(&format!("{}_critical", name), critical)?;
            ensure_unit(&format!("{}_warning", name), warning)?;
            ensure_ordered(&format!("{}_critical < {}_warning", name, name), critical, warning)?;
        }
        ensure_unit("uptime_warning", self.uptime_warning)?;

        if self.window_size == 0 || self.uptime_window == 0 {
            return Err(FusionError::config("window sizes must be greater than zero"));
        }
        if self.uptime_window < self.window_size {
            return Err(FusionError::config("uptime_window must not be shorter than window_size"));
        }
        if self.consecutive_failures_critical == 0 || self.offline_after_timeouts == 0 {
            return Err(FusionError::config(
                "consecutive failure and timeout limits must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub probe_interval_secs: u64,
    pub probe_timeout_ms: u64,
    pub alert_log_capacity: usize,
    pub alert_channel_capacity: usize,
    pub thresholds: MonitorThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_interval_secs: 300,
            probe_timeout_ms: 10_000,
            alert_log_capacity: 1000,
            alert_channel_capacity: 256,
            thresholds: MonitorThresholds::default(),
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> AnyResult<Self> {
        load_dotenv();
        let defaults = Self::default();
        let mut thresholds = defaults.thresholds.clone();
        thresholds.window_size = env_or("MONITOR_WINDOW_SIZE", thresholds.window_size)?;

        let config = Self {
            probe_interval_secs: env_or("MONITOR_PROBE_INTERVAL_SECS", defaults.probe_interval_secs)?,
            probe_timeout_ms: env_or("MONITOR_PROBE_TIMEOUT_MS", defaults.probe_timeout_ms)?,
            thresholds,
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.probe_interval_secs == 0 || self.probe_timeout_ms == 0 {
            return Err(FusionError::config("probe interval and timeout must be greater than zero"));
        }
        if self.alert_log_capacity == 0 || self.alert_channel_capacity == 0 {
            return Err(FusionError::config("alert capacities must be greater than zero"));
        }
        self.thresholds.validate()
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(MonitorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let mut t = MonitorThresholds::default();
        t.success_rate_critical = 0.95;
        assert!(t.validate().is_err());

        let mut t = MonitorThresholds::default();
        t.response_time_critical_ms = 1000.0;
        assert!(t.validate().is_err());

        let mut t = MonitorThresholds::default();
        t.window_size = 0;
        assert!(t.validate().is_err());

        let mut t = MonitorThresholds::default();
        t.uptime_window = 5;
        assert!(t.validate().is_err());
    }
}
