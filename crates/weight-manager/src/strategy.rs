use fusion_core::{FusionError, HealthState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How far a source's weight may move in one update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentStrategy {
    Conservative,
    Balanced,
    Aggressive,
    /// Balanced cap scaled by how far a source strays from its own baseline.
    Adaptive,
}

impl AdjustmentStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentStrategy::Conservative => "conservative",
            AdjustmentStrategy::Balanced => "balanced",
            AdjustmentStrategy::Aggressive => "aggressive",
            AdjustmentStrategy::Adaptive => "adaptive",
        }
    }
}

impl fmt::Display for AdjustmentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdjustmentStrategy {
    type Err = FusionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(AdjustmentStrategy::Conservative),
            "balanced" => Ok(AdjustmentStrategy::Balanced),
            "aggressive" => Ok(AdjustmentStrategy::Aggressive),
            "adaptive" => Ok(AdjustmentStrategy::Adaptive),
            other => Err(FusionError::invalid(format!("unknown adjustment strategy '{}'", other))),
        }
    }
}

/// Per-cycle change caps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyCaps {
    pub conservative: f64,
    pub balanced: f64,
    pub aggressive: f64,
}

impl Default for StrategyCaps {
    fn default() -> Self {
        Self {
            conservative: 0.02,
            balanced: 0.05,
            aggressive: 0.10,
        }
    }
}

impl StrategyCaps {
    /// Cap for one source. `desirability` and `baseline` only matter for the
    /// adaptive strategy.
    pub fn cap_for(&self, strategy: AdjustmentStrategy, desirability: f64, baseline: Option<f64>) -> f64 {
        match strategy {
            AdjustmentStrategy::Conservative => self.conservative,
            AdjustmentStrategy::Balanced => self.balanced,
            AdjustmentStrategy::Aggressive => self.aggressive,
            AdjustmentStrategy::Adaptive => match baseline.filter(|b| *b > f64::EPSILON) {
                Some(b) => {
                    let scaled = self.balanced * (1.0 + (desirability - b).abs() / b);
                    scaled.clamp(self.conservative, self.aggressive)
                }
                None => self.balanced,
            },
        }
    }
}

/// Performance inputs for one source in one update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourcePerformance {
    pub reliability: f64,
    pub response_time_ms: f64,
    pub success_rate: f64,
    pub uptime: f64,
    pub data_quality: f64,
}

impl SourcePerformance {
    pub fn validate(&self, source: &str) -> fusion_core::Result<()> {
        for (name, v) in [
            ("reliability", self.reliability),
            ("success_rate", self.success_rate),
            ("uptime", self.uptime),
            ("data_quality", self.data_quality),
        ] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(FusionError::invalid(format!(
                    "{}: {} must be within [0, 1], got {}",
                    source, name, v
                )));
            }
        }
        if !self.response_time_ms.is_finite() || self.response_time_ms < 0.0 {
            return Err(FusionError::invalid(format!(
                "{}: response_time_ms must be non-negative, got {}",
                source, self.response_time_ms
            )));
        }
        Ok(())
    }

    /// Weighted desirability in [0, 1].
    pub fn desirability(&self, state: HealthState) -> f64 {
        let response_score = (1.0 - self.response_time_ms / 10_000.0).max(0.1);
        0.25 * self.reliability
            + 0.20 * self.success_rate
            + 0.20 * self.uptime
            + 0.15 * self.data_quality
            + 0.15 * state.to_score()
            + 0.05 * response_score
    }
}
