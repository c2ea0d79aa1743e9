use anyhow::Result as AnyResult;
use fusion_core::config::{ensure_non_negative, ensure_unit, env_or, load_dotenv};
use fusion_core::{FusionError, Result, WeightVector};
use serde::{Deserialize, Serialize};

use crate::strategy::{AdjustmentStrategy, StrategyCaps};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    pub strategy: AdjustmentStrategy,
    /// Minimum weight of every source that is not offline.
    pub floor: f64,
    pub caps: StrategyCaps,
    /// Smoothing factor of the per-source desirability baseline.
    pub baseline_alpha: f64,
    pub history_limit: usize,
    pub initial: Option<WeightVector>,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            strategy: AdjustmentStrategy::Balanced,
            floor: 0.01,
            caps: StrategyCaps::default(),
            baseline_alpha: 0.3,
            history_limit: 10_000,
            initial: None,
        }
    }
}

impl WeightConfig {
    pub fn from_env() -> AnyResult<Self> {
        load_dotenv();
        let defaults = Self::default();
        let config = Self {
            strategy: env_or("WEIGHT_STRATEGY", defaults.strategy)?,
            floor: env_or("WEIGHT_FLOOR", defaults.floor)?,
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure_unit("floor", self.floor)?;
        if self.floor >= 1.0 {
            return Err(FusionError::config("floor must be below 1.0"));
        }

        let c = &self.caps;
        ensure_non_negative("caps.conservative", c.conservative)?;
        ensure_non_negative("caps.balanced", c.balanced)?;
        ensure_non_negative("caps.aggressive", c.aggressive)?;
        if !(c.conservative <= c.balanced && c.balanced <= c.aggressive) {
            return Err(FusionError::config(format!(
                "caps must be ordered conservative <= balanced <= aggressive, got {:?}",
                c
            )));
        }

        ensure_unit("baseline_alpha", self.baseline_alpha)?;
        if self.history_limit == 0 {
            return Err(FusionError::config("history_limit must be greater than zero"));
        }
        if let Some(initial) = &self.initial {
            ensure_floor_fits(initial.len(), self.floor)?;
        }
        Ok(())
    }
}

/// `n` sources can all sit at `floor` only while n * floor <= 1.
pub fn ensure_floor_fits(n: usize, floor: f64) -> Result<()> {
    if n as f64 * floor > 1.0 + fusion_core::WEIGHT_SUM_TOLERANCE {
        return Err(FusionError::config(format!(
            "{} sources with a floor of {} exceed the total weight",
            n, floor
        )));
    }
    Ok(())
}
