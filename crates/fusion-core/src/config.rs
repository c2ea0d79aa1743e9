//! Validation and environment helpers shared by every component config.

use anyhow::{Context, Result as AnyResult};
use std::env;
use std::str::FromStr;

use crate::weights::WEIGHT_SUM_TOLERANCE;
use crate::{FusionError, Result};

/// Loads `.env` once; missing files are fine.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Reads `key` from the environment, falling back to `default`, and parses it.
pub fn env_or<T>(key: &str, default: T) -> AnyResult<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        _ => Ok(default),
    }
}

pub fn ensure_unit(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(FusionError::config(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

pub fn ensure_non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(FusionError::config(format!(
            "{} must be non-negative, got {}",
            name, value
        )));
    }
    Ok(())
}

pub fn ensure_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(FusionError::config(format!(
            "{} must be positive, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Weights are non-negative and sum to 1 within tolerance.
pub fn ensure_partition(name: &str, weights: &[(&str, f64)]) -> Result<()> {
    for (label, w) in weights {
        ensure_non_negative(&format!("{}.{}", name, label), *w)?;
    }
    let sum: f64 = weights.iter().map(|(_, w)| w).sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(FusionError::config(format!(
            "{} must sum to 1.0, got {:.6}",
            name, sum
        )));
    }
    Ok(())
}

/// Cutoffs are listed best first and must strictly decrease.
pub fn ensure_strictly_decreasing(name: &str, cutoffs: &[f64]) -> Result<()> {
    if cutoffs.iter().any(|c| !c.is_finite()) {
        return Err(FusionError::config(format!("{} contains a non-finite cutoff", name)));
    }
    if cutoffs.windows(2).any(|pair| pair[0] <= pair[1]) {
        return Err(FusionError::config(format!(
            "{} cutoffs must be strictly decreasing: {:?}",
            name, cutoffs
        )));
    }
    Ok(())
}

/// `low` sits strictly below `high`.
pub fn ensure_ordered(name: &str, low: f64, high: f64) -> Result<()> {
    if !(low < high) {
        return Err(FusionError::config(format!(
            "{}: expected {} < {}",
            name, low, high
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_checks_sum_and_sign() {
        assert!(ensure_partition("w", &[("a", 0.25), ("b", 0.75)]).is_ok());
        assert!(matches!(
            ensure_partition("w", &[("a", 0.25), ("b", 0.70)]),
            Err(FusionError::Configuration(_))
        ));
        assert!(ensure_partition("w", &[("a", 1.5), ("b", -0.5)]).is_err());
    }

    #[test]
    fn test_strictly_decreasing() {
        assert!(ensure_strictly_decreasing("grades", &[0.9, 0.75, 0.6]).is_ok());
        assert!(ensure_strictly_decreasing("grades", &[0.9, 0.9, 0.6]).is_err());
        assert!(ensure_strictly_decreasing("grades", &[0.6, 0.75]).is_err());
    }

    #[test]
    fn test_ordered_rejects_nan() {
        assert!(ensure_ordered("cv", 0.05, 0.2).is_ok());
        assert!(ensure_ordered("cv", 0.2, 0.05).is_err());
        assert!(ensure_ordered("cv", f64::NAN, 0.05).is_err());
    }

    #[test]
    fn test_env_or_falls_back_and_parses() {
        std::env::remove_var("FUSION_CORE_TEST_UNSET");
        assert_eq!(env_or("FUSION_CORE_TEST_UNSET", 7u64).unwrap(), 7);

        std::env::set_var("FUSION_CORE_TEST_BAD", "seven");
        assert!(env_or("FUSION_CORE_TEST_BAD", 7u64).is_err());

        std::env::set_var("FUSION_CORE_TEST_GOOD", " 0.25 ");
        assert_eq!(env_or("FUSION_CORE_TEST_GOOD", 0.0f64).unwrap(), 0.25);
    }
}
