//! Statistical helpers shared by fusion and scoring.
//!
//! Thin wrappers over `statrs` that return neutral values on degenerate
//! input (empty slices, a single sample) instead of NaN.

use statrs::statistics::{Data, Median, OrderStatistics, Statistics};

/// Compute the mean of a data slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().mean()
}

/// Compute sample standard deviation. Zero for fewer than two samples.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let sd = data.iter().std_dev();
    if sd.is_finite() { sd } else { 0.0 }
}

/// Statistical median. Even-length input averages the two middle values.
pub fn median(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    Data::new(data.to_vec()).median()
}

/// Spread between the first and third quartile.
pub fn interquartile_range(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let mut d = Data::new(data.to_vec());
    let iqr = d.interquartile_range();
    if iqr.is_finite() { iqr.max(0.0) } else { 0.0 }
}

/// Relative dispersion of `data`.
///
/// Coefficient of variation (sample std-dev over |mean|). When |mean| falls
/// below `mean_epsilon` the CV is meaningless, so the IQR scaled by the
/// largest magnitude is used instead.
pub fn dispersion(data: &[f64], mean_epsilon: f64) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    if m.abs() < mean_epsilon {
        let max_abs = data.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        if max_abs < f64::EPSILON {
            return 0.0;
        }
        return interquartile_range(data) / max_abs;
    }
    std_dev(data) / m.abs()
}

/// Weighted mean of `(value, weight)` pairs. `None` when the weights sum to zero.
pub fn weighted_mean<I>(pairs: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let (num, den) = pairs
        .into_iter()
        .fold((0.0, 0.0), |(n, d), (v, w)| (n + v * w, d + w));
    if den.abs() < f64::EPSILON {
        None
    } else {
        Some(num / den)
    }
}

/// Clamp into [0, 1], mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// 1.0 up to `full`, linear decay to 0.0 at `zero`, 0.0 beyond.
pub fn linear_decay(x: f64, full: f64, zero: f64) -> f64 {
    if x <= full {
        1.0
    } else if x >= zero {
        0.0
    } else {
        1.0 - (x - full) / (zero - full)
    }
}
