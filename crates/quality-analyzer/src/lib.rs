//! Per-observation data quality scoring.
//!
//! [`QualityAnalyzer`] grades one raw provider record along completeness,
//! accuracy, timeliness, consistency, validity and reliability. Bad input
//! never fails the call; it lowers the affected dimension and shows up in
//! [`QualityMetrics::degradations`](fusion_core::QualityMetrics).

pub mod analyzer;
pub mod config;
pub mod history;
pub mod rules;

pub use analyzer::QualityAnalyzer;
pub use config::{DimensionWeights, Freshness, GradeThresholds, QualityConfig};
pub use history::{QualityHistory, QualitySample, QualityTrend, QualityTrendSummary};

#[cfg(test)]
mod tests;
