//! Symbol-level composite scoring.
//!
//! [`ScoringSystem::score`] grades every provider record, fuses each metric
//! across providers, derives technical, fundamental, sentiment, quality and
//! risk subscores and combines them into one 0 to 100 score with a grade,
//! recommendation and risk level.

pub mod categories;
pub mod config;
pub mod scoring;
pub mod types;

pub use config::{CategoryWeights, ScoringConfig, ThresholdTable, Tier};
pub use scoring::ScoringSystem;
pub use types::{
    AuxSignal, CategoryScore, Grade, Recommendation, RiskLevel, ScoreCategory, ScoringResult, SourceObservation,
};

#[cfg(test)]
mod tests;
