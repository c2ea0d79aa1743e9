//! Dynamic source weights.
//!
//! Each update cycle scores every source's recent performance, moves its
//! weight toward a desirability-proportional target by at most the strategy's
//! cap, keeps every live source at or above the floor and publishes the new
//! vector to the shared store the fusion engine reads.

pub mod config;
pub mod history;
pub mod manager;
pub mod strategy;

pub use config::WeightConfig;
pub use history::{AdjustmentSummary, SourceAdjustmentSummary, WeightAdjustment, WeightTrend};
pub use manager::WeightManager;
pub use strategy::{AdjustmentStrategy, SourcePerformance, StrategyCaps};
