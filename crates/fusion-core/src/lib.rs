//! Shared data model for the multi-source fusion workspace.
//!
//! Every other crate speaks in these types: raw provider observations,
//! data points, fusion results, provider health and the weight vector that
//! steers fusion.

pub mod config;
pub mod error;
pub mod health;
pub mod observation;
pub mod stats;
pub mod telemetry;
pub mod types;
pub mod weights;

pub use error::*;
pub use health::*;
pub use observation::*;
pub use types::*;
pub use weights::*;
