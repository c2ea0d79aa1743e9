//! Multi-source value fusion.
//!
//! [`FusionEngine::fuse`] validates a set of same-typed data points, applies
//! one of the closed [`FusionAlgorithm`](fusion_core::FusionAlgorithm)
//! rules and reports the fused value with confidence, quality, dispersion and
//! the weights each source received.

pub mod algorithms;
pub mod config;
pub mod engine;

pub use config::FusionConfig;
pub use engine::FusionEngine;
