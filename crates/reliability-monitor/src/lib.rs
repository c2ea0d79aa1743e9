//! Provider health monitoring.
//!
//! Each registered source gets its own cancellable probe task. Every probe is
//! time-bounded, its outcome lands in a rolling window, and the window is
//! classified into a [`HealthState`](fusion_core::HealthState). State changes
//! raise alerts that are logged and broadcast to subscribers.

pub mod alerts;
pub mod config;
pub mod monitor;
pub mod probe;
pub mod report;
pub mod tracker;

pub use alerts::{Alert, AlertSeverity};
pub use config::{MonitorConfig, MonitorThresholds};
pub use monitor::ReliabilityMonitor;
pub use probe::{BlockingProbe, FnProbe, HealthProbe, ProbeError, ProbeOptions, ProbeOutcome};
pub use report::{MonitoringReport, PerformanceSummary, StateCounts};

#[cfg(test)]
mod tests;
