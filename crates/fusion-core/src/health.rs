use std::collections::HashMap;

use crate::HealthState;

/// Read-only view of provider health, shared by the analyzer and the weight
/// manager. Implemented by the reliability monitor.
pub trait HealthView: Send + Sync {
    fn health_state(&self, source: &str) -> HealthState;

    /// Composite reliability in [0, 1], `None` for unknown sources.
    fn reliability_score(&self, source: &str) -> Option<f64>;
}

/// Fixed health table for callers without a running monitor.
#[derive(Debug, Clone, Default)]
pub struct StaticHealth {
    entries: HashMap<String, (HealthState, Option<f64>)>,
}

impl StaticHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl Into<String>, state: HealthState, reliability: Option<f64>) -> Self {
        self.entries.insert(source.into(), (state, reliability));
        self
    }
}

impl HealthView for StaticHealth {
    fn health_state(&self, source: &str) -> HealthState {
        self.entries
            .get(source)
            .map(|(state, _)| *state)
            .unwrap_or(HealthState::Unknown)
    }

    fn reliability_score(&self, source: &str) -> Option<f64> {
        self.entries.get(source).and_then(|(_, r)| *r)
    }
}
