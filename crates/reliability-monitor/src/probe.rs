use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Aux key whose value feeds the data quality dimension.
pub const QUALITY_SCORE_KEY: &str = "quality_score";

/// What a single health check observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub success: bool,
    /// Latency reported by the probe itself; wall time is used when absent.
    pub latency_ms: Option<f64>,
    #[serde(default)]
    pub aux: HashMap<String, f64>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_latency_ms(mut self, latency_ms: f64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_quality(self, quality: f64) -> Self {
        self.with_aux(QUALITY_SCORE_KEY, quality)
    }

    pub fn with_aux(mut self, key: impl Into<String>, value: f64) -> Self {
        self.aux.insert(key.into(), value);
        self
    }

    pub fn quality(&self) -> Option<f64> {
        self.aux.get(QUALITY_SCORE_KEY).copied().filter(|q| q.is_finite())
    }
}

/// Why a probe produced no usable outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeError {
    #[error("probe timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("probe failed: {0}")]
    Failure(String),
}

/// Health check for one provider.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> ProbeOutcome;
}

/// Async closure probe.
pub struct FnProbe<F> {
    f: F,
}

impl<F> FnProbe<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> HealthProbe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ProbeOutcome> + Send,
{
    async fn probe(&self) -> ProbeOutcome {
        (self.f)().await
    }
}

/// Blocking closure probe, run on tokio's blocking pool. A call that outlives
/// its timeout is abandoned, not interrupted.
pub struct BlockingProbe<F> {
    f: Arc<F>,
}

impl<F> BlockingProbe<F> {
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

#[async_trait]
impl<F> HealthProbe for BlockingProbe<F>
where
    F: Fn() -> ProbeOutcome + Send + Sync + 'static,
{
    async fn probe(&self) -> ProbeOutcome {
        let f = Arc::clone(&self.f);
        match tokio::task::spawn_blocking(move || f()).await {
            Ok(outcome) => outcome,
            Err(e) => ProbeOutcome::failed(format!("blocking probe aborted: {}", e)),
        }
    }
}

/// Per-source registration options. Unset fields use the monitor defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProbeOptions {
    pub critical: bool,
    pub interval: Option<Duration>,
    pub timeout: Option<Duration>,
}

impl ProbeOptions {
    pub fn critical(critical: bool) -> Self {
        Self {
            critical,
            ..Default::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
