use chrono::Utc;
use futures_util::future::join_all;
use futures_util::FutureExt;
use fusion_core::{HealthState, HealthView, ProviderHealth, Result};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alerts::{Alert, AlertLog};
use crate::config::{MonitorConfig, MonitorThresholds};
use crate::probe::{BlockingProbe, FnProbe, HealthProbe, ProbeError, ProbeOptions, ProbeOutcome};
use crate::report::MonitoringReport;
use crate::tracker::{self, ProbeSample, SourceTracker};

struct SourceEntry {
    name: String,
    probe: Arc<dyn HealthProbe>,
    options: ProbeOptions,
    tracker: Mutex<SourceTracker>,
}

struct Running {
    root: CancellationToken,
    runtime: Handle,
    tasks: HashMap<String, (CancellationToken, JoinHandle<()>)>,
}

struct Shared {
    config: RwLock<Arc<MonitorConfig>>,
    sources: RwLock<BTreeMap<String, Arc<SourceEntry>>>,
    health: RwLock<Arc<HashMap<String, ProviderHealth>>>,
    alerts: AlertLog,
}

/// Probes registered providers on a schedule and keeps their health.
///
/// Cheap to clone; clones share the same sources, health map and alert log.
#[derive(Clone)]
pub struct ReliabilityMonitor {
    shared: Arc<Shared>,
    running: Arc<Mutex<Option<Running>>>,
}

impl ReliabilityMonitor {
    pub fn new(config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_validated(config))
    }

    fn with_validated(config: MonitorConfig) -> Self {
        let alerts = AlertLog::new(config.alert_log_capacity, config.alert_channel_capacity);
        Self {
            shared: Arc::new(Shared {
                config: RwLock::new(Arc::new(config)),
                sources: RwLock::new(BTreeMap::new()),
                health: RwLock::new(Arc::new(HashMap::new())),
                alerts,
            }),
            running: Arc::new(Mutex::new(None)),
        }
    }

    pub fn register<P>(&self, source: impl Into<String>, probe: P, critical: bool)
    where
        P: HealthProbe + 'static,
    {
        self.register_with(source, probe, ProbeOptions::critical(critical));
    }

    /// Registers `source`, replacing any earlier registration under the same
    /// name. When the monitor is running the source's task starts at once.
    pub fn register_with<P>(&self, source: impl Into<String>, probe: P, options: ProbeOptions)
    where
        P: HealthProbe + 'static,
    {
        let name = source.into();
        let entry = Arc::new(SourceEntry {
            name: name.clone(),
            probe: Arc::new(probe),
            options,
            tracker: Mutex::new(SourceTracker::new(name.clone(), options.critical)),
        });

        let replaced = {
            let mut sources = self.shared.sources.write();
            let replaced = sources.insert(name.clone(), Arc::clone(&entry)).is_some();
            self.shared.publish_health(ProviderHealth::unknown(name.clone(), options.critical));
            replaced
        };

        if replaced {
            warn!(source = %name, "Replacing existing health probe");
        } else {
            info!(source = %name, critical = options.critical, "Registered health probe");
        }

        let mut running = self.running.lock();
        if let Some(run) = running.as_mut() {
            if let Some((old, _)) = run.tasks.remove(&name) {
                old.cancel();
            }
            let token = run.root.child_token();
            let handle = run
                .runtime
                .spawn(source_loop(Arc::clone(&self.shared), entry, token.clone()));
            run.tasks.insert(name, (token, handle));
        }
    }

    pub fn register_fn<F, Fut>(&self, source: impl Into<String>, f: F, critical: bool)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProbeOutcome> + Send + 'static,
    {
        self.register(source, FnProbe::new(f), critical);
    }

    pub fn register_blocking<F>(&self, source: impl Into<String>, f: F, critical: bool)
    where
        F: Fn() -> ProbeOutcome + Send + Sync + 'static,
    {
        self.register(source, BlockingProbe::new(f), critical);
    }

    pub fn sources(&self) -> Vec<String> {
        self.shared.sources.read().keys().cloned().collect()
    }

    /// Spawns one probe task per registered source. No-op when already running.
    pub async fn start(&self) {
        let mut running = self.running.lock();
        if running.is_some() {
            debug!("Reliability monitor already running");
            return;
        }

        let root = CancellationToken::new();
        let runtime = Handle::current();
        let entries: Vec<Arc<SourceEntry>> = self.shared.sources.read().values().cloned().collect();

        let mut tasks = HashMap::with_capacity(entries.len());
        for entry in entries {
            let token = root.child_token();
            let name = entry.name.clone();
            let handle = runtime.spawn(source_loop(Arc::clone(&self.shared), entry, token.clone()));
            tasks.insert(name, (token, handle));
        }

        info!(sources = tasks.len(), "Reliability monitor started");
        *running = Some(Running { root, runtime, tasks });
    }

    /// Cancels every source task and waits for them. A cycle already in
    /// flight completes within its timeout; last known health is kept.
    pub async fn stop(&self) {
        let running = self.running.lock().take();
        let Some(running) = running else {
            return;
        };
        running.root.cancel();

        let handles: Vec<JoinHandle<()>> = running.tasks.into_values().map(|(_, h)| h).collect();
        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "Probe task ended abnormally");
            }
        }
        info!("Reliability monitor stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Probes every source once, concurrently.
    pub async fn run_once(&self) {
        let entries: Vec<Arc<SourceEntry>> = self.shared.sources.read().values().cloned().collect();
        join_all(entries.iter().map(|entry| self.shared.run_cycle(entry))).await;
    }

    pub fn health(&self, source: &str) -> Option<ProviderHealth> {
        self.shared.health.read().get(source).cloned()
    }

    pub fn snapshot(&self) -> Arc<HashMap<String, ProviderHealth>> {
        self.shared.health.read().clone()
    }

    pub fn reliability_score(&self, source: &str) -> Option<f64> {
        let health = self.health(source)?;
        tracker::reliability_score(&health, &self.shared.config_snapshot().thresholds)
    }

    pub fn report(&self) -> MonitoringReport {
        let config = self.shared.config_snapshot();
        MonitoringReport::build(&self.snapshot(), self.shared.alerts.active(), &config.thresholds)
    }

    pub fn thresholds(&self) -> MonitorThresholds {
        self.shared.config_snapshot().thresholds.clone()
    }

    /// Validates and swaps the thresholds. Cycles already running keep the
    /// thresholds they started with.
    pub fn update_thresholds(&self, thresholds: MonitorThresholds) -> Result<()> {
        thresholds.validate()?;
        let mut guard = self.shared.config.write();
        let mut next = (**guard).clone();
        next.thresholds = thresholds;
        *guard = Arc::new(next);
        info!("Monitor thresholds updated");
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.shared.alerts.subscribe()
    }

    pub fn acknowledge(&self, alert_id: u64) -> bool {
        self.shared.alerts.acknowledge(alert_id)
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        self.shared.alerts.active()
    }

    pub fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        self.shared.alerts.recent(limit)
    }

    pub fn alerts_for(&self, source: &str) -> Vec<Alert> {
        self.shared.alerts.for_source(source)
    }
}

impl HealthView for ReliabilityMonitor {
    fn health_state(&self, source: &str) -> HealthState {
        self.shared
            .health
            .read()
            .get(source)
            .map(|h| h.state)
            .unwrap_or(HealthState::Unknown)
    }

    fn reliability_score(&self, source: &str) -> Option<f64> {
        ReliabilityMonitor::reliability_score(self, source)
    }
}

impl Shared {
    fn config_snapshot(&self) -> Arc<MonitorConfig> {
        self.config.read().clone()
    }

    fn publish_health(&self, health: ProviderHealth) {
        let mut guard = self.health.write();
        let mut next = (**guard).clone();
        next.insert(health.source.clone(), health);
        *guard = Arc::new(next);
    }

    async fn run_cycle(&self, entry: &SourceEntry) {
        let config = self.config_snapshot();
        let timeout = entry
            .options
            .timeout
            .filter(|d| !d.is_zero())
            .unwrap_or_else(|| config.probe_timeout());

        let started = Instant::now();
        let result = tokio::time::timeout(timeout, AssertUnwindSafe(entry.probe.probe()).catch_unwind()).await;
        let measured_ms = started.elapsed().as_secs_f64() * 1000.0;
        let now = Utc::now();

        let sample = match result {
            Ok(Ok(outcome)) => ProbeSample::from_outcome(outcome, measured_ms, now),
            Ok(Err(panic)) => ProbeSample::from_error(ProbeError::Failure(panic_message(panic)), measured_ms, now),
            Err(_) => ProbeSample::from_error(
                ProbeError::Timeout {
                    after_ms: timeout.as_millis() as u64,
                },
                measured_ms,
                now,
            ),
        };
        if let Some(error) = &sample.error {
            debug!(source = %entry.name, error = %error, "Probe failed");
        }

        // Record, publish and alert as one step per source so concurrent
        // cycles cannot publish out of order.
        let mut tracker = entry.tracker.lock();
        let transition = tracker.record(sample, &config.thresholds);
        let health = tracker.health(&config.thresholds);

        let sources = self.sources.read();
        let current = sources
            .get(&entry.name)
            .map_or(false, |registered| std::ptr::eq(registered.as_ref(), entry));
        if !current {
            debug!(source = %entry.name, "Dropping result of a replaced registration");
            return;
        }
        self.publish_health(health);

        if let Some((old, new)) = transition {
            info!(source = %entry.name, from = %old, to = %new, "Source health changed");
            self.alerts.on_transition(&entry.name, old, new);
        }
    }
}

async fn source_loop(shared: Arc<Shared>, entry: Arc<SourceEntry>, token: CancellationToken) {
    let period = entry
        .options
        .interval
        .filter(|d| !d.is_zero())
        .unwrap_or_else(|| shared.config_snapshot().probe_interval());
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(source = %entry.name, period_ms = period.as_millis() as u64, "Probe task started");

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => shared.run_cycle(&entry).await,
        }
    }
    debug!(source = %entry.name, "Probe task stopped");
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("probe panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("probe panicked: {}", s)
    } else {
        "probe panicked".to_string()
    }
}

impl Default for ReliabilityMonitor {
    fn default() -> Self {
        Self::with_validated(MonitorConfig::default())
    }
}
