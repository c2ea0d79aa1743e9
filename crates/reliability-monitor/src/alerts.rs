use chrono::{DateTime, Utc};
use fusion_core::HealthState;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    /// Severity for a state change, `None` when the change is not worth an alert.
    pub fn for_transition(old: HealthState, new: HealthState) -> Option<Self> {
        match new {
            HealthState::Critical | HealthState::Offline => Some(AlertSeverity::Critical),
            HealthState::Warning => Some(AlertSeverity::Warning),
            HealthState::Healthy if old.is_degraded() => Some(AlertSeverity::Info),
            HealthState::Healthy | HealthState::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: u64,
    pub source: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub old_state: HealthState,
    pub new_state: HealthState,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
    pub acknowledged: bool,
}

/// Bounded alert log with fan-out to subscribers.
pub struct AlertLog {
    entries: Mutex<VecDeque<Alert>>,
    capacity: usize,
    next_id: AtomicU64,
    tx: broadcast::Sender<Alert>,
}

impl AlertLog {
    pub fn new(capacity: usize, channel_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.tx.subscribe()
    }

    /// Emits the alert for a state change, if any. Earlier unresolved alerts of
    /// the same source are resolved; recovery alerts are born resolved.
    pub fn on_transition(&self, source: &str, old: HealthState, new: HealthState) -> Option<Alert> {
        let severity = AlertSeverity::for_transition(old, new)?;
        let alert = Alert {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            source: source.to_string(),
            severity,
            message: format!("{} changed from {} to {}", source, old, new),
            old_state: old,
            new_state: new,
            timestamp: Utc::now(),
            resolved: severity == AlertSeverity::Info,
            acknowledged: false,
        };

        {
            let mut entries = self.entries.lock();
            for earlier in entries.iter_mut().filter(|a| a.source == source && !a.resolved) {
                earlier.resolved = true;
            }
            if entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back(alert.clone());
        }

        match severity {
            AlertSeverity::Info => info!(source, id = alert.id, "{}", alert.message),
            _ => warn!(source, id = alert.id, severity = ?severity, "{}", alert.message),
        }

        // No subscribers is fine.
        let _ = self.tx.send(alert.clone());
        Some(alert)
    }

    pub fn active(&self) -> Vec<Alert> {
        self.entries.lock().iter().filter(|a| !a.resolved).cloned().collect()
    }

    pub fn recent(&self, limit: usize) -> Vec<Alert> {
        let entries = self.entries.lock();
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn for_source(&self, source: &str) -> Vec<Alert> {
        self.entries.lock().iter().filter(|a| a.source == source).cloned().collect()
    }

    pub fn acknowledge(&self, id: u64) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.acknowledged = true;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
