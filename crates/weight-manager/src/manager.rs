use chrono::{DateTime, Utc};
use fusion_core::{FusionError, HealthState, HealthView, Result, SharedWeights, WeightVector};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{ensure_floor_fits, WeightConfig};
use crate::history::{AdjustmentSummary, WeightAdjustment};
use crate::strategy::{AdjustmentStrategy, SourcePerformance};

struct ManagerState {
    config: WeightConfig,
    /// EMA of each source's desirability, used by the adaptive strategy.
    baselines: HashMap<String, f64>,
    history: VecDeque<WeightAdjustment>,
}

/// Turns per-source performance into the fusion weight vector.
///
/// Updates serialize on an internal mutex. Readers go through [`SharedWeights`]
/// and never wait on an update.
pub struct WeightManager {
    state: Mutex<ManagerState>,
    shared: SharedWeights,
    health: Option<Arc<dyn HealthView>>,
}

impl WeightManager {
    pub fn new(config: WeightConfig) -> Result<Self> {
        config.validate()?;
        let initial = config.initial.clone().unwrap_or_default();
        Ok(Self {
            state: Mutex::new(ManagerState {
                config,
                baselines: HashMap::new(),
                history: VecDeque::new(),
            }),
            shared: SharedWeights::new(initial),
            health: None,
        })
    }

    /// Health states feed desirability and decide which sources may drop
    /// below the floor.
    pub fn with_health(mut self, health: Arc<dyn HealthView>) -> Self {
        self.health = Some(health);
        self
    }

    /// Handle the fusion engine reads weights from.
    pub fn shared(&self) -> SharedWeights {
        self.shared.clone()
    }

    pub fn current_weights(&self) -> Arc<WeightVector> {
        self.shared.snapshot()
    }

    pub fn strategy(&self) -> AdjustmentStrategy {
        self.state.lock().config.strategy
    }

    pub fn set_strategy(&self, strategy: AdjustmentStrategy) {
        let mut state = self.state.lock();
        if state.config.strategy != strategy {
            info!(from = %state.config.strategy, to = %strategy, "Weight adjustment strategy changed");
            state.config.strategy = strategy;
        }
    }

    /// Replaces the vector (uniform over the current sources when `None`) and
    /// clears history and baselines.
    pub fn reset_weights(&self, weights: Option<WeightVector>) -> Result<WeightVector> {
        let mut state = self.state.lock();
        let vector = match weights {
            Some(v) => v,
            None => WeightVector::uniform(self.shared.snapshot().sources()),
        };
        ensure_floor_fits(vector.len(), state.config.floor)?;

        state.history.clear();
        state.baselines.clear();
        self.shared.publish(vector.clone());
        info!(sources = vector.len(), "Weights reset");
        Ok(vector)
    }

    pub fn history(&self) -> Vec<WeightAdjustment> {
        self.state.lock().history.iter().cloned().collect()
    }

    pub fn summary(&self) -> AdjustmentSummary {
        AdjustmentSummary::from_history(None, &self.state.lock().history)
    }

    pub fn summary_since(&self, since: DateTime<Utc>) -> AdjustmentSummary {
        AdjustmentSummary::from_history(Some(since), &self.state.lock().history)
    }

    /// Runs one adjustment cycle and publishes the result.
    ///
    /// Invalid performance input fails the whole call before anything moves.
    pub fn update_weights(&self, perf: &HashMap<String, SourcePerformance>) -> Result<WeightVector> {
        let mut sorted: Vec<(&String, &SourcePerformance)> = perf.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        for (source, p) in &sorted {
            p.validate(source)?;
        }

        let mut state = self.state.lock();
        let previous = self.shared.snapshot();
        if sorted.is_empty() {
            debug!("No performance data, weights unchanged");
            return Ok((*previous).clone());
        }

        let floor = state.config.floor;
        let mut current = self.admit_new_sources(&previous, &sorted, floor)?;

        let states: BTreeMap<String, HealthState> = current
            .keys()
            .map(|s| (s.clone(), self.health_state(s)))
            .collect();
        let offline: HashSet<&str> = states
            .iter()
            .filter(|(_, st)| **st == HealthState::Offline)
            .map(|(s, _)| s.as_str())
            .collect();

        let desirability: BTreeMap<&str, f64> = sorted
            .iter()
            .map(|(s, p)| (s.as_str(), p.desirability(states[s.as_str()])))
            .collect();
        let targets = targets(&current, &desirability, &offline, floor);

        let strategy = state.config.strategy;
        let caps = state.config.caps;
        let alpha = state.config.baseline_alpha;
        for (source, weight) in current.iter_mut() {
            let cap = match desirability.get(source.as_str()) {
                Some(&d) => {
                    let baseline = state.baselines.get(source).copied().unwrap_or(d);
                    state
                        .baselines
                        .insert(source.clone(), alpha * d + (1.0 - alpha) * baseline);
                    caps.cap_for(strategy, d, Some(baseline))
                }
                None => caps.cap_for(strategy, 0.0, None),
            };
            let target = targets.get(source).copied().unwrap_or(*weight);
            *weight = (*weight + (target - *weight).clamp(-cap, cap)).max(0.0);
        }

        renormalize(&mut current);
        enforce_floor(&mut current, &offline, floor);
        let next = WeightVector::new(current)?;

        let deltas: BTreeMap<String, f64> = next
            .iter()
            .map(|(s, w)| (s.to_string(), w - previous.get(s).unwrap_or(0.0)))
            .collect();
        let max_delta = deltas.values().fold(0.0f64, |m, d| m.max(d.abs()));

        state.history.push_back(WeightAdjustment {
            timestamp: Utc::now(),
            strategy,
            deltas,
            weights: next.clone(),
        });
        while state.history.len() > state.config.history_limit {
            state.history.pop_front();
        }

        self.shared.publish(next.clone());
        info!(
            sources = next.len(),
            strategy = %strategy,
            max_delta = max_delta,
            "Published updated weights"
        );
        Ok(next)
    }

    fn health_state(&self, source: &str) -> HealthState {
        self.health
            .as_ref()
            .map(|h| h.health_state(source))
            .unwrap_or(HealthState::Unknown)
    }

    /// Starting point of a cycle: the published vector with unseen sources
    /// inserted at the floor. An empty vector starts uniform.
    fn admit_new_sources(
        &self,
        previous: &WeightVector,
        sorted: &[(&String, &SourcePerformance)],
        floor: f64,
    ) -> Result<BTreeMap<String, f64>> {
        if previous.is_empty() {
            return Ok(WeightVector::uniform(sorted.iter().map(|(s, _)| s.as_str())).as_map().clone());
        }

        let added: Vec<&str> = sorted
            .iter()
            .map(|(s, _)| s.as_str())
            .filter(|s| !previous.contains(s))
            .collect();
        let mut current = previous.as_map().clone();
        if added.is_empty() {
            return Ok(current);
        }

        ensure_floor_fits(previous.len() + added.len(), floor).map_err(|_| {
            FusionError::config(format!(
                "adding {} sources would leave no room for a floor of {} across {} sources",
                added.len(),
                floor,
                previous.len() + added.len()
            ))
        })?;

        let reserved = floor * added.len() as f64;
        let existing: f64 = current.values().sum();
        let scale = if existing > f64::EPSILON {
            (1.0 - reserved) / existing
        } else {
            0.0
        };
        for w in current.values_mut() {
            *w *= scale;
        }
        for source in &added {
            current.insert(source.to_string(), floor);
            info!(source = %source, weight = floor, "New source admitted at floor weight");
        }
        Ok(current)
    }
}

/// Sources without performance data hold their weight (offline ones fall to
/// the floor); the rest of the mass is shared by desirability.
fn targets(
    current: &BTreeMap<String, f64>,
    desirability: &BTreeMap<&str, f64>,
    offline: &HashSet<&str>,
    floor: f64,
) -> BTreeMap<String, f64> {
    let mut targets = BTreeMap::new();
    let mut held = 0.0;
    for (source, weight) in current {
        if desirability.contains_key(source.as_str()) {
            continue;
        }
        let target = if offline.contains(source.as_str()) {
            weight.min(floor)
        } else {
            *weight
        };
        held += target;
        targets.insert(source.clone(), target);
    }

    let remaining = (1.0 - held).max(0.0);
    let total: f64 = desirability.values().sum();
    for (source, d) in desirability {
        let share = if total > f64::EPSILON {
            d / total
        } else {
            1.0 / desirability.len() as f64
        };
        targets.insert(source.to_string(), remaining * share);
    }
    targets
}

fn renormalize(weights: &mut BTreeMap<String, f64>) {
    let total: f64 = weights.values().sum();
    if total <= f64::EPSILON {
        let uniform = 1.0 / weights.len().max(1) as f64;
        weights.values_mut().for_each(|w| *w = uniform);
        return;
    }
    weights.values_mut().for_each(|w| *w /= total);
}

/// Lifts every non-offline source to the floor, taking the deficit from the
/// sources above their minimum in proportion to their excess.
fn enforce_floor(weights: &mut BTreeMap<String, f64>, offline: &HashSet<&str>, floor: f64) {
    let minimum = |source: &str| if offline.contains(source) { 0.0 } else { floor };

    let mut deficit = 0.0;
    for (source, w) in weights.iter_mut() {
        let min = minimum(source.as_str());
        if *w < min {
            deficit += min - *w;
            *w = min;
        }
    }
    if deficit <= 0.0 {
        return;
    }

    let excess: f64 = weights
        .iter()
        .map(|(s, w)| (w - minimum(s.as_str())).max(0.0))
        .sum();
    if excess <= f64::EPSILON {
        return;
    }
    for (source, w) in weights.iter_mut() {
        let over = (*w - minimum(source.as_str())).max(0.0);
        *w = (*w - deficit * over / excess).max(0.0);
    }
}
