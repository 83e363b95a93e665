//! Construct scoring.
//!
//! Each attempt nudges every construct it carries weight for: toward 100 on
//! a correct answer, toward 0 on an incorrect one. The step is
//! `(target - score) * weight * learning_rate`, clamped to `[0, 100]`.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, StoreError};
use crate::model::{Attempt, Construct, ConstructProfile, ConstructState, Trend};
use crate::traits::ConstructStateStore;

/// Tuning for the construct scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Fraction of the distance to the target covered by a full-weight
    /// attempt.
    pub learning_rate: f64,
    /// Constructs strictly below this score are weak.
    pub weak_construct_threshold: f64,
    /// Scores averaged for the short trend window.
    pub trend_recent_window: usize,
    /// Scores averaged for the long trend window.
    pub trend_long_window: usize,
    /// Scores retained per construct.
    pub trend_history_cap: usize,
    /// Confidence gained per data point, capped at 100.
    pub confidence_per_point: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            weak_construct_threshold: 60.0,
            trend_recent_window: 3,
            trend_long_window: 10,
            trend_history_cap: 20,
            confidence_per_point: 5.0,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "scoring.learning_rate",
                reason: format!("must be in (0, 1], got {}", self.learning_rate),
            });
        }
        if !(0.0..=100.0).contains(&self.weak_construct_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "scoring.weak_construct_threshold",
                reason: format!("must be in [0, 100], got {}", self.weak_construct_threshold),
            });
        }
        if self.trend_recent_window == 0 || self.trend_recent_window >= self.trend_long_window {
            return Err(ConfigError::InvalidValue {
                field: "scoring.trend_recent_window",
                reason: "must be nonzero and shorter than trend_long_window".into(),
            });
        }
        if self.trend_history_cap < self.trend_long_window {
            return Err(ConfigError::InvalidValue {
                field: "scoring.trend_history_cap",
                reason: "must hold at least trend_long_window scores".into(),
            });
        }
        Ok(())
    }
}

/// Maintains the five construct estimates.
#[derive(Debug, Clone, Default)]
pub struct ConstructScorer {
    config: ScoringConfig,
}

impl ConstructScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Apply one outcome to one construct state.
    pub fn nudge(&self, state: &mut ConstructState, is_correct: bool, weight: f64) {
        let target = if is_correct { 100.0 } else { 0.0 };
        let step = (target - state.score) * weight * self.config.learning_rate;
        state.score = (state.score + step).clamp(0.0, 100.0);
        state.data_points += 1;
        state.confidence =
            (state.data_points as f64 * self.config.confidence_per_point).min(100.0);

        state.history.push(state.score);
        let cap = self.config.trend_history_cap;
        if state.history.len() > cap {
            let excess = state.history.len() - cap;
            state.history.drain(..excess);
        }

        if state.data_points > 3 {
            state.trend = self.trend(&state.history);
        }
    }

    /// Short-window average against long-window average.
    pub fn trend(&self, history: &[f64]) -> Trend {
        if history.is_empty() {
            return Trend::Stable;
        }
        let recent = tail_mean(history, self.config.trend_recent_window);
        let long = tail_mean(history, self.config.trend_long_window);
        Trend::from_delta(recent - long)
    }

    /// Apply an attempt to every construct with a nonzero weight.
    ///
    /// Returns the constructs that moved.
    pub fn apply_attempt(
        &self,
        profile: &mut ConstructProfile,
        attempt: &Attempt,
    ) -> Vec<Construct> {
        let mut touched = Vec::new();
        for (construct, weight) in attempt.construct_weights.nonzero() {
            self.nudge(profile.get_mut(construct), attempt.is_correct, weight);
            touched.push(construct);
        }
        touched
    }

    /// Load the learner's profile, apply the attempt and write it back.
    pub async fn record(
        &self,
        store: &dyn ConstructStateStore,
        attempt: &Attempt,
    ) -> Result<ConstructProfile, StoreError> {
        let mut profile = self.profile(store, &attempt.learner_id).await?;
        let touched = self.apply_attempt(&mut profile, attempt);
        if touched.is_empty() {
            return Ok(profile);
        }
        tracing::debug!(
            learner = %attempt.learner_id,
            attempt = %attempt.id,
            "constructs updated: {:?}",
            touched
        );
        store
            .put_construct_states(&attempt.learner_id, profile.states.clone())
            .await?;
        Ok(profile)
    }

    /// The learner's profile; constructs with no data are neutral.
    pub async fn profile(
        &self,
        store: &dyn ConstructStateStore,
        learner_id: &str,
    ) -> Result<ConstructProfile, StoreError> {
        let stored = store.construct_states(learner_id).await?;
        Ok(ConstructProfile::from_states(learner_id, stored))
    }

    /// Rebuild a profile from scratch by replaying attempts in order.
    pub fn replay<'a>(
        &self,
        learner_id: &str,
        attempts: impl IntoIterator<Item = &'a Attempt>,
    ) -> ConstructProfile {
        let mut profile = ConstructProfile::neutral(learner_id);
        for attempt in attempts {
            self.apply_attempt(&mut profile, attempt);
        }
        profile
    }
}

fn tail_mean(values: &[f64], window: usize) -> f64 {
    let n = window.min(values.len()).max(1);
    let tail = &values[values.len().saturating_sub(n)..];
    tail.iter().sum::<f64>() / tail.len().max(1) as f64
}

/// Constructs strictly below `threshold`, lowest score first.
///
/// Equal scores keep declared construct order.
pub fn identify_weak_constructs(profile: &ConstructProfile, threshold: f64) -> Vec<ConstructState> {
    let mut weak: Vec<ConstructState> = Construct::ALL
        .into_iter()
        .map(|c| profile.get(c).clone())
        .filter(|s| s.score < threshold)
        .collect();
    weak.sort_by(|a, b| {
        a.score
            .total_cmp(&b.score)
            .then(a.construct.ordinal().cmp(&b.construct.ordinal()))
    });
    weak
}
