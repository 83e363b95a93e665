//! Per-skill mastery tracking and weak-skill selection.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, StoreError};
use crate::model::Attempt;
use crate::traits::SkillMasteryStore;

/// Categorical mastery bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasteryLevel {
    Weak,
    Developing,
    Strong,
}

impl fmt::Display for MasteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MasteryLevel::Weak => write!(f, "weak"),
            MasteryLevel::Developing => write!(f, "developing"),
            MasteryLevel::Strong => write!(f, "strong"),
        }
    }
}

/// Thresholds and windows for the mastery pipeline.
///
/// The accuracy cut-offs are independent constants; nothing ties them to the
/// construct weakness threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteryConfig {
    /// Accuracy (percent) below which a weak skill is critical.
    pub critical_below: f64,
    /// Accuracy (percent) below which a skill is weak.
    pub weak_below: f64,
    /// Accuracy (percent) at or above which a skill is strong.
    pub strong_at: f64,
    /// Time at or under which an answer earns a full speed index.
    pub target_seconds_per_question: f64,
    /// Outcomes considered for stability.
    pub stability_window: usize,
}

impl Default for MasteryConfig {
    fn default() -> Self {
        Self {
            critical_below: 30.0,
            weak_below: 50.0,
            strong_at: 80.0,
            target_seconds_per_question: 60.0,
            stability_window: 10,
        }
    }
}

impl MasteryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = 0.0 <= self.critical_below
            && self.critical_below <= self.weak_below
            && self.weak_below <= self.strong_at
            && self.strong_at <= 100.0;
        if !ordered {
            return Err(ConfigError::InvalidValue {
                field: "mastery",
                reason: format!(
                    "thresholds must satisfy 0 <= critical ({}) <= weak ({}) <= strong ({}) <= 100",
                    self.critical_below, self.weak_below, self.strong_at
                ),
            });
        }
        if self.target_seconds_per_question <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "mastery.target_seconds_per_question",
                reason: "must be positive".into(),
            });
        }
        if self.stability_window < 2 {
            return Err(ConfigError::InvalidValue {
                field: "mastery.stability_window",
                reason: "must be at least 2".into(),
            });
        }
        Ok(())
    }

    pub fn classify(&self, accuracy: f64) -> MasteryLevel {
        if accuracy < self.weak_below {
            MasteryLevel::Weak
        } else if accuracy < self.strong_at {
            MasteryLevel::Developing
        } else {
            MasteryLevel::Strong
        }
    }
}

/// A learner's running estimate for one micro-skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMasteryState {
    pub learner_id: String,
    pub skill_id: String,
    pub attempts: u32,
    pub correct: u32,
    /// Percent correct, `[0, 100]`.
    pub accuracy: f64,
    /// Mean per-attempt speed index, `[0, 100]`.
    pub speed_index: f64,
    /// Consistency of recent outcomes, `[0, 100]`.
    pub stability: f64,
    pub mastery_level: MasteryLevel,
    #[serde(default)]
    pub recent_outcomes: VecDeque<bool>,
    pub updated_at: DateTime<Utc>,
}

impl SkillMasteryState {
    pub fn new(learner_id: &str, skill_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            learner_id: learner_id.to_string(),
            skill_id: skill_id.to_string(),
            attempts: 0,
            correct: 0,
            accuracy: 0.0,
            speed_index: 0.0,
            stability: 0.0,
            mastery_level: MasteryLevel::Weak,
            recent_outcomes: VecDeque::new(),
            updated_at: now,
        }
    }

    /// Fold one attempt into the running aggregates.
    pub fn apply(&mut self, attempt: &Attempt, config: &MasteryConfig) {
        self.attempts += 1;
        if attempt.is_correct {
            self.correct += 1;
        }
        self.accuracy = self.correct as f64 / self.attempts as f64 * 100.0;

        let speed = speed_index(attempt.time_spent_sec, config.target_seconds_per_question);
        self.speed_index += (speed - self.speed_index) / self.attempts as f64;

        self.recent_outcomes.push_back(attempt.is_correct);
        while self.recent_outcomes.len() > config.stability_window {
            self.recent_outcomes.pop_front();
        }
        self.stability = stability(&self.recent_outcomes, config.stability_window);

        self.mastery_level = config.classify(self.accuracy);
        self.updated_at = attempt.created_at;
    }

    pub fn is_critical(&self, config: &MasteryConfig) -> bool {
        self.mastery_level == MasteryLevel::Weak && self.accuracy < config.critical_below
    }
}

/// Full marks at or under the target time, proportionally less beyond it.
pub fn speed_index(time_spent_sec: f64, target_sec: f64) -> f64 {
    if !time_spent_sec.is_finite() {
        return 0.0;
    }
    (target_sec / time_spent_sec.max(1.0) * 100.0).clamp(0.0, 100.0)
}

/// `(1 - 2σ) * 100`, scaled by how full the window is.
///
/// σ is the population standard deviation of the 0/1 outcomes, so a run of
/// identical outcomes scores 100 and an even split scores 0.
pub fn stability(outcomes: &VecDeque<bool>, window: usize) -> f64 {
    if outcomes.is_empty() || window == 0 {
        return 0.0;
    }
    let n = outcomes.len() as f64;
    let p = outcomes.iter().filter(|o| **o).count() as f64 / n;
    let sigma = (p * (1.0 - p)).sqrt();
    let consistency = (1.0 - 2.0 * sigma).clamp(0.0, 1.0);
    let fill = (n / window as f64).min(1.0);
    consistency * fill * 100.0
}

/// Rebuild skill states from scratch by replaying attempts in order.
pub fn replay_skill_states<'a>(
    learner_id: &str,
    attempts: impl IntoIterator<Item = &'a Attempt>,
    config: &MasteryConfig,
) -> Vec<SkillMasteryState> {
    let mut states: BTreeMap<String, SkillMasteryState> = BTreeMap::new();
    for attempt in attempts {
        states
            .entry(attempt.skill_id.clone())
            .or_insert_with(|| {
                SkillMasteryState::new(learner_id, &attempt.skill_id, attempt.created_at)
            })
            .apply(attempt, config);
    }
    states.into_values().collect()
}

// ---------------------------------------------------------------------------
// Weak-skill selection
// ---------------------------------------------------------------------------

/// Outcome of weak-skill selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "skills", rename_all = "snake_case")]
pub enum WeakSkills {
    /// Nothing is weak: keep practicing.
    None,
    /// Weak skill ids, lowest accuracy first.
    Found(Vec<String>),
}

impl WeakSkills {
    pub fn is_empty(&self) -> bool {
        matches!(self, WeakSkills::None)
    }

    pub fn len(&self) -> usize {
        match self {
            WeakSkills::None => 0,
            WeakSkills::Found(ids) => ids.len(),
        }
    }

    pub fn ids(&self) -> &[String] {
        match self {
            WeakSkills::None => &[],
            WeakSkills::Found(ids) => ids,
        }
    }
}

/// Picks the weak skills out of a learner's mastery states.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeakSkillSelector;

impl WeakSkillSelector {
    /// Skills bucketed weak, lowest accuracy first, ties by skill id.
    pub fn select(&self, states: &[SkillMasteryState]) -> WeakSkills {
        let mut weak: Vec<&SkillMasteryState> = states
            .iter()
            .filter(|s| s.mastery_level == MasteryLevel::Weak)
            .collect();
        if weak.is_empty() {
            return WeakSkills::None;
        }
        weak.sort_by(|a, b| {
            a.accuracy
                .total_cmp(&b.accuracy)
                .then_with(|| a.skill_id.cmp(&b.skill_id))
        });
        WeakSkills::Found(weak.into_iter().map(|s| s.skill_id.clone()).collect())
    }

    pub async fn select_for(
        &self,
        store: &dyn SkillMasteryStore,
        learner_id: &str,
    ) -> Result<WeakSkills, StoreError> {
        let states = store.skill_states(learner_id).await?;
        Ok(self.select(&states))
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::model::{ConstructWeights, ContextType};

    fn attempt(skill: &str, correct: bool, secs: f64) -> Attempt {
        Attempt {
            id: Uuid::new_v4(),
            learner_id: "u1".into(),
            question_id: "q".into(),
            skill_id: skill.into(),
            is_correct: correct,
            time_spent_sec: secs,
            construct_weights: ConstructWeights::new(),
            context_type: ContextType::Baseline,
            context_id: None,
            module_id: None,
            created_at: Utc::now(),
        }
    }

    fn state(skill: &str, accuracy: f64, level: MasteryLevel) -> SkillMasteryState {
        let mut s = SkillMasteryState::new("u1", skill, Utc::now());
        s.accuracy = accuracy;
        s.mastery_level = level;
        s
    }

    #[test]
    fn buckets_follow_thresholds() {
        let config = MasteryConfig::default();
        assert_eq!(config.classify(0.0), MasteryLevel::Weak);
        assert_eq!(config.classify(49.9), MasteryLevel::Weak);
        assert_eq!(config.classify(50.0), MasteryLevel::Developing);
        assert_eq!(config.classify(79.9), MasteryLevel::Developing);
        assert_eq!(config.classify(80.0), MasteryLevel::Strong);
    }

    #[test]
    fn apply_tracks_accuracy_and_speed() {
        let config = MasteryConfig::default();
        let mut s = SkillMasteryState::new("u1", "s1", Utc::now());
        s.apply(&attempt("s1", true, 30.0), &config);
        s.apply(&attempt("s1", false, 120.0), &config);
        assert_eq!(s.attempts, 2);
        assert_eq!(s.correct, 1);
        assert!((s.accuracy - 50.0).abs() < 1e-9);
        assert!((s.speed_index - 75.0).abs() < 1e-9);
        assert_eq!(s.mastery_level, MasteryLevel::Developing);
    }

    #[test]
    fn critical_is_a_weak_subset() {
        let config = MasteryConfig::default();
        let mut s = SkillMasteryState::new("u1", "s1", Utc::now());
        for _ in 0..4 {
            s.apply(&attempt("s1", false, 10.0), &config);
        }
        assert!(s.is_critical(&config));
        s.apply(&attempt("s1", true, 10.0), &config);
        s.apply(&attempt("s1", true, 10.0), &config);
        assert_eq!(s.mastery_level, MasteryLevel::Weak);
        assert!(!s.is_critical(&config));
    }

    #[test]
    fn speed_index_handles_zero_and_slow() {
        assert_eq!(speed_index(0.0, 60.0), 100.0);
        assert_eq!(speed_index(60.0, 60.0), 100.0);
        assert!((speed_index(240.0, 60.0) - 25.0).abs() < 1e-9);
        assert_eq!(speed_index(f64::NAN, 60.0), 0.0);
    }

    #[test]
    fn stability_rewards_consistency() {
        let steady: VecDeque<bool> = std::iter::repeat(true).take(10).collect();
        assert!((stability(&steady, 10) - 100.0).abs() < 1e-9);

        let split: VecDeque<bool> = (0..10).map(|i| i % 2 == 0).collect();
        assert!(stability(&split, 10).abs() < 1e-9);

        let partial: VecDeque<bool> = std::iter::repeat(false).take(5).collect();
        assert!((stability(&partial, 10) - 50.0).abs() < 1e-9);

        assert_eq!(stability(&VecDeque::new(), 10), 0.0);
    }

    #[test]
    fn replay_groups_by_skill() {
        let config = MasteryConfig::default();
        let attempts = vec![
            attempt("s2", true, 20.0),
            attempt("s1", false, 20.0),
            attempt("s2", true, 20.0),
        ];
        let states = replay_skill_states("u1", &attempts, &config);
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].skill_id, "s1");
        assert_eq!(states[1].attempts, 2);
        assert_eq!(states[1].mastery_level, MasteryLevel::Strong);
    }

    #[test]
    fn selector_orders_weak_by_accuracy() {
        let states = vec![
            state("b", 40.0, MasteryLevel::Weak),
            state("a", 40.0, MasteryLevel::Weak),
            state("c", 10.0, MasteryLevel::Weak),
            state("d", 70.0, MasteryLevel::Developing),
        ];
        let selected = WeakSkillSelector.select(&states);
        assert_eq!(
            selected,
            WeakSkills::Found(vec!["c".into(), "a".into(), "b".into()])
        );
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn selector_empty_is_keep_practicing() {
        let states = vec![state("a", 90.0, MasteryLevel::Strong)];
        let selected = WeakSkillSelector.select(&states);
        assert_eq!(selected, WeakSkills::None);
        assert!(selected.is_empty());
        assert!(selected.ids().is_empty());
    }

    #[test]
    fn config_rejects_inverted_thresholds() {
        let bad = MasteryConfig {
            critical_below: 60.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        assert!(MasteryConfig::default().validate().is_ok());
    }
}
