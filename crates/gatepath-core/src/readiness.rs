//! Composite readiness scoring.
//!
//! `score = 0.40 * accuracy + 0.25 * speed_index + 0.20 * stability + 0.15 * coverage`
//!
//! Every sub-metric is on a 0-100 scale. The weights are fixed and must sum
//! to exactly 1.0; a table that does not is rejected when the calculator is
//! built.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::mastery::SkillMasteryState;
use crate::model::Trend;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Sub-metrics below this get a recommendation.
const METRIC_ATTENTION_BELOW: f64 = 60.0;
/// Coverage below this gets a recommendation.
const COVERAGE_ATTENTION_BELOW: f64 = 80.0;

/// Weights of the four sub-metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessWeights {
    pub accuracy: f64,
    pub speed_index: f64,
    pub stability: f64,
    pub coverage: f64,
}

impl ReadinessWeights {
    pub const STANDARD: ReadinessWeights = ReadinessWeights {
        accuracy: 0.40,
        speed_index: 0.25,
        stability: 0.20,
        coverage: 0.15,
    };

    pub fn sum(&self) -> f64 {
        self.accuracy + self.speed_index + self.stability + self.coverage
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let parts = [self.accuracy, self.speed_index, self.stability, self.coverage];
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "readiness",
                reason: "weights must be finite and non-negative".into(),
            });
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightsDoNotSumToOne { sum });
        }
        Ok(())
    }
}

impl Default for ReadinessWeights {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// The four sub-metrics, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadinessMetrics {
    pub accuracy: f64,
    pub speed_index: f64,
    pub stability: f64,
    pub coverage: f64,
}

impl ReadinessMetrics {
    pub fn new(accuracy: f64, speed_index: f64, stability: f64, coverage: f64) -> Self {
        Self {
            accuracy,
            speed_index,
            stability,
            coverage,
        }
    }

    fn clamped(&self) -> Self {
        Self {
            accuracy: clamp_metric(self.accuracy),
            speed_index: clamp_metric(self.speed_index),
            stability: clamp_metric(self.stability),
            coverage: clamp_metric(self.coverage),
        }
    }
}

fn clamp_metric(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Qualitative readiness band. Lower bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Excellent,
    Good,
    Fair,
    NeedsWork,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Grade::Excellent
        } else if score >= 65.0 {
            Grade::Good
        } else if score >= 50.0 {
            Grade::Fair
        } else {
            Grade::NeedsWork
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::Excellent => write!(f, "excellent"),
            Grade::Good => write!(f, "good"),
            Grade::Fair => write!(f, "fair"),
            Grade::NeedsWork => write!(f, "needs_work"),
        }
    }
}

/// Output of the calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessResult {
    pub metrics: ReadinessMetrics,
    pub score: f64,
    pub grade: Grade,
    pub recommendations: Vec<String>,
}

/// Before/after comparison of two readiness scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadinessDelta {
    pub before: f64,
    pub after: f64,
    pub delta: f64,
    /// Change relative to `before`, 0 when `before` is 0.
    pub percent_change: f64,
    pub trend: Trend,
}

/// Signed difference between two scores, bucketed with the shared trend rule.
pub fn delta(before: f64, after: f64) -> ReadinessDelta {
    let diff = after - before;
    let percent_change = if before == 0.0 {
        0.0
    } else {
        diff / before * 100.0
    };
    ReadinessDelta {
        before,
        after,
        delta: diff,
        percent_change,
        trend: Trend::from_delta(diff),
    }
}

/// Combines sub-metrics into the composite score.
#[derive(Debug, Clone)]
pub struct ReadinessCalculator {
    weights: ReadinessWeights,
}

impl Default for ReadinessCalculator {
    fn default() -> Self {
        Self {
            weights: ReadinessWeights::STANDARD,
        }
    }
}

impl ReadinessCalculator {
    pub fn new(weights: ReadinessWeights) -> Result<Self, ConfigError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &ReadinessWeights {
        &self.weights
    }

    /// Weighted composite, rounded to two decimals.
    pub fn score(&self, metrics: &ReadinessMetrics) -> ReadinessResult {
        let m = metrics.clamped();
        let w = &self.weights;
        let raw = w.accuracy * m.accuracy
            + w.speed_index * m.speed_index
            + w.stability * m.stability
            + w.coverage * m.coverage;
        let score = ((raw * 100.0).round() / 100.0).clamp(0.0, 100.0);

        ReadinessResult {
            metrics: m,
            score,
            grade: Grade::from_score(score),
            recommendations: recommendations(&m),
        }
    }

    /// Derive the sub-metrics from per-skill states and score them.
    ///
    /// Accuracy, speed and stability are plain means over tested skills;
    /// coverage is `tested / total * 100`. With no tested skills the result
    /// is 0 / needs work.
    pub fn from_skill_states(
        &self,
        states: &[SkillMasteryState],
        total_skill_count: usize,
    ) -> ReadinessResult {
        let tested: Vec<&SkillMasteryState> = states.iter().filter(|s| s.attempts > 0).collect();
        if tested.is_empty() {
            return ReadinessResult {
                metrics: ReadinessMetrics::default(),
                score: 0.0,
                grade: Grade::NeedsWork,
                recommendations: vec![
                    "Complete the baseline assessment to establish your readiness.".to_string(),
                ],
            };
        }

        let n = tested.len() as f64;
        let mean = |f: fn(&SkillMasteryState) -> f64| tested.iter().map(|s| f(*s)).sum::<f64>() / n;
        let coverage = if total_skill_count == 0 {
            0.0
        } else {
            tested.len().min(total_skill_count) as f64 / total_skill_count as f64 * 100.0
        };

        self.score(&ReadinessMetrics {
            accuracy: mean(|s| s.accuracy),
            speed_index: mean(|s| s.speed_index),
            stability: mean(|s| s.stability),
            coverage,
        })
    }
}

fn recommendations(m: &ReadinessMetrics) -> Vec<String> {
    let mut recs = Vec::new();
    if m.accuracy < METRIC_ATTENTION_BELOW {
        recs.push(format!(
            "Accuracy is {:.0}%: review explanations for missed questions before new sets.",
            m.accuracy
        ));
    }
    if m.speed_index < METRIC_ATTENTION_BELOW {
        recs.push("Work on pacing: timed drills will raise your speed index.".to_string());
    }
    if m.stability < METRIC_ATTENTION_BELOW {
        recs.push("Results are inconsistent: short daily practice builds stability.".to_string());
    }
    if m.coverage < COVERAGE_ATTENTION_BELOW {
        recs.push(format!(
            "Only {:.0}% of skills tested: try questions from untested skills.",
            m.coverage
        ));
    }
    if recs.is_empty() {
        recs.push("On track: keep up regular practice to hold your readiness.".to_string());
    }
    recs
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::mastery::MasteryLevel;

    fn skill(id: &str, accuracy: f64, speed: f64, stability: f64) -> SkillMasteryState {
        let mut s = SkillMasteryState::new("u1", id, Utc::now());
        s.attempts = 5;
        s.accuracy = accuracy;
        s.speed_index = speed;
        s.stability = stability;
        s.mastery_level = MasteryLevel::Developing;
        s
    }

    #[test]
    fn standard_weights_sum_to_one() {
        assert!(ReadinessWeights::STANDARD.validate().is_ok());
        assert!((ReadinessWeights::STANDARD.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn skewed_weights_are_a_config_error() {
        let weights = ReadinessWeights {
            accuracy: 0.5,
            ..ReadinessWeights::STANDARD
        };
        assert!(matches!(
            ReadinessCalculator::new(weights),
            Err(ConfigError::WeightsDoNotSumToOne { .. })
        ));
    }

    #[test]
    fn perfect_and_zero_metrics() {
        let calc = ReadinessCalculator::default();
        let top = calc.score(&ReadinessMetrics::new(100.0, 100.0, 100.0, 100.0));
        assert_eq!(top.score, 100.0);
        assert_eq!(top.grade, Grade::Excellent);

        let bottom = calc.score(&ReadinessMetrics::new(0.0, 0.0, 0.0, 0.0));
        assert_eq!(bottom.score, 0.0);
        assert_eq!(bottom.grade, Grade::NeedsWork);
        assert!(!bottom.recommendations.is_empty());
    }

    #[test]
    fn weighted_sum() {
        let calc = ReadinessCalculator::default();
        let r = calc.score(&ReadinessMetrics::new(80.0, 60.0, 50.0, 40.0));
        // 32 + 15 + 10 + 6
        assert!((r.score - 63.0).abs() < 1e-9);
        assert_eq!(r.grade, Grade::Fair);
    }

    #[test]
    fn score_is_monotonic_in_each_metric() {
        let calc = ReadinessCalculator::default();
        let base = [35.0, 55.0, 75.0, 20.0];
        for idx in 0..4 {
            let mut prev = f64::NEG_INFINITY;
            for step in 0..=100 {
                let mut v = base;
                v[idx] = step as f64;
                let s = calc
                    .score(&ReadinessMetrics::new(v[0], v[1], v[2], v[3]))
                    .score;
                assert!(s >= prev, "metric {idx} at {step}: {s} < {prev}");
                prev = s;
            }
        }
    }

    #[test]
    fn out_of_range_metrics_are_clamped() {
        let calc = ReadinessCalculator::default();
        let r = calc.score(&ReadinessMetrics::new(150.0, -20.0, f64::NAN, 100.0));
        assert_eq!(r.metrics.accuracy, 100.0);
        assert_eq!(r.metrics.speed_index, 0.0);
        assert_eq!(r.metrics.stability, 0.0);
        assert!((r.score - 55.0).abs() < 1e-9);
    }

    #[test]
    fn grade_bounds_are_inclusive() {
        assert_eq!(Grade::from_score(80.0), Grade::Excellent);
        assert_eq!(Grade::from_score(79.99), Grade::Good);
        assert_eq!(Grade::from_score(65.0), Grade::Good);
        assert_eq!(Grade::from_score(50.0), Grade::Fair);
        assert_eq!(Grade::from_score(49.99), Grade::NeedsWork);
    }

    #[test]
    fn no_skills_short_circuits() {
        let calc = ReadinessCalculator::default();
        for total in [0, 1, 40] {
            let r = calc.from_skill_states(&[], total);
            assert_eq!(r.score, 0.0);
            assert_eq!(r.grade, Grade::NeedsWork);
            assert!(!r.recommendations.is_empty());
        }
    }

    #[test]
    fn skill_states_feed_means_and_coverage() {
        let calc = ReadinessCalculator::default();
        let states = vec![skill("a", 100.0, 80.0, 60.0), skill("b", 60.0, 40.0, 100.0)];
        let r = calc.from_skill_states(&states, 8);
        assert_eq!(r.metrics.accuracy, 80.0);
        assert_eq!(r.metrics.speed_index, 60.0);
        assert_eq!(r.metrics.stability, 80.0);
        assert_eq!(r.metrics.coverage, 25.0);
        // 32 + 15 + 16 + 3.75
        assert!((r.score - 66.75).abs() < 1e-9);
    }

    #[test]
    fn delta_buckets() {
        let d = delta(50.0, 50.0);
        assert_eq!(d.delta, 0.0);
        assert_eq!(d.trend, Trend::Stable);

        let d = delta(50.0, 53.0);
        assert_eq!(d.trend, Trend::Improving);
        assert!((d.percent_change - 6.0).abs() < 1e-9);

        assert_eq!(delta(50.0, 47.9).trend, Trend::Declining);
        assert_eq!(delta(0.0, 30.0).percent_change, 0.0);
    }
}
