//! Core data model types for gatepath.
//!
//! Attempts are the append-only source of truth. Construct states, skill
//! mastery states and readiness snapshots are derived views that can be
//! rebuilt from the attempt log.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::readiness::{Grade, ReadinessDelta, ReadinessMetrics};

/// Absolute change beyond which a score movement counts as a trend.
///
/// Shared by construct trends and readiness deltas.
pub const TREND_THRESHOLD: f64 = 2.0;

/// Neutral starting score for every construct.
pub const NEUTRAL_SCORE: f64 = 50.0;

// ---------------------------------------------------------------------------
// Constructs
// ---------------------------------------------------------------------------

/// One of the five latent proficiency axes.
///
/// Declaration order is significant: it is the deterministic tie-break when
/// constructs with equal scores are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Construct {
    Teliti,
    Speed,
    Reasoning,
    Computation,
    Reading,
}

impl Construct {
    /// All constructs in declared order.
    pub const ALL: [Construct; 5] = [
        Construct::Teliti,
        Construct::Speed,
        Construct::Reasoning,
        Construct::Computation,
        Construct::Reading,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Construct::Teliti => "teliti",
            Construct::Speed => "speed",
            Construct::Reasoning => "reasoning",
            Construct::Computation => "computation",
            Construct::Reading => "reading",
        }
    }

    /// Position in the declared order.
    pub fn ordinal(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Construct {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "teliti" | "attention" => Ok(Construct::Teliti),
            "speed" => Ok(Construct::Speed),
            "reasoning" => Ok(Construct::Reasoning),
            "computation" => Ok(Construct::Computation),
            "reading" => Ok(Construct::Reading),
            other => Err(format!("unknown construct: {other}")),
        }
    }
}

/// Per-construct impact weights carried by a question and its attempts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstructWeights(BTreeMap<Construct, f64>);

impl ConstructWeights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full weight on a single construct.
    pub fn single(construct: Construct) -> Self {
        Self::new().with(construct, 1.0)
    }

    /// Set a weight, clamped to `[0, 1]`.
    pub fn with(mut self, construct: Construct, weight: f64) -> Self {
        self.0.insert(construct, clamp_weight(weight));
        self
    }

    pub fn get(&self, construct: Construct) -> f64 {
        self.0.get(&construct).copied().map(clamp_weight).unwrap_or(0.0)
    }

    /// Constructs with a nonzero weight, in declared order.
    pub fn nonzero(&self) -> impl Iterator<Item = (Construct, f64)> + '_ {
        Construct::ALL
            .into_iter()
            .map(|c| (c, self.get(c)))
            .filter(|(_, w)| *w > 0.0)
    }

    pub fn total(&self) -> f64 {
        Construct::ALL.iter().map(|c| self.get(*c)).sum()
    }

    /// Rescale so the weights sum to 1. All-zero weights stay all-zero.
    pub fn normalized(&self) -> Self {
        let total = self.total();
        if total <= 0.0 {
            return Self::default();
        }
        Self(self.nonzero().map(|(c, w)| (c, w / total)).collect())
    }
}

fn clamp_weight(weight: f64) -> f64 {
    if weight.is_finite() {
        weight.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Direction of a score over time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    #[default]
    Stable,
    Declining,
}

impl Trend {
    /// Bucket a signed change: above +2 improving, below -2 declining.
    pub fn from_delta(delta: f64) -> Self {
        if delta > TREND_THRESHOLD {
            Trend::Improving
        } else if delta < -TREND_THRESHOLD {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Improving => write!(f, "improving"),
            Trend::Stable => write!(f, "stable"),
            Trend::Declining => write!(f, "declining"),
        }
    }
}

/// A learner's running estimate for one construct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructState {
    pub construct: Construct,
    /// Current score in `[0, 100]`.
    pub score: f64,
    /// How much evidence backs the score, `[0, 100]`.
    pub confidence: f64,
    pub trend: Trend,
    /// Number of attempts that moved this construct.
    pub data_points: u32,
    /// Recent scores, oldest first, used for trend detection.
    #[serde(default)]
    pub history: Vec<f64>,
}

impl ConstructState {
    /// The default state for a construct with no data.
    pub fn neutral(construct: Construct) -> Self {
        Self {
            construct,
            score: NEUTRAL_SCORE,
            confidence: 0.0,
            trend: Trend::Stable,
            data_points: 0,
            history: Vec::new(),
        }
    }
}

/// All five construct states for a learner, in declared order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructProfile {
    pub learner_id: String,
    pub states: Vec<ConstructState>,
}

impl ConstructProfile {
    /// Build a profile, filling any construct missing from `stored` with
    /// its neutral default.
    pub fn from_states(learner_id: &str, stored: Vec<ConstructState>) -> Self {
        let mut by_construct: BTreeMap<Construct, ConstructState> =
            stored.into_iter().map(|s| (s.construct, s)).collect();
        let states = Construct::ALL
            .into_iter()
            .map(|c| {
                by_construct
                    .remove(&c)
                    .unwrap_or_else(|| ConstructState::neutral(c))
            })
            .collect();
        Self {
            learner_id: learner_id.to_string(),
            states,
        }
    }

    pub fn neutral(learner_id: &str) -> Self {
        Self::from_states(learner_id, Vec::new())
    }

    pub fn get(&self, construct: Construct) -> &ConstructState {
        &self.states[construct.ordinal()]
    }

    pub fn get_mut(&mut self, construct: Construct) -> &mut ConstructState {
        &mut self.states[construct.ordinal()]
    }

    pub fn score(&self, construct: Construct) -> f64 {
        self.get(construct).score
    }

    /// Score per construct, for embedding in snapshots.
    pub fn scores(&self) -> BTreeMap<Construct, f64> {
        self.states.iter().map(|s| (s.construct, s.score)).collect()
    }
}

// ---------------------------------------------------------------------------
// Attempts
// ---------------------------------------------------------------------------

/// Which activity produced an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextType {
    Baseline,
    Drill,
    Mock,
    Recycle,
    Flashcard,
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextType::Baseline => write!(f, "baseline"),
            ContextType::Drill => write!(f, "drill"),
            ContextType::Mock => write!(f, "mock"),
            ContextType::Recycle => write!(f, "recycle"),
            ContextType::Flashcard => write!(f, "flashcard"),
        }
    }
}

impl FromStr for ContextType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "baseline" => Ok(ContextType::Baseline),
            "drill" => Ok(ContextType::Drill),
            "mock" => Ok(ContextType::Mock),
            "recycle" => Ok(ContextType::Recycle),
            "flashcard" => Ok(ContextType::Flashcard),
            other => Err(format!("unknown context type: {other}")),
        }
    }
}

/// One answered question. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub learner_id: String,
    pub question_id: String,
    pub skill_id: String,
    pub is_correct: bool,
    pub time_spent_sec: f64,
    pub construct_weights: ConstructWeights,
    pub context_type: ContextType,
    #[serde(default)]
    pub context_id: Option<String>,
    #[serde(default)]
    pub module_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Question bank and modules
// ---------------------------------------------------------------------------

/// A question as seen by the core: its skill, answer key and construct
/// impact. Rendering concerns live elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub skill_id: String,
    pub correct_answer: String,
    #[serde(default)]
    pub construct_weights: ConstructWeights,
    #[serde(default = "default_true")]
    pub published: bool,
}

impl Question {
    /// Trimmed, case-insensitive comparison against the answer key.
    pub fn is_correct(&self, answer: &str) -> bool {
        self.correct_answer.trim().eq_ignore_ascii_case(answer.trim())
    }
}

fn default_true() -> bool {
    true
}

/// What a module is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Baseline,
    Drill,
    Mock,
    Checkpoint,
}

/// An ordered set of questions taken as one activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    pub kind: ModuleKind,
    pub question_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A learner's recorded completion of a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleCompletion {
    pub learner_id: String,
    pub module_id: String,
    pub score: f64,
    pub total_questions: u32,
    pub correct_count: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Snapshots and checkpoints
// ---------------------------------------------------------------------------

/// Why a readiness snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotScope {
    PartialBaseline,
    FullBaseline,
    Checkpoint,
    CycleEnd,
    Daily,
}

impl fmt::Display for SnapshotScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotScope::PartialBaseline => write!(f, "partial_baseline"),
            SnapshotScope::FullBaseline => write!(f, "full_baseline"),
            SnapshotScope::Checkpoint => write!(f, "checkpoint"),
            SnapshotScope::CycleEnd => write!(f, "cycle_end"),
            SnapshotScope::Daily => write!(f, "daily"),
        }
    }
}

impl FromStr for SnapshotScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "partial_baseline" => Ok(SnapshotScope::PartialBaseline),
            "full_baseline" => Ok(SnapshotScope::FullBaseline),
            "checkpoint" => Ok(SnapshotScope::Checkpoint),
            "cycle_end" => Ok(SnapshotScope::CycleEnd),
            "daily" => Ok(SnapshotScope::Daily),
            other => Err(format!("unknown snapshot scope: {other}")),
        }
    }
}

/// Point-in-time composite readiness. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessSnapshot {
    pub id: Uuid,
    pub learner_id: String,
    pub scope: SnapshotScope,
    pub metrics: ReadinessMetrics,
    pub score: f64,
    pub grade: Grade,
    pub construct_scores: BTreeMap<Construct, f64>,
    pub created_at: DateTime<Utc>,
}

/// One remediation cycle targeting the learner's weakest skills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecycleCheckpoint {
    pub id: Uuid,
    pub learner_id: String,
    pub cycle_id: String,
    /// 1-based, sequential per learner and cycle.
    pub checkpoint_number: u32,
    /// Weak skill ids at creation time.
    pub weak_skills: Vec<String>,
    pub module_id: String,
    pub question_count: usize,
    /// Most recent snapshot before the checkpoint, if any.
    #[serde(default)]
    pub before_snapshot_id: Option<Uuid>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub readiness_delta: Option<ReadinessDelta>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}
