//! Store trait definitions for the persistence collaborator.
//!
//! One narrow trait per entity. The `gatepath-store` crate implements all of
//! them in memory; a relational backend would implement the same seams.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::mastery::SkillMasteryState;
use crate::model::{
    Attempt, ConstructState, Module, ModuleCompletion, Question, ReadinessSnapshot,
    RecycleCheckpoint,
};
use crate::phase::{Phase, UserState};

// ---------------------------------------------------------------------------
// Attempt log
// ---------------------------------------------------------------------------

/// Result of appending to the attempt log.
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    Recorded,
    /// An attempt with the same id is already on record; it is returned
    /// unchanged and nothing was written. `applied` is false when its
    /// derived updates never completed.
    AlreadyRecorded { attempt: Attempt, applied: bool },
}

/// Append-only attempt log.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn append(&self, attempt: Attempt) -> Result<AppendOutcome, StoreError>;

    async fn get_attempt(&self, id: Uuid) -> Result<Option<Attempt>, StoreError>;

    /// Record that the construct and skill updates for `ids` are written.
    async fn mark_applied(&self, ids: &[Uuid]) -> Result<(), StoreError>;

    /// Every attempt for a learner, in insertion order.
    async fn attempts_for(&self, learner_id: &str) -> Result<Vec<Attempt>, StoreError>;
}

// ---------------------------------------------------------------------------
// Derived state
// ---------------------------------------------------------------------------

/// Cached construct states.
#[async_trait]
pub trait ConstructStateStore: Send + Sync {
    /// Stored states for a learner. Constructs never touched may be absent.
    async fn construct_states(&self, learner_id: &str) -> Result<Vec<ConstructState>, StoreError>;

    /// Replace every stored state for a learner.
    async fn put_construct_states(
        &self,
        learner_id: &str,
        states: Vec<ConstructState>,
    ) -> Result<(), StoreError>;
}

/// Cached per-skill mastery.
#[async_trait]
pub trait SkillMasteryStore: Send + Sync {
    async fn skill_state(
        &self,
        learner_id: &str,
        skill_id: &str,
    ) -> Result<Option<SkillMasteryState>, StoreError>;

    async fn put_skill_state(&self, state: SkillMasteryState) -> Result<(), StoreError>;

    async fn skill_states(&self, learner_id: &str) -> Result<Vec<SkillMasteryState>, StoreError>;

    /// Replace every stored skill state for a learner.
    async fn replace_skill_states(
        &self,
        learner_id: &str,
        states: Vec<SkillMasteryState>,
    ) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Phase state
// ---------------------------------------------------------------------------

/// The stored record a conditional phase write expects to replace.
///
/// The transition count guards against a record that left `phase` and came
/// back to it between the read and the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseVersion {
    pub phase: Phase,
    pub transitions: usize,
}

impl PhaseVersion {
    pub fn of(state: &UserState) -> Self {
        Self {
            phase: state.current_phase,
            transitions: state.history.len(),
        }
    }

    pub fn matches(&self, state: &UserState) -> bool {
        *self == Self::of(state)
    }
}

/// Result of a conditional phase write.
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome {
    Applied(UserState),
    /// The stored record no longer matched; it is returned.
    Conflict(UserState),
}

/// Per-learner phase record.
#[async_trait]
pub trait UserStateStore: Send + Sync {
    async fn user_state(&self, learner_id: &str) -> Result<Option<UserState>, StoreError>;

    /// Insert `state` unless a record exists; returns whichever is stored.
    async fn insert_user_state_if_absent(&self, state: UserState) -> Result<UserState, StoreError>;

    /// Atomically replace the record with `next` only if it still matches
    /// `expected`.
    async fn compare_and_swap_phase(
        &self,
        expected: PhaseVersion,
        next: UserState,
    ) -> Result<CasOutcome, StoreError>;
}

// ---------------------------------------------------------------------------
// Snapshots and checkpoints
// ---------------------------------------------------------------------------

/// Append-only readiness snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn append_snapshot(&self, snapshot: ReadinessSnapshot) -> Result<(), StoreError>;

    async fn snapshot(&self, id: Uuid) -> Result<Option<ReadinessSnapshot>, StoreError>;

    async fn latest_snapshot(
        &self,
        learner_id: &str,
    ) -> Result<Option<ReadinessSnapshot>, StoreError>;

    /// Oldest first.
    async fn snapshot_history(&self, learner_id: &str)
        -> Result<Vec<ReadinessSnapshot>, StoreError>;
}

/// Remediation checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn create_checkpoint(&self, checkpoint: RecycleCheckpoint) -> Result<(), StoreError>;

    async fn checkpoint(&self, id: Uuid) -> Result<Option<RecycleCheckpoint>, StoreError>;

    async fn update_checkpoint(&self, checkpoint: RecycleCheckpoint) -> Result<(), StoreError>;

    async fn count_checkpoints(
        &self,
        learner_id: &str,
        cycle_id: &str,
    ) -> Result<usize, StoreError>;

    /// Oldest first.
    async fn checkpoints_for(&self, learner_id: &str)
        -> Result<Vec<RecycleCheckpoint>, StoreError>;
}

// ---------------------------------------------------------------------------
// Question bank and modules
// ---------------------------------------------------------------------------

/// Read access to the question bank.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    async fn question(&self, id: &str) -> Result<Option<Question>, StoreError>;

    /// Published questions whose skill is in `skill_ids`, at most `limit`.
    async fn published_for_skills(
        &self,
        skill_ids: &[String],
        limit: usize,
    ) -> Result<Vec<Question>, StoreError>;
}

/// Modules and their completions.
#[async_trait]
pub trait ModuleStore: Send + Sync {
    async fn create_module(&self, module: Module) -> Result<(), StoreError>;

    async fn module(&self, id: &str) -> Result<Option<Module>, StoreError>;

    /// The subset of `ids` that exist.
    async fn existing_modules(&self, ids: &[String]) -> Result<BTreeSet<String>, StoreError>;

    async fn record_completion(&self, completion: ModuleCompletion) -> Result<(), StoreError>;

    async fn completed_module_ids(&self, learner_id: &str)
        -> Result<BTreeSet<String>, StoreError>;
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// Every store the engine talks to.
#[derive(Clone)]
pub struct Stores {
    pub attempts: Arc<dyn AttemptStore>,
    pub constructs: Arc<dyn ConstructStateStore>,
    pub skills: Arc<dyn SkillMasteryStore>,
    pub users: Arc<dyn UserStateStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub questions: Arc<dyn QuestionRepository>,
    pub modules: Arc<dyn ModuleStore>,
}

impl Stores {
    /// Use one backend for every entity.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: AttemptStore
            + ConstructStateStore
            + SkillMasteryStore
            + UserStateStore
            + SnapshotStore
            + CheckpointStore
            + QuestionRepository
            + ModuleStore
            + 'static,
    {
        Self {
            attempts: store.clone(),
            constructs: store.clone(),
            skills: store.clone(),
            users: store.clone(),
            snapshots: store.clone(),
            checkpoints: store.clone(),
            questions: store.clone(),
            modules: store,
        }
    }
}
