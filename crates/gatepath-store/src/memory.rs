//! In-memory store backend.
//!
//! Everything lives in one `StoreData` behind a `tokio::sync::RwLock`, so a
//! write lock makes each trait call atomic. The whole dataset serializes to
//! a single JSON file, which is how the CLI persists state between runs.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use gatepath_core::error::StoreError;
use gatepath_core::mastery::SkillMasteryState;
use gatepath_core::model::{
    Attempt, ConstructState, Module, ModuleCompletion, Question, ReadinessSnapshot,
    RecycleCheckpoint,
};
use gatepath_core::phase::{Phase, UserState};
use gatepath_core::traits::{
    AppendOutcome, AttemptStore, CasOutcome, CheckpointStore, ConstructStateStore, ModuleStore,
    PhaseVersion, QuestionRepository, SkillMasteryStore, SnapshotStore, UserStateStore,
};

use crate::bank::QuestionBank;

/// The full persisted dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreData {
    pub questions: BTreeMap<String, Question>,
    pub modules: BTreeMap<String, Module>,
    pub completions: Vec<ModuleCompletion>,
    pub attempts: Vec<Attempt>,
    /// Attempts whose derived updates have been written.
    pub applied_attempts: BTreeSet<Uuid>,
    /// Keyed by learner id.
    pub construct_states: BTreeMap<String, Vec<ConstructState>>,
    /// Keyed by learner id, then skill id.
    pub skill_states: BTreeMap<String, BTreeMap<String, SkillMasteryState>>,
    pub users: BTreeMap<String, UserState>,
    pub snapshots: Vec<ReadinessSnapshot>,
    pub checkpoints: Vec<RecycleCheckpoint>,
}

/// A store backend holding everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: StoreData) -> Self {
        Self {
            data: RwLock::new(data),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Load a dataset from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read data from {}", path.display()))?;
        let data: StoreData = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse data file {}", path.display()))?;
        Ok(Self::from_data(data))
    }

    /// Load from `path` if it exists, else start empty.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_json(path)
        } else {
            tracing::debug!("no data file at {}, starting empty", path.display());
            Ok(Self::new())
        }
    }

    /// Write the dataset to a JSON file.
    pub async fn save_json(&self, path: &Path) -> Result<()> {
        let json = {
            let data = self.data.read().await;
            serde_json::to_string_pretty(&*data).context("failed to serialize store data")?
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write data to {}", path.display()))?;
        Ok(())
    }

    /// A copy of the current dataset.
    pub async fn data(&self) -> StoreData {
        self.data.read().await.clone()
    }

    /// Add or replace questions and modules from a bank.
    pub async fn seed(&self, bank: QuestionBank) -> (usize, usize) {
        let mut data = self.data.write().await;
        let counts = (bank.questions.len(), bank.modules.len());
        for question in bank.questions {
            data.questions.insert(question.id.clone(), question);
        }
        for module in bank.modules {
            data.modules.insert(module.id.clone(), module);
        }
        counts
    }

    /// Remove a module, as an administrator deleting it would.
    pub async fn remove_module(&self, id: &str) -> Option<Module> {
        self.data.write().await.modules.remove(id)
    }

    /// Make every store call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Attempt log
// ---------------------------------------------------------------------------

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn append(&self, attempt: Attempt) -> Result<AppendOutcome, StoreError> {
        self.check()?;
        let mut data = self.data.write().await;
        if let Some(existing) = data.attempts.iter().find(|a| a.id == attempt.id) {
            return Ok(AppendOutcome::AlreadyRecorded {
                attempt: existing.clone(),
                applied: data.applied_attempts.contains(&attempt.id),
            });
        }
        data.attempts.push(attempt);
        Ok(AppendOutcome::Recorded)
    }

    async fn get_attempt(&self, id: Uuid) -> Result<Option<Attempt>, StoreError> {
        self.check()?;
        let data = self.data.read().await;
        Ok(data.attempts.iter().find(|a| a.id == id).cloned())
    }

    async fn mark_applied(&self, ids: &[Uuid]) -> Result<(), StoreError> {
        self.check()?;
        self.data
            .write()
            .await
            .applied_attempts
            .extend(ids.iter().copied());
        Ok(())
    }

    async fn attempts_for(&self, learner_id: &str) -> Result<Vec<Attempt>, StoreError> {
        self.check()?;
        let data = self.data.read().await;
        Ok(data
            .attempts
            .iter()
            .filter(|a| a.learner_id == learner_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Derived state
// ---------------------------------------------------------------------------

#[async_trait]
impl ConstructStateStore for MemoryStore {
    async fn construct_states(&self, learner_id: &str) -> Result<Vec<ConstructState>, StoreError> {
        self.check()?;
        let data = self.data.read().await;
        Ok(data
            .construct_states
            .get(learner_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_construct_states(
        &self,
        learner_id: &str,
        states: Vec<ConstructState>,
    ) -> Result<(), StoreError> {
        self.check()?;
        self.data
            .write()
            .await
            .construct_states
            .insert(learner_id.to_string(), states);
        Ok(())
    }
}

#[async_trait]
impl SkillMasteryStore for MemoryStore {
    async fn skill_state(
        &self,
        learner_id: &str,
        skill_id: &str,
    ) -> Result<Option<SkillMasteryState>, StoreError> {
        self.check()?;
        let data = self.data.read().await;
        Ok(data
            .skill_states
            .get(learner_id)
            .and_then(|skills| skills.get(skill_id))
            .cloned())
    }

    async fn put_skill_state(&self, state: SkillMasteryState) -> Result<(), StoreError> {
        self.check()?;
        self.data
            .write()
            .await
            .skill_states
            .entry(state.learner_id.clone())
            .or_default()
            .insert(state.skill_id.clone(), state);
        Ok(())
    }

    async fn skill_states(&self, learner_id: &str) -> Result<Vec<SkillMasteryState>, StoreError> {
        self.check()?;
        let data = self.data.read().await;
        Ok(data
            .skill_states
            .get(learner_id)
            .map(|skills| skills.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn replace_skill_states(
        &self,
        learner_id: &str,
        states: Vec<SkillMasteryState>,
    ) -> Result<(), StoreError> {
        self.check()?;
        let skills = states
            .into_iter()
            .map(|s| (s.skill_id.clone(), s))
            .collect();
        self.data
            .write()
            .await
            .skill_states
            .insert(learner_id.to_string(), skills);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Phase state
// ---------------------------------------------------------------------------

#[async_trait]
impl UserStateStore for MemoryStore {
    async fn user_state(&self, learner_id: &str) -> Result<Option<UserState>, StoreError> {
        self.check()?;
        Ok(self.data.read().await.users.get(learner_id).cloned())
    }

    async fn insert_user_state_if_absent(&self, state: UserState) -> Result<UserState, StoreError> {
        self.check()?;
        let mut data = self.data.write().await;
        Ok(data
            .users
            .entry(state.learner_id.clone())
            .or_insert(state)
            .clone())
    }

    async fn compare_and_swap_phase(
        &self,
        expected: PhaseVersion,
        next: UserState,
    ) -> Result<CasOutcome, StoreError> {
        self.check()?;
        let mut data = self.data.write().await;
        match data.users.get(&next.learner_id) {
            Some(current) if !expected.matches(current) => {
                Ok(CasOutcome::Conflict(current.clone()))
            }
            None if expected.phase != Phase::INITIAL => Err(StoreError::Malformed(format!(
                "no phase record for learner {}",
                next.learner_id
            ))),
            _ => {
                data.users.insert(next.learner_id.clone(), next.clone());
                Ok(CasOutcome::Applied(next))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshots and checkpoints
// ---------------------------------------------------------------------------

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn append_snapshot(&self, snapshot: ReadinessSnapshot) -> Result<(), StoreError> {
        self.check()?;
        self.data.write().await.snapshots.push(snapshot);
        Ok(())
    }

    async fn snapshot(&self, id: Uuid) -> Result<Option<ReadinessSnapshot>, StoreError> {
        self.check()?;
        let data = self.data.read().await;
        Ok(data.snapshots.iter().find(|s| s.id == id).cloned())
    }

    async fn latest_snapshot(
        &self,
        learner_id: &str,
    ) -> Result<Option<ReadinessSnapshot>, StoreError> {
        self.check()?;
        let data = self.data.read().await;
        Ok(data
            .snapshots
            .iter()
            .rev()
            .find(|s| s.learner_id == learner_id)
            .cloned())
    }

    async fn snapshot_history(
        &self,
        learner_id: &str,
    ) -> Result<Vec<ReadinessSnapshot>, StoreError> {
        self.check()?;
        let data = self.data.read().await;
        Ok(data
            .snapshots
            .iter()
            .filter(|s| s.learner_id == learner_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn create_checkpoint(&self, checkpoint: RecycleCheckpoint) -> Result<(), StoreError> {
        self.check()?;
        self.data.write().await.checkpoints.push(checkpoint);
        Ok(())
    }

    async fn checkpoint(&self, id: Uuid) -> Result<Option<RecycleCheckpoint>, StoreError> {
        self.check()?;
        let data = self.data.read().await;
        Ok(data.checkpoints.iter().find(|c| c.id == id).cloned())
    }

    async fn update_checkpoint(&self, checkpoint: RecycleCheckpoint) -> Result<(), StoreError> {
        self.check()?;
        let mut data = self.data.write().await;
        let slot = data
            .checkpoints
            .iter_mut()
            .find(|c| c.id == checkpoint.id)
            .ok_or_else(|| StoreError::Malformed(format!("no checkpoint {}", checkpoint.id)))?;
        *slot = checkpoint;
        Ok(())
    }

    async fn count_checkpoints(
        &self,
        learner_id: &str,
        cycle_id: &str,
    ) -> Result<usize, StoreError> {
        self.check()?;
        let data = self.data.read().await;
        Ok(data
            .checkpoints
            .iter()
            .filter(|c| c.learner_id == learner_id && c.cycle_id == cycle_id)
            .count())
    }

    async fn checkpoints_for(
        &self,
        learner_id: &str,
    ) -> Result<Vec<RecycleCheckpoint>, StoreError> {
        self.check()?;
        let data = self.data.read().await;
        Ok(data
            .checkpoints
            .iter()
            .filter(|c| c.learner_id == learner_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Question bank and modules
// ---------------------------------------------------------------------------

#[async_trait]
impl QuestionRepository for MemoryStore {
    async fn question(&self, id: &str) -> Result<Option<Question>, StoreError> {
        self.check()?;
        Ok(self.data.read().await.questions.get(id).cloned())
    }

    async fn published_for_skills(
        &self,
        skill_ids: &[String],
        limit: usize,
    ) -> Result<Vec<Question>, StoreError> {
        self.check()?;
        let data = self.data.read().await;
        Ok(data
            .questions
            .values()
            .filter(|q| q.published && skill_ids.contains(&q.skill_id))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ModuleStore for MemoryStore {
    async fn create_module(&self, module: Module) -> Result<(), StoreError> {
        self.check()?;
        self.data
            .write()
            .await
            .modules
            .insert(module.id.clone(), module);
        Ok(())
    }

    async fn module(&self, id: &str) -> Result<Option<Module>, StoreError> {
        self.check()?;
        Ok(self.data.read().await.modules.get(id).cloned())
    }

    async fn existing_modules(&self, ids: &[String]) -> Result<BTreeSet<String>, StoreError> {
        self.check()?;
        let data = self.data.read().await;
        Ok(ids
            .iter()
            .filter(|id| data.modules.contains_key(*id))
            .cloned()
            .collect())
    }

    async fn record_completion(&self, completion: ModuleCompletion) -> Result<(), StoreError> {
        self.check()?;
        self.data.write().await.completions.push(completion);
        Ok(())
    }

    async fn completed_module_ids(&self, learner_id: &str) -> Result<BTreeSet<String>, StoreError> {
        self.check()?;
        let data = self.data.read().await;
        Ok(data
            .completions
            .iter()
            .filter(|c| c.learner_id == learner_id)
            .map(|c| c.module_id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use gatepath_core::model::{ConstructWeights, ContextType, ModuleKind};

    use super::*;

    fn attempt(id: Uuid, learner: &str) -> Attempt {
        Attempt {
            id,
            learner_id: learner.into(),
            question_id: "q1".into(),
            skill_id: "s1".into(),
            is_correct: true,
            time_spent_sec: 12.0,
            construct_weights: ConstructWeights::new(),
            context_type: ContextType::Drill,
            context_id: None,
            module_id: None,
            created_at: Utc::now(),
        }
    }

    fn question(id: &str, skill: &str, published: bool) -> Question {
        Question {
            id: id.into(),
            skill_id: skill.into(),
            correct_answer: "A".into(),
            construct_weights: ConstructWeights::new(),
            published,
        }
    }

    #[tokio::test]
    async fn append_is_idempotent_on_id() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        assert_eq!(
            store.append(attempt(id, "u1")).await.unwrap(),
            AppendOutcome::Recorded
        );
        let second = store.append(attempt(id, "u1")).await.unwrap();
        assert!(matches!(
            second,
            AppendOutcome::AlreadyRecorded { ref attempt, applied: false } if attempt.id == id
        ));
        assert_eq!(store.attempts_for("u1").await.unwrap().len(), 1);
        assert!(store.attempts_for("u2").await.unwrap().is_empty());

        store.mark_applied(&[id]).await.unwrap();
        let third = store.append(attempt(id, "u1")).await.unwrap();
        assert!(matches!(
            third,
            AppendOutcome::AlreadyRecorded { applied: true, .. }
        ));
    }

    #[tokio::test]
    async fn cas_rejects_stale_phase() {
        let store = MemoryStore::new();
        let state = store
            .insert_user_state_if_absent(UserState::new("u1", Utc::now()))
            .await
            .unwrap();

        let mut next = state.clone();
        next.enter(Phase::BaselineAssessmentInProgress, Utc::now());
        let applied = store
            .compare_and_swap_phase(PhaseVersion::of(&state), next.clone())
            .await
            .unwrap();
        assert!(matches!(applied, CasOutcome::Applied(_)));

        let conflict = store
            .compare_and_swap_phase(PhaseVersion::of(&state), next)
            .await
            .unwrap();
        match conflict {
            CasOutcome::Conflict(current) => {
                assert_eq!(current.current_phase, Phase::BaselineAssessmentInProgress)
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cas_rejects_record_that_looped_back() {
        let store = MemoryStore::new();
        let mut state = UserState::new("u1", Utc::now());
        for phase in [
            Phase::BaselineAssessmentInProgress,
            Phase::BaselineComplete,
            Phase::PlanActive,
        ] {
            state.enter(phase, Utc::now());
        }
        state.active_cycle_id = Some("c1".into());
        store.insert_user_state_if_absent(state.clone()).await.unwrap();

        // A stale read, still in PLAN_ACTIVE.
        let stale = state.clone();

        // Another device runs a whole recycle loop back to PLAN_ACTIVE.
        let mut current = state;
        for phase in [
            Phase::RecycleUnlocked,
            Phase::RecycleAssessmentInProgress,
            Phase::PlanActive,
        ] {
            let mut next = current.clone();
            next.enter(phase, Utc::now());
            match store
                .compare_and_swap_phase(PhaseVersion::of(&current), next)
                .await
                .unwrap()
            {
                CasOutcome::Applied(stored) => current = stored,
                other => panic!("expected applied, got {other:?}"),
            }
        }

        let mut late = stale.clone();
        late.enter(Phase::RecycleUnlocked, Utc::now());
        let outcome = store
            .compare_and_swap_phase(PhaseVersion::of(&stale), late)
            .await
            .unwrap();
        match outcome {
            CasOutcome::Conflict(stored) => {
                assert_eq!(stored.current_phase, Phase::PlanActive);
                assert_eq!(stored.history.len(), 6);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(store.user_state("u1").await.unwrap().unwrap().history.len(), 6);
    }

    #[tokio::test]
    async fn insert_if_absent_keeps_existing() {
        let store = MemoryStore::new();
        let mut first = UserState::new("u1", Utc::now());
        first.active_cycle_id = Some("c1".into());
        store.insert_user_state_if_absent(first).await.unwrap();
        let kept = store
            .insert_user_state_if_absent(UserState::new("u1", Utc::now()))
            .await
            .unwrap();
        assert_eq!(kept.active_cycle_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn published_questions_filtered_and_limited() {
        let store = MemoryStore::new();
        store
            .seed(QuestionBank {
                questions: vec![
                    question("q1", "s1", true),
                    question("q2", "s1", false),
                    question("q3", "s2", true),
                    question("q4", "s1", true),
                    question("q5", "s3", true),
                ],
                modules: vec![],
            })
            .await;

        let skills = vec!["s1".to_string(), "s2".to_string()];
        let all = store.published_for_skills(&skills, 10).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q3", "q4"]);
        assert_eq!(store.published_for_skills(&skills, 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn existing_modules_is_a_subset() {
        let store = MemoryStore::new();
        store
            .create_module(Module {
                id: "b1".into(),
                kind: ModuleKind::Baseline,
                question_ids: vec![],
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let ids = vec!["b1".to_string(), "b2".to_string()];
        let existing = store.existing_modules(&ids).await.unwrap();
        assert_eq!(existing, BTreeSet::from(["b1".to_string()]));
    }

    #[tokio::test]
    async fn unavailable_store_errors() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.attempts_for("u1").await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_unavailable(false);
        assert!(store.attempts_for("u1").await.is_ok());
    }

    #[tokio::test]
    async fn json_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");

        let store = MemoryStore::new();
        store.append(attempt(Uuid::new_v4(), "u1")).await.unwrap();
        store
            .insert_user_state_if_absent(UserState::new("u1", Utc::now()))
            .await
            .unwrap();
        store.save_json(&path).await.unwrap();

        let loaded = MemoryStore::load_or_default(&path).unwrap();
        assert_eq!(loaded.data().await, store.data().await);

        let empty = MemoryStore::load_or_default(&dir.path().join("missing.json")).unwrap();
        assert_eq!(empty.data().await, StoreData::default());
    }

    #[tokio::test]
    async fn concurrent_cas_has_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let state = store
            .insert_user_state_if_absent(UserState::new("u1", Utc::now()))
            .await
            .unwrap();

        let expected = PhaseVersion::of(&state);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let mut next = state.clone();
            next.enter(Phase::BaselineAssessmentInProgress, Utc::now());
            handles.push(tokio::spawn(async move {
                store.compare_and_swap_phase(expected, next).await
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if let CasOutcome::Applied(_) = handle.await.unwrap().unwrap() {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
    }
}
