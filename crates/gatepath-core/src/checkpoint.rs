//! Remediation checkpoint construction.
//!
//! A checkpoint is a shuffled, bounded question set drawn from the learner's
//! weak skills, materialized as a module and recorded against the active
//! learning cycle.

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigError, EngineError, PreconditionFailure};
use crate::mastery::{WeakSkillSelector, WeakSkills};
use crate::model::{Module, ModuleKind, RecycleCheckpoint};
use crate::traits::Stores;

/// Bounds for checkpoint question selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Upper bound on questions fetched from the repository.
    pub fetch_limit: usize,
    /// Questions kept after shuffling.
    pub target_size: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            fetch_limit: 60,
            target_size: 20,
        }
    }
}

impl CheckpointConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_size == 0 || self.fetch_limit < self.target_size {
            return Err(ConfigError::InvalidValue {
                field: "checkpoint",
                reason: format!(
                    "need 0 < target_size ({}) <= fetch_limit ({})",
                    self.target_size, self.fetch_limit
                ),
            });
        }
        Ok(())
    }
}

/// Response of the checkpoint creation trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointResponse {
    pub success: bool,
    pub checkpoint_id: Uuid,
    pub module_id: String,
    pub question_count: usize,
    pub weak_skills_targeted: usize,
}

/// Builds remediation checkpoints.
pub struct CheckpointBuilder {
    stores: Stores,
    selector: WeakSkillSelector,
    config: CheckpointConfig,
}

impl CheckpointBuilder {
    pub fn new(stores: Stores, config: CheckpointConfig) -> Self {
        Self {
            stores,
            selector: WeakSkillSelector,
            config,
        }
    }

    /// Create a checkpoint for the learner's current weak skills.
    ///
    /// Fails with a distinct precondition for a missing cycle, no weak
    /// skills, and no eligible questions. Concurrent calls for the same
    /// learner may both succeed.
    pub async fn build<R: Rng + Send>(
        &self,
        learner_id: &str,
        rng: &mut R,
    ) -> Result<RecycleCheckpoint, EngineError> {
        let cycle_id = self
            .stores
            .users
            .user_state(learner_id)
            .await?
            .and_then(|s| s.active_cycle_id)
            .ok_or(PreconditionFailure::NoActiveCycle)?;

        let weak_skills = match self
            .selector
            .select_for(self.stores.skills.as_ref(), learner_id)
            .await?
        {
            WeakSkills::None => return Err(PreconditionFailure::NoWeakSkills.into()),
            WeakSkills::Found(ids) => ids,
        };

        let mut questions = self
            .stores
            .questions
            .published_for_skills(&weak_skills, self.config.fetch_limit)
            .await?;
        if questions.is_empty() {
            return Err(PreconditionFailure::NoQuestionsAvailable.into());
        }

        questions.shuffle(rng);
        questions.truncate(self.config.target_size);

        let now = Utc::now();
        let module = Module {
            id: Uuid::new_v4().to_string(),
            kind: ModuleKind::Checkpoint,
            question_ids: questions.iter().map(|q| q.id.clone()).collect(),
            created_at: now,
        };
        self.stores.modules.create_module(module.clone()).await?;

        let prior = self
            .stores
            .checkpoints
            .count_checkpoints(learner_id, &cycle_id)
            .await?;
        let before = self.stores.snapshots.latest_snapshot(learner_id).await?;

        let checkpoint = RecycleCheckpoint {
            id: Uuid::new_v4(),
            learner_id: learner_id.to_string(),
            cycle_id,
            checkpoint_number: prior as u32 + 1,
            weak_skills,
            module_id: module.id,
            question_count: module.question_ids.len(),
            before_snapshot_id: before.map(|s| s.id),
            completed: false,
            readiness_delta: None,
            created_at: now,
            completed_at: None,
        };
        self.stores
            .checkpoints
            .create_checkpoint(checkpoint.clone())
            .await?;

        tracing::info!(
            learner = %learner_id,
            checkpoint = %checkpoint.id,
            "checkpoint #{} created: {} questions over {} weak skills",
            checkpoint.checkpoint_number,
            checkpoint.question_count,
            checkpoint.weak_skills.len()
        );

        Ok(checkpoint)
    }
}

impl From<&RecycleCheckpoint> for CheckpointResponse {
    fn from(checkpoint: &RecycleCheckpoint) -> Self {
        Self {
            success: true,
            checkpoint_id: checkpoint.id,
            module_id: checkpoint.module_id.clone(),
            question_count: checkpoint.question_count,
            weak_skills_targeted: checkpoint.weak_skills.len(),
        }
    }
}
