//! Progress engine orchestrator.
//!
//! Wires the scorers, the phase machine and the checkpoint builder to the
//! stores. Every operation is request-scoped: state is read from the stores,
//! updated, and written back. Phase changes go through a conditional write
//! on the expected prior phase, so concurrent requests for one learner have
//! a single winner.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::checkpoint::{CheckpointBuilder, CheckpointConfig, CheckpointResponse};
use crate::construct::{identify_weak_constructs, ConstructScorer, ScoringConfig};
use crate::error::{ConfigError, EngineError, PreconditionFailure};
use crate::mastery::{
    replay_skill_states, MasteryConfig, SkillMasteryState, WeakSkillSelector, WeakSkills,
};
use crate::model::{
    Attempt, ConstructProfile, ConstructState, ContextType, ModuleCompletion, ModuleKind,
    ReadinessSnapshot, RecycleCheckpoint, SnapshotScope,
};
use crate::phase::{
    evaluate_baseline_gate, BaselineStatus, Phase, PhaseGates, PhaseMachine, UserState,
};
use crate::readiness::{delta, ReadinessCalculator, ReadinessResult, ReadinessWeights};
use crate::traits::{AppendOutcome, CasOutcome, PhaseVersion, Stores};

/// The program a learner is enrolled in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramConfig {
    /// Baseline modules that must all be completed.
    pub baseline_module_ids: Vec<String>,
    /// Size of the skill taxonomy, the coverage denominator.
    pub total_skill_count: usize,
}

/// Configuration for the progress engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub program: ProgramConfig,
    pub scoring: ScoringConfig,
    pub mastery: MasteryConfig,
    pub readiness: ReadinessWeights,
    pub checkpoint: CheckpointConfig,
    /// Fixed seed for checkpoint shuffling; entropy when unset.
    pub shuffle_seed: Option<u64>,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;
        self.mastery.validate()?;
        self.readiness.validate()?;
        self.checkpoint.validate()?;
        Ok(())
    }
}

/// Attempt ingestion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptSubmission {
    pub learner_id: String,
    /// Caller-chosen id; resubmitting the same id is a no-op.
    #[serde(default)]
    pub attempt_id: Option<Uuid>,
    pub question_id: String,
    pub user_answer: String,
    pub time_spent_sec: f64,
    pub context_type: ContextType,
    #[serde(default)]
    pub context_id: Option<String>,
    #[serde(default)]
    pub module_id: Option<String>,
}

/// Attempt ingestion response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptOutcome {
    pub attempt_id: Uuid,
    pub is_correct: bool,
    /// The attempt id was already on record; nothing was updated.
    pub duplicate: bool,
}

/// Module completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleCompletionRequest {
    pub learner_id: String,
    pub module_id: String,
    pub score: f64,
    pub total_questions: u32,
    pub correct_count: u32,
    pub started_at: DateTime<Utc>,
}

/// Module completion response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleCompletionOutcome {
    pub success: bool,
    pub completion: ModuleCompletion,
    /// Every configured baseline module is complete.
    pub all_complete: bool,
    pub readiness_score: f64,
    pub phase: Phase,
}

/// Result of a persisted phase change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    Applied { state: UserState },
    /// Another request changed the phase first.
    Superseded { observed: Phase },
}

impl TransitionOutcome {
    pub fn phase(&self) -> Phase {
        match self {
            TransitionOutcome::Applied { state } => state.current_phase,
            TransitionOutcome::Superseded { observed } => *observed,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }
}

/// Entering the recycle assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecycleStart {
    pub checkpoint: CheckpointResponse,
    pub transition: TransitionOutcome,
}

/// Closing a checkpoint.
///
/// When the transition was superseded by a concurrent close, `snapshot` is
/// `None` and `checkpoint` is the record as the winner left it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointClosure {
    pub checkpoint: RecycleCheckpoint,
    pub snapshot: Option<ReadinessSnapshot>,
    pub transition: TransitionOutcome,
}

/// Result of rebuilding cached state from the attempt log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecomputeSummary {
    pub attempts_replayed: usize,
    pub profile: ConstructProfile,
    pub skills: Vec<SkillMasteryState>,
}

/// The central progress engine.
pub struct ProgressEngine {
    stores: Stores,
    config: EngineConfig,
    machine: PhaseMachine,
    scorer: ConstructScorer,
    calculator: ReadinessCalculator,
    selector: WeakSkillSelector,
    checkpoints: CheckpointBuilder,
}

impl ProgressEngine {
    /// Validate the configuration and transition table, then build.
    pub fn new(stores: Stores, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let machine = PhaseMachine::new()?;
        let calculator = ReadinessCalculator::new(config.readiness)?;
        Ok(Self {
            checkpoints: CheckpointBuilder::new(stores.clone(), config.checkpoint.clone()),
            scorer: ConstructScorer::new(config.scoring.clone()),
            selector: WeakSkillSelector,
            stores,
            config,
            machine,
            calculator,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn machine(&self) -> &PhaseMachine {
        &self.machine
    }

    // -----------------------------------------------------------------------
    // Phase state
    // -----------------------------------------------------------------------

    /// The learner's phase record, created in the initial phase on first use.
    pub async fn user_state(&self, learner_id: &str) -> Result<UserState, EngineError> {
        if let Some(state) = self.stores.users.user_state(learner_id).await? {
            return Ok(state);
        }
        let fresh = UserState::new(learner_id, Utc::now());
        Ok(self.stores.users.insert_user_state_if_absent(fresh).await?)
    }

    pub async fn gates(&self, learner_id: &str) -> Result<PhaseGates, EngineError> {
        Ok(self.user_state(learner_id).await?.gates())
    }

    async fn advance(
        &self,
        learner_id: &str,
        target: Phase,
        edit: impl FnOnce(&mut UserState) + Send,
    ) -> Result<TransitionOutcome, EngineError> {
        let current = self.user_state(learner_id).await?;
        self.apply_transition(current, target, edit).await
    }

    /// Validate, then write conditioned on the phase `current` was read in.
    async fn apply_transition(
        &self,
        current: UserState,
        target: Phase,
        edit: impl FnOnce(&mut UserState) + Send,
    ) -> Result<TransitionOutcome, EngineError> {
        let from = current.current_phase;
        self.machine.transition(from, target)?;

        let expected = PhaseVersion::of(&current);
        let learner_id = current.learner_id.clone();
        let mut next = current;
        next.enter(target, Utc::now());
        edit(&mut next);

        match self.stores.users.compare_and_swap_phase(expected, next).await? {
            CasOutcome::Applied(state) => {
                tracing::info!(learner = %learner_id, "phase {from} -> {target}");
                Ok(TransitionOutcome::Applied { state })
            }
            CasOutcome::Conflict(state) => {
                tracing::warn!(
                    learner = %learner_id,
                    "phase {from} -> {target} lost to a concurrent update, now {}",
                    state.current_phase
                );
                Ok(TransitionOutcome::Superseded {
                    observed: state.current_phase,
                })
            }
        }
    }

    /// `ONBOARDING -> BASELINE_ASSESSMENT_IN_PROGRESS`.
    ///
    /// Baseline modules may already be complete when the learner starts, in
    /// which case the learner continues straight to `BASELINE_COMPLETE`.
    pub async fn start_baseline(&self, learner_id: &str) -> Result<TransitionOutcome, EngineError> {
        let first = self
            .config
            .program
            .baseline_module_ids
            .first()
            .cloned()
            .ok_or(PreconditionFailure::NoBaselineModules)?;
        let outcome = self
            .advance(learner_id, Phase::BaselineAssessmentInProgress, move |s| {
                s.active_baseline_module = Some(first);
            })
            .await?;

        let TransitionOutcome::Applied { state } = outcome else {
            return Ok(outcome);
        };
        if !self.baseline_status(learner_id).await?.all_complete() {
            return Ok(TransitionOutcome::Applied { state });
        }
        let (outcome, _) = self.close_baseline(state).await?;
        Ok(outcome)
    }

    /// `BASELINE_ASSESSMENT_IN_PROGRESS -> BASELINE_COMPLETE`.
    ///
    /// The `full_baseline` snapshot is only taken by the request whose write
    /// lands.
    async fn close_baseline(
        &self,
        state: UserState,
    ) -> Result<(TransitionOutcome, Option<ReadinessSnapshot>), EngineError> {
        let learner_id = state.learner_id.clone();
        let outcome = self
            .apply_transition(state, Phase::BaselineComplete, |s| {
                s.active_baseline_module = None;
            })
            .await?;
        if !outcome.is_applied() {
            return Ok((outcome, None));
        }
        let snapshot = self
            .generate_snapshot(&learner_id, SnapshotScope::FullBaseline)
            .await?;
        Ok((outcome, Some(snapshot)))
    }

    /// All-of gate over the currently configured baseline modules.
    pub async fn baseline_status(&self, learner_id: &str) -> Result<BaselineStatus, EngineError> {
        let configured = &self.config.program.baseline_module_ids;
        if configured.is_empty() {
            return Err(PreconditionFailure::NoBaselineModules.into());
        }
        let (completed, existing) = futures::try_join!(
            self.stores.modules.completed_module_ids(learner_id),
            self.stores.modules.existing_modules(configured),
        )?;
        Ok(evaluate_baseline_gate(configured, &completed, &existing)?)
    }

    /// `BASELINE_COMPLETE -> PLAN_ACTIVE`, opening `cycle_id`.
    ///
    /// Re-checks the baseline gate and requires a recorded snapshot.
    pub async fn activate_plan(
        &self,
        learner_id: &str,
        cycle_id: &str,
    ) -> Result<TransitionOutcome, EngineError> {
        let user = self.user_state(learner_id).await?;
        self.machine.transition(user.current_phase, Phase::PlanActive)?;

        let status = self.baseline_status(learner_id).await?;
        if !status.all_complete() {
            return Err(PreconditionFailure::BaselineIncomplete {
                remaining: status.missing.len(),
            }
            .into());
        }
        if self
            .stores
            .snapshots
            .latest_snapshot(learner_id)
            .await?
            .is_none()
        {
            return Err(PreconditionFailure::NoReadinessSnapshot.into());
        }

        let cycle_id = cycle_id.to_string();
        self.apply_transition(user, Phase::PlanActive, move |s| {
            s.active_cycle_id = Some(cycle_id);
        })
        .await
    }

    /// `PLAN_ACTIVE -> RECYCLE_UNLOCKED`.
    pub async fn unlock_recycle(&self, learner_id: &str) -> Result<TransitionOutcome, EngineError> {
        self.advance(learner_id, Phase::RecycleUnlocked, |_| {}).await
    }

    /// `RECYCLE_UNLOCKED -> RECYCLE_ASSESSMENT_IN_PROGRESS`, building the
    /// checkpoint the learner is routed into.
    pub async fn start_recycle(&self, learner_id: &str) -> Result<RecycleStart, EngineError> {
        let user = self.user_state(learner_id).await?;
        self.machine
            .transition(user.current_phase, Phase::RecycleAssessmentInProgress)?;

        let checkpoint = self.build_checkpoint(learner_id).await?;
        let checkpoint_id = checkpoint.id;
        let transition = self
            .apply_transition(user, Phase::RecycleAssessmentInProgress, move |s| {
                s.active_checkpoint_id = Some(checkpoint_id);
            })
            .await?;

        Ok(RecycleStart {
            checkpoint: CheckpointResponse::from(&checkpoint),
            transition,
        })
    }

    /// Close the active checkpoint and return to `PLAN_ACTIVE`.
    ///
    /// The phase write goes first. Only the request that wins it takes the
    /// `checkpoint` snapshot and records the readiness delta against the
    /// snapshot captured when the checkpoint was built.
    pub async fn complete_checkpoint(
        &self,
        learner_id: &str,
    ) -> Result<CheckpointClosure, EngineError> {
        let user = self.user_state(learner_id).await?;
        if user.current_phase != Phase::RecycleAssessmentInProgress {
            return Err(PreconditionFailure::NoActiveCheckpoint.into());
        }
        self.machine.transition(user.current_phase, Phase::PlanActive)?;

        let checkpoint_id = user
            .active_checkpoint_id
            .ok_or(PreconditionFailure::NoActiveCheckpoint)?;
        let mut checkpoint = self
            .stores
            .checkpoints
            .checkpoint(checkpoint_id)
            .await?
            .ok_or_else(|| PreconditionFailure::UnknownCheckpoint(checkpoint_id.to_string()))?;

        let transition = self
            .apply_transition(user, Phase::PlanActive, |s| {
                s.active_checkpoint_id = None;
            })
            .await?;
        if !transition.is_applied() {
            let checkpoint = self
                .stores
                .checkpoints
                .checkpoint(checkpoint_id)
                .await?
                .unwrap_or(checkpoint);
            return Ok(CheckpointClosure {
                checkpoint,
                snapshot: None,
                transition,
            });
        }

        let before = match checkpoint.before_snapshot_id {
            Some(id) => self.stores.snapshots.snapshot(id).await?.map(|s| s.score),
            None => None,
        };
        let snapshot = self
            .generate_snapshot(learner_id, SnapshotScope::Checkpoint)
            .await?;
        let change = delta(before.unwrap_or(0.0), snapshot.score);

        checkpoint.completed = true;
        checkpoint.readiness_delta = Some(change);
        checkpoint.completed_at = Some(snapshot.created_at);
        self.stores
            .checkpoints
            .update_checkpoint(checkpoint.clone())
            .await?;
        tracing::info!(
            learner = %learner_id,
            checkpoint = %checkpoint.id,
            "checkpoint closed: {:.2} -> {:.2} ({})",
            change.before,
            change.after,
            change.trend
        );

        Ok(CheckpointClosure {
            checkpoint,
            snapshot: Some(snapshot),
            transition,
        })
    }

    // -----------------------------------------------------------------------
    // Attempts and modules
    // -----------------------------------------------------------------------

    /// Grade and record an attempt, then update construct and skill state.
    pub async fn record_attempt(
        &self,
        submission: AttemptSubmission,
    ) -> Result<AttemptOutcome, EngineError> {
        let question = self
            .stores
            .questions
            .question(&submission.question_id)
            .await?
            .ok_or_else(|| PreconditionFailure::UnknownQuestion(submission.question_id.clone()))?;

        let attempt = Attempt {
            id: submission.attempt_id.unwrap_or_else(Uuid::new_v4),
            learner_id: submission.learner_id,
            question_id: question.id.clone(),
            skill_id: question.skill_id.clone(),
            is_correct: question.is_correct(&submission.user_answer),
            time_spent_sec: submission.time_spent_sec.max(0.0),
            construct_weights: question.construct_weights.clone(),
            context_type: submission.context_type,
            context_id: submission.context_id,
            module_id: submission.module_id,
            created_at: Utc::now(),
        };

        if let AppendOutcome::AlreadyRecorded {
            attempt: existing,
            applied,
        } = self.stores.attempts.append(attempt.clone()).await?
        {
            if applied {
                tracing::debug!(attempt = %existing.id, "duplicate attempt ignored");
            } else {
                // Logged earlier, but its derived updates did not all land.
                tracing::warn!(
                    learner = %existing.learner_id,
                    attempt = %existing.id,
                    "retried attempt was never applied, recomputing"
                );
                self.recompute_from_attempts(&existing.learner_id).await?;
            }
            return Ok(AttemptOutcome {
                attempt_id: existing.id,
                is_correct: existing.is_correct,
                duplicate: true,
            });
        }

        self.scorer
            .record(self.stores.constructs.as_ref(), &attempt)
            .await?;
        self.update_skill(&attempt).await?;
        self.stores.attempts.mark_applied(&[attempt.id]).await?;

        Ok(AttemptOutcome {
            attempt_id: attempt.id,
            is_correct: attempt.is_correct,
            duplicate: false,
        })
    }

    /// Record attempts one after another, in order.
    pub async fn record_attempts(
        &self,
        submissions: Vec<AttemptSubmission>,
    ) -> Result<Vec<AttemptOutcome>, EngineError> {
        let mut outcomes = Vec::with_capacity(submissions.len());
        for submission in submissions {
            outcomes.push(self.record_attempt(submission).await?);
        }
        Ok(outcomes)
    }

    async fn update_skill(&self, attempt: &Attempt) -> Result<(), EngineError> {
        let mut state = self
            .stores
            .skills
            .skill_state(&attempt.learner_id, &attempt.skill_id)
            .await?
            .unwrap_or_else(|| {
                SkillMasteryState::new(&attempt.learner_id, &attempt.skill_id, attempt.created_at)
            });
        state.apply(attempt, &self.config.mastery);
        tracing::debug!(
            learner = %attempt.learner_id,
            skill = %attempt.skill_id,
            "skill accuracy {:.1}% ({})",
            state.accuracy,
            state.mastery_level
        );
        self.stores.skills.put_skill_state(state).await?;
        Ok(())
    }

    /// Persist a module completion and advance the baseline when it is the
    /// last outstanding baseline module.
    pub async fn finalize_module(
        &self,
        request: ModuleCompletionRequest,
    ) -> Result<ModuleCompletionOutcome, EngineError> {
        let module = self
            .stores
            .modules
            .module(&request.module_id)
            .await?
            .ok_or_else(|| PreconditionFailure::UnknownModule(request.module_id.clone()))?;

        let learner_id = request.learner_id.clone();
        let completion = ModuleCompletion {
            learner_id: request.learner_id,
            module_id: request.module_id,
            score: request.score,
            total_questions: request.total_questions,
            correct_count: request.correct_count,
            started_at: request.started_at,
            completed_at: Utc::now(),
        };
        self.stores
            .modules
            .record_completion(completion.clone())
            .await?;

        let profile = self.construct_profile(&learner_id).await?;
        tracing::debug!(
            learner = %learner_id,
            module = %module.id,
            "partial profile: {:?}",
            profile.scores()
        );

        let is_baseline = module.kind == ModuleKind::Baseline
            && self.config.program.baseline_module_ids.contains(&module.id);
        let all_complete = if self.config.program.baseline_module_ids.is_empty() {
            false
        } else {
            self.baseline_status(&learner_id).await?.all_complete()
        };

        let user = self.user_state(&learner_id).await?;
        let (phase, snapshot) = if !is_baseline {
            (user.current_phase, None)
        } else if all_complete && user.current_phase == Phase::BaselineAssessmentInProgress {
            let (outcome, snapshot) = self.close_baseline(user).await?;
            (outcome.phase(), snapshot)
        } else {
            let snapshot = self
                .generate_snapshot(&learner_id, SnapshotScope::PartialBaseline)
                .await?;
            (user.current_phase, Some(snapshot))
        };

        let readiness_score = match snapshot {
            Some(snapshot) => snapshot.score,
            None => self.current_readiness(&learner_id).await?.score,
        };

        Ok(ModuleCompletionOutcome {
            success: true,
            completion,
            all_complete,
            readiness_score,
            phase,
        })
    }

    // -----------------------------------------------------------------------
    // Scores and snapshots
    // -----------------------------------------------------------------------

    pub async fn construct_profile(
        &self,
        learner_id: &str,
    ) -> Result<ConstructProfile, EngineError> {
        Ok(self
            .scorer
            .profile(self.stores.constructs.as_ref(), learner_id)
            .await?)
    }

    /// Constructs below the configured threshold, weakest first.
    pub async fn weak_constructs(
        &self,
        learner_id: &str,
    ) -> Result<Vec<ConstructState>, EngineError> {
        let profile = self.construct_profile(learner_id).await?;
        Ok(identify_weak_constructs(
            &profile,
            self.config.scoring.weak_construct_threshold,
        ))
    }

    pub async fn weak_skills(&self, learner_id: &str) -> Result<WeakSkills, EngineError> {
        Ok(self
            .selector
            .select_for(self.stores.skills.as_ref(), learner_id)
            .await?)
    }

    pub async fn skill_states(
        &self,
        learner_id: &str,
    ) -> Result<Vec<SkillMasteryState>, EngineError> {
        Ok(self.stores.skills.skill_states(learner_id).await?)
    }

    /// Readiness computed from current skill states, not persisted.
    pub async fn current_readiness(
        &self,
        learner_id: &str,
    ) -> Result<ReadinessResult, EngineError> {
        let skills = self.stores.skills.skill_states(learner_id).await?;
        Ok(self
            .calculator
            .from_skill_states(&skills, self.config.program.total_skill_count))
    }

    /// Compute and append a readiness snapshot.
    pub async fn generate_snapshot(
        &self,
        learner_id: &str,
        scope: SnapshotScope,
    ) -> Result<ReadinessSnapshot, EngineError> {
        let (skills, profile) = futures::try_join!(
            self.stores.skills.skill_states(learner_id),
            self.scorer.profile(self.stores.constructs.as_ref(), learner_id),
        )?;
        let result = self
            .calculator
            .from_skill_states(&skills, self.config.program.total_skill_count);

        let snapshot = ReadinessSnapshot {
            id: Uuid::new_v4(),
            learner_id: learner_id.to_string(),
            scope,
            metrics: result.metrics,
            score: result.score,
            grade: result.grade,
            construct_scores: profile.scores(),
            created_at: Utc::now(),
        };
        self.stores
            .snapshots
            .append_snapshot(snapshot.clone())
            .await?;
        tracing::info!(
            learner = %learner_id,
            "{scope} snapshot: {:.2} ({})",
            snapshot.score,
            snapshot.grade
        );
        Ok(snapshot)
    }

    pub async fn snapshot_history(
        &self,
        learner_id: &str,
    ) -> Result<Vec<ReadinessSnapshot>, EngineError> {
        Ok(self.stores.snapshots.snapshot_history(learner_id).await?)
    }

    // -----------------------------------------------------------------------
    // Checkpoints
    // -----------------------------------------------------------------------

    /// Checkpoint creation trigger.
    pub async fn create_checkpoint(
        &self,
        learner_id: &str,
    ) -> Result<CheckpointResponse, EngineError> {
        let checkpoint = self.build_checkpoint(learner_id).await?;
        Ok(CheckpointResponse::from(&checkpoint))
    }

    async fn build_checkpoint(&self, learner_id: &str) -> Result<RecycleCheckpoint, EngineError> {
        let mut rng = match self.config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.checkpoints.build(learner_id, &mut rng).await
    }

    /// The learner's remediation history, oldest first.
    pub async fn checkpoints(
        &self,
        learner_id: &str,
    ) -> Result<Vec<RecycleCheckpoint>, EngineError> {
        Ok(self.stores.checkpoints.checkpoints_for(learner_id).await?)
    }

    // -----------------------------------------------------------------------
    // Recovery
    // -----------------------------------------------------------------------

    /// Rebuild construct and skill state from the attempt log.
    pub async fn recompute_from_attempts(
        &self,
        learner_id: &str,
    ) -> Result<RecomputeSummary, EngineError> {
        let mut attempts = self.stores.attempts.attempts_for(learner_id).await?;
        attempts.sort_by_key(|a| a.created_at);

        let profile = self.scorer.replay(learner_id, &attempts);
        let skills = replay_skill_states(learner_id, &attempts, &self.config.mastery);

        futures::try_join!(
            self.stores
                .constructs
                .put_construct_states(learner_id, profile.states.clone()),
            self.stores
                .skills
                .replace_skill_states(learner_id, skills.clone()),
        )?;
        let ids: Vec<Uuid> = attempts.iter().map(|a| a.id).collect();
        self.stores.attempts.mark_applied(&ids).await?;

        tracing::info!(
            learner = %learner_id,
            "recomputed from {} attempts ({} skills)",
            attempts.len(),
            skills.len()
        );

        Ok(RecomputeSummary {
            attempts_replayed: attempts.len(),
            profile,
            skills,
        })
    }
}
