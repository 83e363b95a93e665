//! Learner progression phases and the transition graph.
//!
//! | Phase | Legal next phases |
//! |-------|-------------------|
//! | `ONBOARDING` | `BASELINE_ASSESSMENT_IN_PROGRESS` |
//! | `BASELINE_ASSESSMENT_IN_PROGRESS` | `BASELINE_COMPLETE` |
//! | `BASELINE_COMPLETE` | `PLAN_ACTIVE` |
//! | `PLAN_ACTIVE` | `RECYCLE_UNLOCKED` |
//! | `RECYCLE_UNLOCKED` | `RECYCLE_ASSESSMENT_IN_PROGRESS` |
//! | `RECYCLE_ASSESSMENT_IN_PROGRESS` | `PLAN_ACTIVE` |
//!
//! `ONBOARDING` is the only initial phase. There is no terminal phase: the
//! plan and recycle phases loop indefinitely.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigError, PhaseError, PreconditionFailure};

/// A discrete stage in the learner lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Onboarding,
    BaselineAssessmentInProgress,
    BaselineComplete,
    PlanActive,
    RecycleUnlocked,
    RecycleAssessmentInProgress,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Onboarding,
        Phase::BaselineAssessmentInProgress,
        Phase::BaselineComplete,
        Phase::PlanActive,
        Phase::RecycleUnlocked,
        Phase::RecycleAssessmentInProgress,
    ];

    pub const INITIAL: Phase = Phase::Onboarding;

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Onboarding => "ONBOARDING",
            Phase::BaselineAssessmentInProgress => "BASELINE_ASSESSMENT_IN_PROGRESS",
            Phase::BaselineComplete => "BASELINE_COMPLETE",
            Phase::PlanActive => "PLAN_ACTIVE",
            Phase::RecycleUnlocked => "RECYCLE_UNLOCKED",
            Phase::RecycleAssessmentInProgress => "RECYCLE_ASSESSMENT_IN_PROGRESS",
        }
    }

    /// Baseline access: the baseline assessment and every later phase.
    pub fn can_access_baseline(&self) -> bool {
        *self >= Phase::BaselineAssessmentInProgress
    }

    /// Baseline results are final.
    pub fn has_completed_baseline(&self) -> bool {
        *self >= Phase::BaselineComplete
    }

    /// Plan access: `PLAN_ACTIVE` and both recycle phases.
    pub fn can_access_plan(&self) -> bool {
        *self >= Phase::PlanActive
    }

    /// Recycle access: both recycle phases.
    pub fn can_access_recycle(&self) -> bool {
        *self >= Phase::RecycleUnlocked
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace('-', "_");
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| format!("unknown phase: {s}"))
    }
}

/// The fixed adjacency list.
pub const TRANSITIONS: &[(Phase, &[Phase])] = &[
    (Phase::Onboarding, &[Phase::BaselineAssessmentInProgress]),
    (
        Phase::BaselineAssessmentInProgress,
        &[Phase::BaselineComplete],
    ),
    (Phase::BaselineComplete, &[Phase::PlanActive]),
    (Phase::PlanActive, &[Phase::RecycleUnlocked]),
    (
        Phase::RecycleUnlocked,
        &[Phase::RecycleAssessmentInProgress],
    ),
    (Phase::RecycleAssessmentInProgress, &[Phase::PlanActive]),
];

/// A validated transition graph.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    edges: BTreeMap<Phase, BTreeSet<Phase>>,
}

impl TransitionTable {
    /// The standard table built from [`TRANSITIONS`].
    pub fn standard() -> Result<Self, ConfigError> {
        Self::from_edges(TRANSITIONS)
    }

    /// Build and validate a table.
    ///
    /// Every phase must be declared exactly once with at least one next
    /// phase, nothing may lead back into the initial phase, and every phase
    /// must be reachable from it.
    pub fn from_edges(edges: &[(Phase, &[Phase])]) -> Result<Self, ConfigError> {
        let mut map: BTreeMap<Phase, BTreeSet<Phase>> = BTreeMap::new();
        for (from, targets) in edges {
            if map.contains_key(from) {
                return Err(ConfigError::InvalidTransitionTable(format!(
                    "{from} declared more than once"
                )));
            }
            map.insert(*from, targets.iter().copied().collect());
        }

        for phase in Phase::ALL {
            match map.get(&phase) {
                None => {
                    return Err(ConfigError::InvalidTransitionTable(format!(
                        "{phase} has no entry"
                    )))
                }
                Some(next) if next.is_empty() => {
                    return Err(ConfigError::InvalidTransitionTable(format!(
                        "{phase} has no outgoing transition"
                    )))
                }
                Some(_) => {}
            }
        }

        for (from, targets) in &map {
            for to in targets {
                if !map.contains_key(to) {
                    return Err(ConfigError::InvalidTransitionTable(format!(
                        "{from} -> {to}: target is not declared"
                    )));
                }
                if *to == Phase::INITIAL {
                    return Err(ConfigError::InvalidTransitionTable(format!(
                        "{from} -> {to}: initial phase cannot be re-entered"
                    )));
                }
            }
        }

        let table = Self { edges: map };
        let reachable = table.reachable_from(Phase::INITIAL);
        if let Some(orphan) = Phase::ALL.into_iter().find(|p| !reachable.contains(p)) {
            return Err(ConfigError::InvalidTransitionTable(format!(
                "{orphan} is unreachable from {}",
                Phase::INITIAL
            )));
        }

        Ok(table)
    }

    pub fn is_legal(&self, from: Phase, to: Phase) -> bool {
        self.edges.get(&from).is_some_and(|next| next.contains(&to))
    }

    pub fn next_phases(&self, from: Phase) -> impl Iterator<Item = Phase> + '_ {
        self.edges.get(&from).into_iter().flatten().copied()
    }

    /// All phases reachable from `start`, including `start`.
    pub fn reachable_from(&self, start: Phase) -> BTreeSet<Phase> {
        let mut seen = BTreeSet::from([start]);
        let mut stack = vec![start];
        while let Some(phase) = stack.pop() {
            for next in self.next_phases(phase) {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        seen
    }
}

/// Validates phase changes against the transition table.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    table: TransitionTable,
}

impl PhaseMachine {
    /// A machine over the standard table, validated at construction.
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self::with_table(TransitionTable::standard()?))
    }

    pub fn with_table(table: TransitionTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// `true` only if `target` is in the adjacency list for `current`.
    pub fn can_transition(&self, current: Phase, target: Phase) -> bool {
        self.table.is_legal(current, target)
    }

    /// Validate a transition, returning the new phase.
    pub fn transition(&self, current: Phase, target: Phase) -> Result<Phase, PhaseError> {
        if self.can_transition(current, target) {
            Ok(target)
        } else {
            Err(PhaseError::InvalidTransition {
                from: current,
                to: target,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Persistent learner state
// ---------------------------------------------------------------------------

/// One applied phase change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
    pub at: DateTime<Utc>,
}

/// The phase machine's record for one learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserState {
    pub learner_id: String,
    pub current_phase: Phase,
    /// Most recent entry time per phase.
    #[serde(default)]
    pub phase_entered_at: BTreeMap<Phase, DateTime<Utc>>,
    #[serde(default)]
    pub history: Vec<PhaseTransition>,
    #[serde(default)]
    pub active_baseline_module: Option<String>,
    #[serde(default)]
    pub active_cycle_id: Option<String>,
    #[serde(default)]
    pub active_checkpoint_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl UserState {
    /// A fresh learner in the initial phase.
    pub fn new(learner_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            learner_id: learner_id.to_string(),
            current_phase: Phase::INITIAL,
            phase_entered_at: BTreeMap::from([(Phase::INITIAL, now)]),
            history: Vec::new(),
            active_baseline_module: None,
            active_cycle_id: None,
            active_checkpoint_id: None,
            updated_at: now,
        }
    }

    /// Move to `to`, stamping entry time and history.
    ///
    /// Callers validate the edge with [`PhaseMachine::transition`] first.
    pub fn enter(&mut self, to: Phase, at: DateTime<Utc>) {
        self.history.push(PhaseTransition {
            from: self.current_phase,
            to,
            at,
        });
        self.current_phase = to;
        self.phase_entered_at.insert(to, at);
        self.updated_at = at;
    }

    pub fn gates(&self) -> PhaseGates {
        PhaseGates::for_phase(self.current_phase)
    }
}

/// The gating predicates routing collaborators read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseGates {
    pub phase: Phase,
    pub can_access_baseline: bool,
    pub has_completed_baseline: bool,
    pub can_access_plan: bool,
    pub can_access_recycle: bool,
}

impl PhaseGates {
    pub fn for_phase(phase: Phase) -> Self {
        Self {
            phase,
            can_access_baseline: phase.can_access_baseline(),
            has_completed_baseline: phase.has_completed_baseline(),
            can_access_plan: phase.can_access_plan(),
            can_access_recycle: phase.can_access_recycle(),
        }
    }
}

// ---------------------------------------------------------------------------
// Baseline gate
// ---------------------------------------------------------------------------

/// Completion state of the configured baseline module set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineStatus {
    pub configured: Vec<String>,
    pub completed: Vec<String>,
    /// Configured modules without a completion, including modules that no
    /// longer exist.
    pub missing: Vec<String>,
}

impl BaselineStatus {
    pub fn all_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// All-of gate over the configured baseline modules.
///
/// Evaluated against the current configuration on every call. A configured
/// module absent from `existing` counts as incomplete even when a stale
/// completion for it is on record.
pub fn evaluate_baseline_gate(
    configured: &[String],
    completed: &BTreeSet<String>,
    existing: &BTreeSet<String>,
) -> Result<BaselineStatus, PreconditionFailure> {
    if configured.is_empty() {
        return Err(PreconditionFailure::NoBaselineModules);
    }

    let mut done = Vec::new();
    let mut missing = Vec::new();
    for module_id in configured {
        if !existing.contains(module_id) {
            tracing::warn!("configured baseline module '{module_id}' does not exist");
            missing.push(module_id.clone());
        } else if completed.contains(module_id) {
            done.push(module_id.clone());
        } else {
            missing.push(module_id.clone());
        }
    }

    Ok(BaselineStatus {
        configured: configured.to_vec(),
        completed: done,
        missing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn standard_table_is_valid() {
        let table = TransitionTable::standard().unwrap();
        assert_eq!(
            table.reachable_from(Phase::INITIAL).len(),
            Phase::ALL.len()
        );
    }

    #[test]
    fn only_declared_edges_are_legal() {
        let machine = PhaseMachine::new().unwrap();
        for from in Phase::ALL {
            for to in Phase::ALL {
                let declared = TRANSITIONS
                    .iter()
                    .any(|(f, next)| *f == from && next.contains(&to));
                assert_eq!(machine.can_transition(from, to), declared, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn skipping_phases_is_rejected() {
        let machine = PhaseMachine::new().unwrap();
        let err = machine
            .transition(Phase::Onboarding, Phase::PlanActive)
            .unwrap_err();
        assert_eq!(
            err,
            PhaseError::InvalidTransition {
                from: Phase::Onboarding,
                to: Phase::PlanActive
            }
        );
        assert!(machine.transition(Phase::PlanActive, Phase::Onboarding).is_err());
    }

    #[test]
    fn recycle_loop_closes() {
        let machine = PhaseMachine::new().unwrap();
        let mut phase = Phase::PlanActive;
        for _ in 0..3 {
            phase = machine.transition(phase, Phase::RecycleUnlocked).unwrap();
            phase = machine
                .transition(phase, Phase::RecycleAssessmentInProgress)
                .unwrap();
            phase = machine.transition(phase, Phase::PlanActive).unwrap();
        }
        assert_eq!(phase, Phase::PlanActive);
    }

    #[test]
    fn table_rejects_undeclared_target() {
        let edges: &[(Phase, &[Phase])] = &[
            (Phase::Onboarding, &[Phase::BaselineAssessmentInProgress]),
            (Phase::BaselineAssessmentInProgress, &[Phase::BaselineComplete]),
        ];
        assert!(matches!(
            TransitionTable::from_edges(edges),
            Err(ConfigError::InvalidTransitionTable(_))
        ));
    }

    #[test]
    fn table_rejects_reentering_initial() {
        let mut edges: Vec<(Phase, &[Phase])> = TRANSITIONS.to_vec();
        edges[5] = (Phase::RecycleAssessmentInProgress, &[Phase::Onboarding][..]);
        assert!(TransitionTable::from_edges(&edges).is_err());
    }

    #[test]
    fn gates_are_inclusive_of_downstream_phases() {
        assert!(!Phase::Onboarding.can_access_baseline());
        assert!(Phase::BaselineAssessmentInProgress.can_access_baseline());
        assert!(!Phase::BaselineComplete.can_access_plan());
        for phase in [
            Phase::PlanActive,
            Phase::RecycleUnlocked,
            Phase::RecycleAssessmentInProgress,
        ] {
            assert!(phase.can_access_plan());
            assert!(phase.has_completed_baseline());
        }
        assert!(!Phase::PlanActive.can_access_recycle());
        assert!(Phase::RecycleUnlocked.can_access_recycle());
        assert!(Phase::RecycleAssessmentInProgress.can_access_recycle());
    }

    #[test]
    fn phase_parse_and_serde() {
        assert_eq!("plan-active".parse::<Phase>().unwrap(), Phase::PlanActive);
        assert_eq!(
            serde_json::to_string(&Phase::RecycleUnlocked).unwrap(),
            "\"RECYCLE_UNLOCKED\""
        );
        assert!("GRADUATED".parse::<Phase>().is_err());
    }

    #[test]
    fn user_state_records_history() {
        let now = Utc::now();
        let mut state = UserState::new("u1", now);
        state.enter(Phase::BaselineAssessmentInProgress, now);
        assert_eq!(state.current_phase, Phase::BaselineAssessmentInProgress);
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].from, Phase::Onboarding);
        assert!(state
            .phase_entered_at
            .contains_key(&Phase::BaselineAssessmentInProgress));
    }

    #[test]
    fn baseline_gate_is_all_of() {
        let configured = ids(&["m1", "m2"]);
        let existing = set(&["m1", "m2"]);

        let status = evaluate_baseline_gate(&configured, &set(&["m1"]), &existing).unwrap();
        assert!(!status.all_complete());
        assert_eq!(status.missing, ids(&["m2"]));

        let status =
            evaluate_baseline_gate(&configured, &set(&["m1", "m2", "m9"]), &existing).unwrap();
        assert!(status.all_complete());
    }

    #[test]
    fn baseline_gate_treats_missing_module_as_incomplete() {
        let configured = ids(&["m1", "gone"]);
        let status =
            evaluate_baseline_gate(&configured, &set(&["m1", "gone"]), &set(&["m1"])).unwrap();
        assert!(!status.all_complete());
        assert_eq!(status.missing, ids(&["gone"]));
    }

    #[test]
    fn baseline_gate_requires_configuration() {
        assert_eq!(
            evaluate_baseline_gate(&[], &BTreeSet::new(), &BTreeSet::new()).unwrap_err(),
            PreconditionFailure::NoBaselineModules
        );
    }
}
