//! Error taxonomy for the progression core.
//!
//! Four families are kept apart so callers can render a specific message:
//! precondition failures, illegal phase transitions, upstream store
//! failures, and configuration errors detected at startup.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::phase::Phase;

/// Failures reported by the persistence collaborator.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store returned data that could not be interpreted.
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Recoverable, user-facing failures of write-triggering operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionFailure {
    #[error("No active cycle")]
    NoActiveCycle,

    #[error("No weak skills found")]
    NoWeakSkills,

    #[error("No questions available")]
    NoQuestionsAvailable,

    #[error("No baseline modules configured")]
    NoBaselineModules,

    /// Some configured baseline modules have no completion yet.
    #[error("Baseline incomplete: {remaining} module(s) remaining")]
    BaselineIncomplete { remaining: usize },

    #[error("No readiness snapshot recorded")]
    NoReadinessSnapshot,

    #[error("No active checkpoint")]
    NoActiveCheckpoint,

    #[error("Unknown question: {0}")]
    UnknownQuestion(String),

    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Unknown checkpoint: {0}")]
    UnknownCheckpoint(String),
}

/// A requested phase change that is not in the adjacency table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PhaseError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: Phase, to: Phase },
}

/// Configuration rejected at startup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("readiness weights must sum to 1.0, got {sum}")]
    WeightsDoNotSumToOne { sum: f64 },

    #[error("invalid transition table: {0}")]
    InvalidTransitionTable(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Umbrella error returned by [`crate::engine::ProgressEngine`] operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Precondition(#[from] PreconditionFailure),

    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Serialized error body handed back to callers of the trigger operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl EngineError {
    /// Returns `true` for failures the learner can act on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::Precondition(_) | EngineError::Phase(_))
    }

    /// The message safe to show to an end user.
    ///
    /// Store and configuration failures collapse to a generic message; the
    /// detail is only logged.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::Precondition(p) => p.to_string(),
            EngineError::Phase(p) => p.to_string(),
            EngineError::Store(_) | EngineError::Config(_) => "Internal error".to_string(),
        }
    }

    /// HTTP-style status code for the error body.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::Precondition(
                PreconditionFailure::UnknownQuestion(_)
                | PreconditionFailure::UnknownModule(_)
                | PreconditionFailure::UnknownCheckpoint(_),
            ) => 404,
            EngineError::Precondition(_) => 400,
            EngineError::Phase(_) => 409,
            EngineError::Store(_) | EngineError::Config(_) => 500,
        }
    }

    /// Render the error as a body, logging upstream detail server-side.
    pub fn to_body(&self) -> ErrorBody {
        if !self.is_recoverable() {
            tracing::error!("upstream failure: {self:#}");
        }
        ErrorBody {
            error: self.user_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_messages_are_verbatim() {
        let err = EngineError::from(PreconditionFailure::NoActiveCycle);
        assert_eq!(err.user_message(), "No active cycle");
        assert_eq!(err.status_code(), 400);
        assert!(err.is_recoverable());

        let err = EngineError::from(PreconditionFailure::NoQuestionsAvailable);
        assert_eq!(err.to_body().error, "No questions available");
    }

    #[test]
    fn store_errors_hide_internals() {
        let err = EngineError::from(StoreError::Unavailable(
            "connection refused on 10.0.0.3".into(),
        ));
        assert_eq!(err.user_message(), "Internal error");
        assert_eq!(err.status_code(), 500);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn invalid_transition_is_conflict() {
        let err = EngineError::from(PhaseError::InvalidTransition {
            from: Phase::Onboarding,
            to: Phase::PlanActive,
        });
        assert_eq!(err.status_code(), 409);
        assert_eq!(
            err.user_message(),
            "invalid transition from ONBOARDING to PLAN_ACTIVE"
        );
    }
}
