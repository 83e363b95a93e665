//! gatepath-core: progression state machine and scoring engine.
//!
//! This crate holds the learner phase machine, the construct scorer, the
//! readiness calculator, weak-skill selection and checkpoint construction,
//! plus the store traits they read and write through.

pub mod checkpoint;
pub mod construct;
pub mod engine;
pub mod error;
pub mod mastery;
pub mod model;
pub mod phase;
pub mod readiness;
pub mod traits;
