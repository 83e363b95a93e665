//! The `gatepath attempt` command.

use std::path::PathBuf;

use anyhow::Result;
use uuid::Uuid;

use gatepath_core::engine::AttemptSubmission;
use gatepath_core::model::ContextType;

use super::{print_json, surface, Session};

pub struct AttemptArgs {
    pub learner: String,
    pub question: String,
    pub answer: String,
    pub time_spent: f64,
    pub context: ContextType,
    pub context_id: Option<String>,
    pub module: Option<String>,
    pub id: Option<Uuid>,
}

pub async fn execute(config: Option<PathBuf>, args: AttemptArgs, json: bool) -> Result<()> {
    let session = Session::open(config.as_deref())?;

    let outcome = session
        .engine
        .record_attempt(AttemptSubmission {
            learner_id: args.learner,
            attempt_id: args.id,
            question_id: args.question,
            user_answer: args.answer,
            time_spent_sec: args.time_spent,
            context_type: args.context,
            context_id: args.context_id,
            module_id: args.module,
        })
        .await
        .map_err(surface)?;
    session.save().await?;

    if json {
        return print_json(&outcome);
    }

    if outcome.duplicate {
        println!("Attempt {} already recorded, nothing changed", outcome.attempt_id);
    } else {
        let verdict = if outcome.is_correct {
            "correct"
        } else {
            "incorrect"
        };
        println!("Recorded attempt {}: {verdict}", outcome.attempt_id);
    }
    Ok(())
}
