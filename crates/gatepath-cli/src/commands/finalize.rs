//! The `gatepath finalize` command.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;

use gatepath_core::engine::ModuleCompletionRequest;

use super::{print_json, surface, Session};

pub async fn execute(
    config: Option<PathBuf>,
    learner: String,
    module: String,
    score: f64,
    total: u32,
    correct: u32,
    json: bool,
) -> Result<()> {
    if correct > total {
        anyhow::bail!("--correct ({correct}) cannot exceed --total ({total})");
    }
    let session = Session::open(config.as_deref())?;

    let outcome = session
        .engine
        .finalize_module(ModuleCompletionRequest {
            learner_id: learner,
            module_id: module,
            score,
            total_questions: total,
            correct_count: correct,
            started_at: Utc::now(),
        })
        .await
        .map_err(surface)?;
    session.save().await?;

    if json {
        return print_json(&outcome);
    }

    println!(
        "Completed {} ({}/{} correct)",
        outcome.completion.module_id,
        outcome.completion.correct_count,
        outcome.completion.total_questions
    );
    println!("Readiness: {:.2}", outcome.readiness_score);
    println!("Phase: {}", outcome.phase);
    if outcome.all_complete {
        println!("All baseline modules complete");
    }
    Ok(())
}
