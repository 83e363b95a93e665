//! The `gatepath phase` command family.

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use gatepath_core::engine::TransitionOutcome;

use super::{print_json, surface, Session};

#[derive(Subcommand)]
pub enum PhaseAction {
    /// Show the current phase, gates and baseline progress
    Show {
        #[arg(long)]
        learner: String,
    },
    /// Enter the baseline assessment
    StartBaseline {
        #[arg(long)]
        learner: String,
    },
    /// Open a learning cycle once the baseline is complete
    ActivatePlan {
        #[arg(long)]
        learner: String,

        #[arg(long)]
        cycle: String,
    },
    /// Unlock recycle assessments
    UnlockRecycle {
        #[arg(long)]
        learner: String,
    },
    /// Build a checkpoint and enter the recycle assessment
    StartRecycle {
        #[arg(long)]
        learner: String,
    },
    /// Close the active checkpoint and return to the plan
    CompleteCheckpoint {
        #[arg(long)]
        learner: String,
    },
}

pub async fn execute(config: Option<PathBuf>, action: PhaseAction, json: bool) -> Result<()> {
    let session = Session::open(config.as_deref())?;
    let engine = &session.engine;

    match action {
        PhaseAction::Show { learner } => show(&session, &learner, json).await?,
        PhaseAction::StartBaseline { learner } => {
            let outcome = engine.start_baseline(&learner).await.map_err(surface)?;
            report(&outcome, json)?;
        }
        PhaseAction::ActivatePlan { learner, cycle } => {
            let outcome = engine
                .activate_plan(&learner, &cycle)
                .await
                .map_err(surface)?;
            report(&outcome, json)?;
        }
        PhaseAction::UnlockRecycle { learner } => {
            let outcome = engine.unlock_recycle(&learner).await.map_err(surface)?;
            report(&outcome, json)?;
        }
        PhaseAction::StartRecycle { learner } => {
            let start = engine.start_recycle(&learner).await.map_err(surface)?;
            if json {
                print_json(&start)?;
            } else {
                report(&start.transition, false)?;
                println!(
                    "Checkpoint {} ({} questions, module {})",
                    start.checkpoint.checkpoint_id,
                    start.checkpoint.question_count,
                    start.checkpoint.module_id
                );
            }
        }
        PhaseAction::CompleteCheckpoint { learner } => {
            let closure = engine.complete_checkpoint(&learner).await.map_err(surface)?;
            if json {
                print_json(&closure)?;
            } else {
                report(&closure.transition, false)?;
                if let Some(delta) = closure.checkpoint.readiness_delta {
                    println!(
                        "Checkpoint #{}: readiness {:.2} -> {:.2} ({:+.2}, {})",
                        closure.checkpoint.checkpoint_number,
                        delta.before,
                        delta.after,
                        delta.delta,
                        delta.trend
                    );
                }
            }
        }
    }

    session.save().await
}

async fn show(session: &Session, learner: &str, json: bool) -> Result<()> {
    let state = session.engine.user_state(learner).await.map_err(surface)?;
    let gates = state.gates();

    if json {
        return print_json(&serde_json::json!({ "state": state, "gates": gates }));
    }

    println!("Learner: {learner}");
    println!("Phase: {}", state.current_phase);
    println!("  can access baseline:   {}", gates.can_access_baseline);
    println!("  has completed baseline: {}", gates.has_completed_baseline);
    println!("  can access plan:       {}", gates.can_access_plan);
    println!("  can access recycle:    {}", gates.can_access_recycle);
    if let Some(cycle) = &state.active_cycle_id {
        println!("Active cycle: {cycle}");
    }
    if let Some(checkpoint) = &state.active_checkpoint_id {
        println!("Active checkpoint: {checkpoint}");
    }

    if !session.config.program.baseline_module_ids.is_empty() {
        let status = session
            .engine
            .baseline_status(learner)
            .await
            .map_err(surface)?;
        println!(
            "Baseline: {}/{} modules complete",
            status.completed.len(),
            status.configured.len()
        );
        for missing in &status.missing {
            println!("  missing: {missing}");
        }
    }
    Ok(())
}

fn report(outcome: &TransitionOutcome, json: bool) -> Result<()> {
    if json {
        return print_json(outcome);
    }
    match outcome {
        TransitionOutcome::Applied { state } => println!("Phase: {}", state.current_phase),
        TransitionOutcome::Superseded { observed } => {
            println!("Another request changed the phase first; phase is now {observed}")
        }
    }
    Ok(())
}
