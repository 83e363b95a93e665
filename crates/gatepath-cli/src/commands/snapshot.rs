//! The `gatepath snapshot` command.

use std::path::PathBuf;

use anyhow::Result;

use gatepath_core::model::SnapshotScope;

use super::{print_json, surface, Session};

pub async fn execute(
    config: Option<PathBuf>,
    learner: String,
    scope: SnapshotScope,
    json: bool,
) -> Result<()> {
    let session = Session::open(config.as_deref())?;

    let snapshot = session
        .engine
        .generate_snapshot(&learner, scope)
        .await
        .map_err(surface)?;
    let current = session
        .engine
        .current_readiness(&learner)
        .await
        .map_err(surface)?;
    session.save().await?;

    if json {
        return print_json(&snapshot);
    }

    let m = &snapshot.metrics;
    println!("Readiness: {:.2} ({})", snapshot.score, snapshot.grade);
    println!(
        "  accuracy {:.1}  speed {:.1}  stability {:.1}  coverage {:.1}",
        m.accuracy, m.speed_index, m.stability, m.coverage
    );
    println!("\nRecommendations:");
    for rec in &current.recommendations {
        println!("  - {rec}");
    }
    Ok(())
}
