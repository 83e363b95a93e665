//! The `gatepath recompute` command.

use std::path::PathBuf;

use anyhow::Result;

use super::{print_json, surface, Session};

pub async fn execute(config: Option<PathBuf>, learner: String, json: bool) -> Result<()> {
    let session = Session::open(config.as_deref())?;

    let summary = session
        .engine
        .recompute_from_attempts(&learner)
        .await
        .map_err(surface)?;
    session.save().await?;

    if json {
        return print_json(&summary);
    }

    println!(
        "Replayed {} attempts into {} skill states",
        summary.attempts_replayed,
        summary.skills.len()
    );
    Ok(())
}
