//! The `gatepath checkpoint` command.

use std::path::PathBuf;

use anyhow::Result;

use super::{print_json, surface, Session};

pub async fn execute(config: Option<PathBuf>, learner: String, json: bool) -> Result<()> {
    let session = Session::open(config.as_deref())?;

    let response = session
        .engine
        .create_checkpoint(&learner)
        .await
        .map_err(surface)?;
    session.save().await?;

    if json {
        return print_json(&response);
    }

    println!(
        "Created checkpoint {} with {} questions targeting {} weak skill(s)",
        response.checkpoint_id, response.question_count, response.weak_skills_targeted
    );
    println!("Module: {}", response.module_id);
    Ok(())
}
