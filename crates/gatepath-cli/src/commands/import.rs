//! The `gatepath import` command.

use std::path::PathBuf;

use anyhow::Result;

use gatepath_store::{load_bank, validate_bank};

use super::{print_json, Session};

pub async fn execute(config: Option<PathBuf>, bank_path: PathBuf, json: bool) -> Result<()> {
    let session = Session::open(config.as_deref())?;
    let bank = load_bank(&bank_path)?;

    for warning in validate_bank(&bank) {
        eprintln!("  warning [{}]: {}", warning.item_id, warning.message);
    }

    let (questions, modules) = session.store.seed(bank).await;
    session.save().await?;

    if json {
        print_json(&serde_json::json!({ "questions": questions, "modules": modules }))?;
    } else {
        println!(
            "Imported {questions} questions and {modules} modules into {}",
            session.config.data_path.display()
        );
    }
    Ok(())
}
