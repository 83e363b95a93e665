//! The `gatepath profile` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use gatepath_core::mastery::WeakSkills;

use super::{print_json, surface, Session};

pub async fn execute(config: Option<PathBuf>, learner: String, json: bool) -> Result<()> {
    let session = Session::open(config.as_deref())?;

    let profile = session
        .engine
        .construct_profile(&learner)
        .await
        .map_err(surface)?;
    let weak = session.engine.weak_skills(&learner).await.map_err(surface)?;
    let skills = session
        .engine
        .skill_states(&learner)
        .await
        .map_err(surface)?;

    if json {
        return print_json(&serde_json::json!({
            "constructs": profile.states,
            "skills": skills,
            "weak_skills": weak,
        }));
    }

    let mut constructs = Table::new();
    constructs.set_header(vec!["Construct", "Score", "Confidence", "Trend", "Data points"]);
    for state in &profile.states {
        constructs.add_row(vec![
            Cell::new(state.construct),
            Cell::new(format!("{:.1}", state.score)),
            Cell::new(format!("{:.0}%", state.confidence)),
            Cell::new(state.trend),
            Cell::new(state.data_points),
        ]);
    }
    println!("{constructs}");

    if skills.is_empty() {
        println!("\nNo skills attempted yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Skill",
        "Attempts",
        "Accuracy",
        "Speed",
        "Stability",
        "Level",
    ]);
    for skill in &skills {
        table.add_row(vec![
            Cell::new(&skill.skill_id),
            Cell::new(skill.attempts),
            Cell::new(format!("{:.1}%", skill.accuracy)),
            Cell::new(format!("{:.1}", skill.speed_index)),
            Cell::new(format!("{:.1}", skill.stability)),
            Cell::new(skill.mastery_level),
        ]);
    }
    println!("\n{table}");

    match weak {
        WeakSkills::None => println!("\nNo weak skills."),
        WeakSkills::Found(ids) => println!("\nWeak skills: {}", ids.join(", ")),
    }
    Ok(())
}
