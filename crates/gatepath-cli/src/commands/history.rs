//! The `gatepath history` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use super::{print_json, surface, Session};

pub async fn execute(config: Option<PathBuf>, learner: String, json: bool) -> Result<()> {
    let session = Session::open(config.as_deref())?;

    let snapshots = session
        .engine
        .snapshot_history(&learner)
        .await
        .map_err(surface)?;
    let checkpoints = session.engine.checkpoints(&learner).await.map_err(surface)?;

    if json {
        return print_json(&serde_json::json!({
            "snapshots": snapshots,
            "checkpoints": checkpoints,
        }));
    }

    if snapshots.is_empty() {
        println!("No snapshots recorded.");
    } else {
        let mut table = Table::new();
        table.set_header(vec![
            "Taken", "Scope", "Score", "Grade", "Accuracy", "Speed", "Stability", "Coverage",
        ]);
        for s in &snapshots {
            table.add_row(vec![
                Cell::new(s.created_at.format("%Y-%m-%d %H:%M")),
                Cell::new(s.scope),
                Cell::new(format!("{:.2}", s.score)),
                Cell::new(s.grade),
                Cell::new(format!("{:.1}", s.metrics.accuracy)),
                Cell::new(format!("{:.1}", s.metrics.speed_index)),
                Cell::new(format!("{:.1}", s.metrics.stability)),
                Cell::new(format!("{:.1}", s.metrics.coverage)),
            ]);
        }
        println!("{table}");
    }

    if !checkpoints.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["#", "Cycle", "Questions", "Weak skills", "Delta"]);
        for c in &checkpoints {
            let delta = match &c.readiness_delta {
                Some(d) => format!("{:+.2} ({})", d.delta, d.trend),
                None => "open".to_string(),
            };
            table.add_row(vec![
                Cell::new(c.checkpoint_number),
                Cell::new(&c.cycle_id),
                Cell::new(c.question_count),
                Cell::new(c.weak_skills.join(", ")),
                Cell::new(delta),
            ]);
        }
        println!("\n{table}");
    }
    Ok(())
}
