//! The `gatepath init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    if Path::new("gatepath.toml").exists() {
        println!("gatepath.toml already exists, skipping.");
    } else {
        std::fs::write("gatepath.toml", SAMPLE_CONFIG)?;
        println!("Created gatepath.toml");
    }

    let bank_path = Path::new("bank.toml");
    if bank_path.exists() {
        println!("bank.toml already exists, skipping.");
    } else {
        std::fs::write(bank_path, SAMPLE_BANK)?;
        println!("Created bank.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: gatepath import --bank bank.toml");
    println!("  2. Run: gatepath phase start-baseline --learner alice");
    println!("  3. Record answers with: gatepath attempt --learner alice --question frac-1 --answer B");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# gatepath configuration

data_path = "gatepath-data.json"

[program]
baseline_module_ids = ["baseline-quant", "baseline-verbal"]
total_skill_count = 4

[scoring]
learning_rate = 0.1
weak_construct_threshold = 60.0

[readiness]
accuracy = 0.40
speed_index = 0.25
stability = 0.20
coverage = 0.15

[checkpoint]
fetch_limit = 60
target_size = 20
"#;

const SAMPLE_BANK: &str = r#"# Question bank: questions carry an answer key, a skill and construct weights.

[[questions]]
id = "frac-1"
skill_id = "fractions"
correct_answer = "B"
constructs = { computation = 0.7, teliti = 0.3 }

[[questions]]
id = "frac-2"
skill_id = "fractions"
correct_answer = "D"
constructs = { computation = 0.6, reasoning = 0.4 }

[[questions]]
id = "frac-3"
skill_id = "fractions"
correct_answer = "A"
constructs = { computation = 0.8, speed = 0.2 }

[[questions]]
id = "pct-1"
skill_id = "percentages"
correct_answer = "C"
constructs = { computation = 0.5, teliti = 0.5 }

[[questions]]
id = "pct-2"
skill_id = "percentages"
correct_answer = "B"
constructs = { reasoning = 0.6, computation = 0.4 }

[[questions]]
id = "idea-1"
skill_id = "main_idea"
correct_answer = "A"
constructs = { reading = 1.0 }

[[questions]]
id = "idea-2"
skill_id = "main_idea"
correct_answer = "C"
constructs = { reading = 0.7, speed = 0.3 }

[[questions]]
id = "inf-1"
skill_id = "inference"
correct_answer = "D"
constructs = { reading = 0.5, reasoning = 0.5 }

[[modules]]
id = "baseline-quant"
kind = "baseline"
question_ids = ["frac-1", "frac-2", "pct-1"]

[[modules]]
id = "baseline-verbal"
kind = "baseline"
question_ids = ["idea-1", "inf-1"]

[[modules]]
id = "drill-fractions"
kind = "drill"
question_ids = ["frac-1", "frac-2", "frac-3"]
"#;
