//! Question bank loading.
//!
//! A bank is a TOML file of questions and modules that seeds the store.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Deserialize;

use gatepath_core::model::{Construct, ConstructWeights, Module, ModuleKind, Question};

#[derive(Debug, Deserialize)]
struct TomlBankFile {
    #[serde(default)]
    questions: Vec<TomlQuestion>,
    #[serde(default)]
    modules: Vec<TomlModule>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    skill_id: String,
    correct_answer: String,
    #[serde(default)]
    constructs: BTreeMap<String, f64>,
    #[serde(default = "default_true")]
    published: bool,
}

#[derive(Debug, Deserialize)]
struct TomlModule {
    id: String,
    kind: String,
    #[serde(default)]
    question_ids: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Questions and modules ready to seed a store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionBank {
    pub questions: Vec<Question>,
    pub modules: Vec<Module>,
}

/// Parse a bank file from disk.
pub fn load_bank(path: &Path) -> Result<QuestionBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question bank: {}", path.display()))?;
    parse_bank_str(&content, path)
}

/// Parse a bank from a TOML string.
pub fn parse_bank_str(content: &str, source_path: &Path) -> Result<QuestionBank> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| -> Result<Question> {
            let mut weights = ConstructWeights::new();
            for (name, weight) in q.constructs {
                let construct: Construct = name
                    .parse()
                    .map_err(|e: String| anyhow::anyhow!("question {}: {}", q.id, e))?;
                if !(0.0..=1.0).contains(&weight) {
                    anyhow::bail!(
                        "question {}: weight for {construct} must be in [0, 1], got {weight}",
                        q.id
                    );
                }
                weights = weights.with(construct, weight);
            }
            Ok(Question {
                id: q.id,
                skill_id: q.skill_id,
                correct_answer: q.correct_answer,
                construct_weights: weights,
                published: q.published,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let now = Utc::now();
    let modules = parsed
        .modules
        .into_iter()
        .map(|m| -> Result<Module> {
            let kind = parse_kind(&m.kind).with_context(|| format!("module {}", m.id))?;
            Ok(Module {
                id: m.id,
                kind,
                question_ids: m.question_ids,
                created_at: now,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QuestionBank { questions, modules })
}

fn parse_kind(s: &str) -> Result<ModuleKind> {
    match s.to_lowercase().as_str() {
        "baseline" => Ok(ModuleKind::Baseline),
        "drill" => Ok(ModuleKind::Drill),
        "mock" => Ok(ModuleKind::Mock),
        "checkpoint" => Ok(ModuleKind::Checkpoint),
        other => anyhow::bail!("unknown module kind: {other}"),
    }
}

/// A problem found in a bank that does not stop it loading.
#[derive(Debug, Clone)]
pub struct BankWarning {
    pub item_id: String,
    pub message: String,
}

/// Check a bank for duplicate ids and dangling references.
pub fn validate_bank(bank: &QuestionBank) -> Vec<BankWarning> {
    let mut warnings = Vec::new();

    let mut seen = HashSet::new();
    for q in &bank.questions {
        if !seen.insert(q.id.as_str()) {
            warnings.push(BankWarning {
                item_id: q.id.clone(),
                message: format!("duplicate question ID: {}", q.id),
            });
        }
        if q.construct_weights.nonzero().next().is_none() {
            warnings.push(BankWarning {
                item_id: q.id.clone(),
                message: "no construct weights; attempts will not move constructs".into(),
            });
        }
    }

    let mut seen_modules = HashSet::new();
    for m in &bank.modules {
        if !seen_modules.insert(m.id.as_str()) {
            warnings.push(BankWarning {
                item_id: m.id.clone(),
                message: format!("duplicate module ID: {}", m.id),
            });
        }
        for qid in &m.question_ids {
            if !seen.contains(qid.as_str()) {
                warnings.push(BankWarning {
                    item_id: m.id.clone(),
                    message: format!("references unknown question {qid}"),
                });
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    const VALID_BANK: &str = r#"
[[questions]]
id = "q-frac-1"
skill_id = "fractions"
correct_answer = "B"
constructs = { teliti = 0.6, computation = 0.4 }

[[questions]]
id = "q-read-1"
skill_id = "main_idea"
correct_answer = "D"
constructs = { reading = 1.0 }
published = false

[[modules]]
id = "baseline-quant"
kind = "baseline"
question_ids = ["q-frac-1"]
"#;

    #[test]
    fn parse_valid_bank() {
        let bank = parse_bank_str(VALID_BANK, &PathBuf::from("bank.toml")).unwrap();
        assert_eq!(bank.questions.len(), 2);
        assert_eq!(bank.modules.len(), 1);

        let q = &bank.questions[0];
        assert_eq!(q.construct_weights.get(Construct::Teliti), 0.6);
        assert_eq!(q.construct_weights.get(Construct::Speed), 0.0);
        assert!(q.published);
        assert!(!bank.questions[1].published);
        assert_eq!(bank.modules[0].kind, ModuleKind::Baseline);
        assert!(validate_bank(&bank).is_empty());
    }

    #[test]
    fn unknown_construct_is_rejected() {
        let toml = r#"
[[questions]]
id = "q1"
skill_id = "s"
correct_answer = "A"
constructs = { memory = 0.5 }
"#;
        let err = parse_bank_str(toml, &PathBuf::from("bad.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("q1"));
    }

    #[test]
    fn out_of_range_weight_is_rejected() {
        let toml = r#"
[[questions]]
id = "q1"
skill_id = "s"
correct_answer = "A"
constructs = { speed = 1.5 }
"#;
        assert!(parse_bank_str(toml, &PathBuf::from("bad.toml")).is_err());
    }

    #[test]
    fn validate_flags_dangling_references() {
        let toml = r#"
[[questions]]
id = "q1"
skill_id = "s"
correct_answer = "A"
constructs = { speed = 0.5 }

[[questions]]
id = "q1"
skill_id = "s"
correct_answer = "A"
constructs = { speed = 0.5 }

[[modules]]
id = "m1"
kind = "drill"
question_ids = ["q1", "q9"]
"#;
        let bank = parse_bank_str(toml, &PathBuf::from("b.toml")).unwrap();
        let warnings = validate_bank(&bank);
        assert!(warnings.iter().any(|w| w.message.contains("duplicate")));
        assert!(warnings.iter().any(|w| w.message.contains("q9")));
    }

    #[test]
    fn malformed_toml() {
        assert!(parse_bank_str("[[questions]\nid=", &PathBuf::from("x.toml")).is_err());
    }
}
