//! CLI integration tests using assert_cmd.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn gatepath(dir: &Path) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("gatepath").unwrap();
    cmd.current_dir(dir).env_remove("GATEPATH_DATA_PATH");
    cmd
}

/// A workspace with the starter config and bank imported.
fn initialized() -> TempDir {
    let dir = TempDir::new().unwrap();
    gatepath(dir.path()).arg("init").assert().success();
    gatepath(dir.path())
        .args(["import", "--bank", "bank.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 8 questions and 3 modules"));
    dir
}

fn attempt(dir: &Path, question: &str, answer: &str) -> assert_cmd::assert::Assert {
    gatepath(dir)
        .args(["attempt", "--learner", "alice", "--question", question])
        .args(["--answer", answer, "--context", "baseline", "--time-spent", "40"])
        .assert()
}

#[test]
fn help_lists_commands() {
    let dir = TempDir::new().unwrap();
    gatepath(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("attempt"))
        .stdout(predicate::str::contains("checkpoint"))
        .stdout(predicate::str::contains("recompute"));
}

#[test]
fn init_creates_files_once() {
    let dir = TempDir::new().unwrap();
    gatepath(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created gatepath.toml"))
        .stdout(predicate::str::contains("Created bank.toml"));
    assert!(dir.path().join("gatepath.toml").exists());
    assert!(dir.path().join("bank.toml").exists());

    gatepath(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists, skipping"));
}

#[test]
fn baseline_to_checkpoint_flow() {
    let dir = initialized();
    let path = dir.path();

    gatepath(path)
        .args(["phase", "start-baseline", "--learner", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BASELINE_ASSESSMENT_IN_PROGRESS"));

    attempt(path, "frac-1", "A")
        .success()
        .stdout(predicate::str::contains("incorrect"));
    attempt(path, "frac-2", "A").success();
    attempt(path, "pct-1", "c")
        .success()
        .stdout(predicate::str::contains(": correct"));
    attempt(path, "idea-1", "A").success();
    attempt(path, "inf-1", "D").success();

    gatepath(path)
        .args(["finalize", "--learner", "alice", "--module", "baseline-quant"])
        .args(["--score", "33.3", "--total", "3", "--correct", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BASELINE_ASSESSMENT_IN_PROGRESS"));

    gatepath(path)
        .args(["finalize", "--learner", "alice", "--module", "baseline-verbal"])
        .args(["--score", "100", "--total", "2", "--correct", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("All baseline modules complete"))
        .stdout(predicate::str::contains("BASELINE_COMPLETE"));

    gatepath(path)
        .args(["phase", "activate-plan", "--learner", "alice", "--cycle", "cycle-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PLAN_ACTIVE"));

    gatepath(path)
        .args(["checkpoint", "--learner", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("with 3 questions"))
        .stdout(predicate::str::contains("1 weak skill(s)"));

    gatepath(path)
        .args(["history", "--learner", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("full_baseline"))
        .stdout(predicate::str::contains("cycle-1"));

    gatepath(path)
        .args(["profile", "--learner", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Weak skills: fractions"));
}

#[test]
fn json_output_is_machine_readable() {
    let dir = initialized();
    let output = gatepath(dir.path())
        .args(["--json", "attempt", "--learner", "bob", "--question", "idea-1"])
        .args(["--answer", "a"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["is_correct"], serde_json::Value::Bool(true));
    assert_eq!(value["duplicate"], serde_json::Value::Bool(false));
}

#[test]
fn repeated_attempt_id_is_a_no_op() {
    let dir = initialized();
    let id = "6f1c2a9e-3d4b-4c5a-8e7f-0a1b2c3d4e5f";
    for expected in ["Recorded attempt", "already recorded"] {
        gatepath(dir.path())
            .args(["attempt", "--learner", "bob", "--question", "frac-1"])
            .args(["--answer", "B", "--id", id])
            .assert()
            .success()
            .stdout(predicate::str::contains(expected));
    }
}

#[test]
fn checkpoint_without_cycle_fails() {
    let dir = initialized();
    gatepath(dir.path())
        .args(["checkpoint", "--learner", "carol"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No active cycle"));
}

#[test]
fn invalid_transition_is_reported() {
    let dir = initialized();
    gatepath(dir.path())
        .args(["phase", "unlock-recycle", "--learner", "carol"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "invalid transition from ONBOARDING to RECYCLE_UNLOCKED",
        ));

    gatepath(dir.path())
        .args(["phase", "show", "--learner", "carol"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Phase: ONBOARDING"))
        .stdout(predicate::str::contains("Baseline: 0/2 modules complete"));
}

#[test]
fn unknown_question_fails() {
    let dir = initialized();
    gatepath(dir.path())
        .args(["attempt", "--learner", "bob", "--question", "nope", "--answer", "A"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown question: nope"));
}

#[test]
fn recompute_reports_replayed_attempts() {
    let dir = initialized();
    attempt(dir.path(), "frac-1", "B").success();
    attempt(dir.path(), "idea-2", "C").success();
    gatepath(dir.path())
        .args(["recompute", "--learner", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Replayed 2 attempts into 2 skill states"));
}

#[test]
fn missing_config_file_fails() {
    let dir = TempDir::new().unwrap();
    gatepath(dir.path())
        .args(["--config", "nope.toml", "profile", "--learner", "alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn bad_bank_is_rejected() {
    let dir = TempDir::new().unwrap();
    gatepath(dir.path()).arg("init").assert().success();
    std::fs::write(
        dir.path().join("broken.toml"),
        "[[questions]]\nid = \"q1\"\nskill_id = \"s\"\ncorrect_answer = \"A\"\nconstructs = { memory = 1.0 }\n",
    )
    .unwrap();
    gatepath(dir.path())
        .args(["import", "--bank", "broken.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown construct"));
}
