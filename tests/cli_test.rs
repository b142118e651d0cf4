//! Smoke tests for the `notetion` binary
//!
//! Every test points the binary at a temporary database and a config path
//! that does not exist, so defaults apply and nothing touches the network.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn notetion(tmp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("notetion").expect("binary builds");
    cmd.env_remove("NOTETION_HISTORY_DB")
        .env_remove("NOTETION_PROVIDER")
        .env_remove("NOTETION_MODEL")
        .env("OPENAI_API_KEY", "sk-test")
        .env("RUST_LOG", "off")
        .env("NO_COLOR", "1")
        .arg("--config")
        .arg(tmp.path().join("missing.yaml"))
        .arg("--storage-path")
        .arg(tmp.path().join("history.db"));
    cmd
}

#[test]
fn test_models_json_lists_default_pricing() {
    let tmp = TempDir::new().unwrap();
    let output = notetion(&tmp)
        .args(["models", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let models: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let names: Vec<_> = models
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap().to_string())
        .collect();
    assert!(names.contains(&"gpt-4".to_string()));
    assert!(names.contains(&"gpt-3.5-turbo".to_string()));
}

#[test]
fn test_analytics_json_on_empty_store() {
    let tmp = TempDir::new().unwrap();
    let output = notetion(&tmp)
        .args(["analytics", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let summary: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(summary["total_sessions"], 0);
    assert_eq!(summary["success_rate"], 0.0);
}

#[test]
fn test_history_list_empty() {
    let tmp = TempDir::new().unwrap();
    notetion(&tmp)
        .args(["history", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No sessions found."));
}

#[test]
fn test_run_rejects_out_of_range_creativity() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("lecture.txt");
    std::fs::write(&input, "Central limit theorem").unwrap();

    notetion(&tmp)
        .arg("run")
        .arg(&input)
        .args(["--creativity", "1.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("creativity"));

    notetion(&tmp)
        .args(["analytics", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"in_flight_sessions\": 0"));
}

#[test]
fn test_run_without_supported_inputs_fails() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("empty");
    std::fs::create_dir(&dir).unwrap();

    notetion(&tmp)
        .arg("run")
        .arg(&dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No TXT, PDF or JSON files"));
}

#[test]
fn test_export_import_cleanup_cycle() {
    let tmp = TempDir::new().unwrap();
    let export = tmp.path().join("snapshot.json");

    notetion(&tmp)
        .arg("export")
        .args(["--format", "json", "--output"])
        .arg(&export)
        .assert()
        .success();
    let snapshot: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&export).unwrap()).unwrap();
    assert_eq!(snapshot["version"], 1);
    assert_eq!(snapshot["sessions"].as_array().unwrap().len(), 0);

    notetion(&tmp)
        .arg("import")
        .arg(&export)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 0 sessions"));

    notetion(&tmp)
        .args(["cleanup", "--days", "0"])
        .assert()
        .success();
}

#[test]
fn test_unknown_subcommand_fails() {
    let tmp = TempDir::new().unwrap();
    notetion(&tmp).arg("chat").assert().failure();
}
