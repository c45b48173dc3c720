//! End-to-end tests for the extraction and projection flow.
//!
//! Runs the `burnup` binary against a fixture export: extract → project →
//! write, plus single-item history replay.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn burnup_binary() -> String {
    env!("CARGO_BIN_EXE_burnup").to_string()
}

fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/export.json")
}

/// Runs `burnup` with an isolated home so no user config is picked up.
fn burnup(temp: &Path, args: &[&str]) -> Output {
    Command::new(burnup_binary())
        .env("HOME", temp)
        .env("XDG_CONFIG_HOME", temp.join(".config"))
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to run burnup")
}

fn read_json(path: &Path) -> Value {
    let content = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[test]
fn test_events_flow() {
    let temp = TempDir::new().unwrap();
    let output_path = temp.path().join("reports/events.json");
    let fixture = fixture_path();

    let output = burnup(
        temp.path(),
        &[
            "events",
            fixture.to_str().unwrap(),
            output_path.to_str().unwrap(),
        ],
    );
    assert!(
        output.status.success(),
        "burnup events should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report = read_json(&output_path);
    let events = report["events"].as_object().unwrap();
    let days: Vec<&str> = events.keys().map(String::as_str).collect();
    assert_eq!(
        days,
        [
            "2024-01-01",
            "2024-01-02",
            "2024-01-03",
            "2024-01-04",
            "2024-01-05"
        ]
    );

    // Counters are cumulative: the closed feature stays counted.
    let last = &events["2024-01-05"];
    assert_eq!(last["features_estimated_num"]["completed"], 1);
    assert_eq!(last["features_estimated_size"]["completed"], 5.0);
    assert_eq!(last["features_unestimated_num"]["created"], 1);
    assert!(last["changes"].as_array().unwrap().len() == 1);
    assert_eq!(last["changes"][0]["epic_id"], "5");
}

#[test]
fn test_hierarchies_for_selected_root() {
    let temp = TempDir::new().unwrap();
    let output_path = temp.path().join("hierarchies.json");
    let fixture = fixture_path();

    let output = burnup(
        temp.path(),
        &[
            "hierarchies",
            fixture.to_str().unwrap(),
            output_path.to_str().unwrap(),
            "--id",
            "1",
        ],
    );
    assert!(output.status.success());
    assert!(
        String::from_utf8_lossy(&output.stdout).starts_with("Extracted 1 hierarchies (3 work items)")
    );

    let forest = read_json(&output_path);
    let forest = forest.as_array().unwrap();
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0]["root"]["work_item"]["tee_shirt"], "L");
    assert_eq!(forest[0]["children"][0]["changes"].as_array().unwrap().len(), 6);
}

#[test]
fn test_history_prints_json_lines() {
    let temp = TempDir::new().unwrap();
    let fixture = fixture_path();

    let output = burnup(temp.path(), &["history", fixture.to_str().unwrap(), "1"]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let statuses: Vec<String> = stdout
        .lines()
        .map(|line| {
            let snapshot: Value = serde_json::from_str(line).unwrap();
            snapshot["status"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(statuses, ["New", "Active"]);
}

#[test]
fn test_failed_root_exits_non_zero() {
    let temp = TempDir::new().unwrap();
    let output_path = temp.path().join("events.json");
    let fixture = fixture_path();

    let output = burnup(
        temp.path(),
        &[
            "events",
            fixture.to_str().unwrap(),
            output_path.to_str().unwrap(),
            "--id",
            "1",
            "--id",
            "missing",
        ],
    );

    assert!(!output.status.success());
    assert!(!output_path.exists(), "no output is written on failure");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("1 of 2 hierarchies failed to extract"));
    assert!(stderr.contains("missing"));
}

fn failure_stderr(temp: &Path, flags: &[&str]) -> String {
    let output_path = temp.join("events.json");
    let fixture = fixture_path();
    let mut args: Vec<&str> = flags.to_vec();
    args.extend([
        "events",
        fixture.to_str().unwrap(),
        output_path.to_str().unwrap(),
        "--id",
        "missing",
    ]);

    let output = burnup(temp, &args);
    assert!(!output.status.success());
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_verbose_failure_reports_cause() {
    let temp = TempDir::new().unwrap();

    let stderr = failure_stderr(temp.path(), &["--verbose"]);

    assert!(
        stderr.contains("failed to enumerate children of missing: work item missing does not exist"),
        "cause missing from stderr: {stderr}"
    );
}

#[test]
fn test_plain_failure_reports_innermost_cause() {
    let temp = TempDir::new().unwrap();

    let stderr = failure_stderr(temp.path(), &[]);

    assert!(
        stderr.contains("work item missing does not exist"),
        "cause missing from stderr: {stderr}"
    );
}

#[test]
fn test_config_file_selects_bucket_scheme() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("burnup.toml");
    std::fs::write(&config_path, "bucket_scheme = \"three_bucket\"\npretty = true\n").unwrap();
    let output_path = temp.path().join("events.json");
    let fixture = fixture_path();

    let output = burnup(
        temp.path(),
        &[
            "--config",
            config_path.to_str().unwrap(),
            "events",
            fixture.to_str().unwrap(),
            output_path.to_str().unwrap(),
        ],
    );
    assert!(output.status.success());

    let content = std::fs::read_to_string(&output_path).unwrap();
    assert!(content.contains("\n  \"titles\""));

    let report: Value = serde_json::from_str(&content).unwrap();
    let first = &report["events"]["2024-01-01"];
    assert_eq!(first["epics_estimated_num"]["created"], 0);
    assert_eq!(first["epics_estimated_num"]["pending"], 1);
}
