//! Integration tests for `existbench run`

#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Writes a config with an existing and a missing local file case, both as fixtures.
fn local_config(dir: &Path) -> std::path::PathBuf {
    let existing = dir.join("data").join("test.txt");
    let missing = dir.join("data").join("test.not");
    let config = format!(
        r#"
[defaults]
iterations = 3
warmup = 1
timeout = "2s"

[[case]]
name = "local-existing"
path = '{}'
expected_exists = true
category = "local_file"
fixture = true

[[case]]
name = "local-missing"
path = '{}'
expected_exists = false
category = "local_file"
fixture = true
"#,
        existing.display(),
        missing.display()
    );
    let path = dir.join("existbench.toml");
    fs::write(&path, config).expect("write config");
    path
}

fn existbench() -> Command {
    Command::cargo_bin("existbench").expect("failed to find existbench binary")
}

#[test]
fn run_writes_versioned_report() {
    let temp_dir = tempdir().expect("failed to create temp dir");
    let config = local_config(temp_dir.path());
    let output_path = temp_dir.path().join("out").join("report.json");

    existbench()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--out")
        .arg(&output_path)
        .assert()
        .success();

    let content = fs::read_to_string(&output_path).expect("failed to read report");
    let report: serde_json::Value = serde_json::from_str(&content).expect("valid JSON");

    assert_eq!(report["schema"].as_str(), Some("existbench.report.v1"));
    assert_eq!(report["config"]["iterations"], 3);
    assert_eq!(report["config"]["timeout_ms"], 2000);
    assert_eq!(report["cases"].as_array().map(Vec::len), Some(2));
    assert_eq!(report["skipped"].as_array().map(Vec::len), Some(0));

    // six strategies, one category
    let aggregates = report["aggregates"].as_array().expect("aggregates array");
    assert_eq!(aggregates.len(), 6);
    for agg in aggregates {
        assert_eq!(agg["sample_count"], 6);
        assert_eq!(agg["counts"]["correct"], 6);
        assert_eq!(agg["counts"]["incorrect"], 0);
        assert_eq!(agg["counts"]["failed"], 0);
    }

    assert!(report.get("samples").is_none());
    assert!(temp_dir.path().join("data").join("test.txt").is_file());
}

#[test]
fn cli_overrides_apply() {
    let temp_dir = tempdir().expect("failed to create temp dir");
    let config = local_config(temp_dir.path());
    let output_path = temp_dir.path().join("report.json");

    existbench()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--iterations")
        .arg("2")
        .arg("--warmup")
        .arg("0")
        .arg("--strategy")
        .arg("open_attempt")
        .arg("--strategy")
        .arg("direct_query")
        .arg("--raw-samples")
        .arg("--pretty")
        .arg("--out")
        .arg(&output_path)
        .assert()
        .success();

    let content = fs::read_to_string(&output_path).expect("failed to read report");
    assert!(content.contains("\n  \""), "pretty output should be indented");
    let report: serde_json::Value = serde_json::from_str(&content).expect("valid JSON");

    assert_eq!(report["config"]["iterations"], 2);
    assert_eq!(
        report["config"]["strategies"],
        serde_json::json!(["open_attempt", "direct_query"])
    );
    let samples = report["samples"].as_array().expect("raw samples");
    assert_eq!(samples.len(), 2 * 2 * 2);

    let totals = report["totals"].as_array().expect("totals");
    assert_eq!(totals.len(), 2);
}

#[test]
fn unreachable_case_is_skipped_not_fatal() {
    let temp_dir = tempdir().expect("failed to create temp dir");
    let output_path = temp_dir.path().join("report.json");
    let present = temp_dir.path().join("test.txt");
    fs::write(&present, b"").expect("write fixture");
    let config = temp_dir.path().join("existbench.toml");
    fs::write(
        &config,
        format!(
            r#"
[defaults]
iterations = 2

[[case]]
name = "local-existing"
path = '{}'
expected_exists = true
category = "local_file"

[[case]]
name = "unc-existing"
path = '{}'
expected_exists = true
category = "unc_path"
"#,
            present.display(),
            temp_dir.path().join("no-share").join("test.txt").display()
        ),
    )
    .expect("write config");

    existbench()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--out")
        .arg(&output_path)
        .assert()
        .success();

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output_path).unwrap()).unwrap();
    let skipped = report["skipped"].as_array().expect("skipped array");
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0]["case"]["name"], "unc-existing");
    assert!(report["case_stats"]
        .as_array()
        .unwrap()
        .iter()
        .all(|s| s["case"] != "unc-existing"));
}

#[cfg(unix)]
#[test]
#[allow(unsafe_code)]
fn fail_on_incorrect_exits_2() {
    use std::os::unix::fs::PermissionsExt;

    // Root reads anything, so open_attempt would not diverge.
    if unsafe { libc::geteuid() } == 0 {
        return;
    }

    let temp_dir = tempdir().expect("failed to create temp dir");
    let secret = temp_dir.path().join("secret.txt");
    fs::write(&secret, b"x").unwrap();
    fs::set_permissions(&secret, fs::Permissions::from_mode(0o000)).unwrap();

    let config = temp_dir.path().join("existbench.toml");
    fs::write(
        &config,
        format!(
            r#"
[defaults]
iterations = 2
strategies = ["direct_query", "open_attempt"]

[[case]]
name = "unreadable"
path = '{}'
expected_exists = true
category = "local_file"
"#,
            secret.display()
        ),
    )
    .unwrap();
    let output_path = temp_dir.path().join("report.json");

    existbench()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--out")
        .arg(&output_path)
        .arg("--fail-on-incorrect")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("2 incorrect"));

    assert!(output_path.exists(), "report is still written");
}

#[test]
fn missing_config_is_a_tool_error() {
    let temp_dir = tempdir().expect("failed to create temp dir");

    existbench()
        .arg("run")
        .arg("--config")
        .arg(temp_dir.path().join("nope.toml"))
        .arg("--out")
        .arg(temp_dir.path().join("report.json"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("nope.toml"));
}

#[test]
fn unknown_strategy_is_rejected_by_the_parser() {
    existbench()
        .arg("run")
        .arg("--strategy")
        .arg("file_exists")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown strategy"));
}

#[test]
fn invalid_timeout_is_reported() {
    let temp_dir = tempdir().expect("failed to create temp dir");
    let config = local_config(temp_dir.path());

    existbench()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--timeout")
        .arg("soon")
        .arg("--out")
        .arg(temp_dir.path().join("report.json"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid duration: soon"));
}
