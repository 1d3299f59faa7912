//! CLI end-to-end tests
//!
//! Run the `stemtool` binary and check the JSON envelope on stdout.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::tempdir;

#[allow(deprecated)]
fn stemtool_cmd() -> Command {
    let mut cmd = Command::cargo_bin("stemtool").unwrap();
    cmd.env_remove("STEMTOOL_CONFIG").env_remove("RUST_LOG");
    cmd
}

fn single_envelope(stdout: &[u8]) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1, "expected one line on stdout, got {stdout:?}");
    serde_json::from_str(lines[0]).unwrap()
}

#[test]
fn test_invalid_url_reports_failure_envelope() {
    let dir = tempdir().unwrap();
    let output = stemtool_cmd()
        .args(["download", "not-a-url"])
        .arg(dir.path().join("track"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "{\"success\":false,\"error\":\"Invalid YouTube URL\"}\n"
    );
    assert!(dir.path().join("track").is_dir());
}

#[test]
fn test_separate_missing_input_is_failure_envelope() {
    let dir = tempdir().unwrap();
    let output = stemtool_cmd()
        .args(["separate", "--engine", "spleeter"])
        .arg(dir.path().join("missing.mp3"))
        .arg(dir.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let envelope = single_envelope(&output.stdout);
    assert_eq!(envelope["success"], false);
    assert!(envelope["error"].is_string());
    assert!(envelope.get("filepath").is_none());
}

#[test]
fn test_transpose_bad_key_is_failure_envelope() {
    let dir = tempdir().unwrap();
    let output = stemtool_cmd()
        .args(["transpose", "in.mp3"])
        .arg(dir.path())
        .args(["--from-key", "H", "--to-key", "C"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let envelope = single_envelope(&output.stdout);
    assert_eq!(envelope["success"], false);
    assert_eq!(envelope["error"], "Invalid key: H");
}

#[test]
fn test_usage_error_exits_non_zero() {
    stemtool_cmd()
        .arg("download")
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Usage"));
}
