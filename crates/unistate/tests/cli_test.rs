//! Integration tests for the `unistate` CLI binary.
//!
//! Argument parsing, help output, completions, validation, and error
//! handling — all without a live controller.
#![allow(clippy::unwrap_used)]

use std::io::Write;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a command for the `unistate` binary with env isolation.
///
/// Clears all `UNISTATE_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn unistate_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("unistate");
    cmd.env("HOME", "/tmp/unistate-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/unistate-cli-test-nonexistent")
        .env_remove("UNISTATE_PROFILE")
        .env_remove("UNISTATE_CONTROLLER")
        .env_remove("UNISTATE_SITE")
        .env_remove("UNISTATE_API_KEY")
        .env_remove("UNISTATE_USERNAME")
        .env_remove("UNISTATE_PASSWORD")
        .env_remove("UNISTATE_OUTPUT")
        .env_remove("UNISTATE_INSECURE")
        .env_remove("UNISTATE_TIMEOUT")
        .env_remove("UNISTATE_SCHEMA_DIR")
        .env_remove("UNISTATE_SECRETS_FILE");
    cmd
}

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn temp_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = unistate_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = String::from_utf8_lossy(&output.stderr).to_string()
        + &String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    unistate_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("network controller")
            .and(predicate::str::contains("validate"))
            .and(predicate::str::contains("diff"))
            .and(predicate::str::contains("deploy")),
    );
}

#[test]
fn test_version_flag() {
    unistate_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("unistate"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    unistate_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    unistate_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── validate ────────────────────────────────────────────────────────

#[test]
fn test_validate_full_fixture() {
    unistate_cmd()
        .args(["validate", &fixture("site.json")])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));
}

#[test]
fn test_validate_reports_all_issues_with_exit_3() {
    let config = temp_config(
        r#"{
            "networks": { "A": { "vlan": 10 }, "B": { "vlan": 10 } },
            "wifi": { "x": { "network": "Missing", "security": "open", "bands": ["2g"] } }
        }"#,
    );

    let output = unistate_cmd()
        .args(["validate", config.path().to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("VLAN 10"), "{stderr}");
    assert!(stderr.contains("Missing"), "{stderr}");
}

#[test]
fn test_validate_missing_file() {
    let output = unistate_cmd()
        .args(["validate", "/nonexistent/site.json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_validate_malformed_document() {
    let config = temp_config(r#"{ "netwroks": {} }"#);
    let output = unistate_cmd()
        .args(["validate", config.path().to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Malformed"), "{stderr}");
}

#[test]
fn test_validate_unknown_pinned_schema_version() {
    let config = temp_config(r#"{ "schemaVersion": "1.0.0" }"#);
    let output = unistate_cmd()
        .args(["validate", config.path().to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(5));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("1.0.0"), "{stderr}");
}

// ── schema ──────────────────────────────────────────────────────────

#[test]
fn test_schema_list_shows_builtin() {
    unistate_cmd()
        .args(["schema", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("9.3.45"));
}

#[test]
fn test_schema_show_latest() {
    unistate_cmd()
        .args(["schema", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("dnsrecord")
                .and(predicate::str::contains("record_type"))
                .and(predicate::str::contains("CNAME")),
        );
}

// ── Connection preconditions ────────────────────────────────────────

#[test]
fn test_diff_without_controller_fails_with_usage() {
    let output = unistate_cmd()
        .args(["diff", &fixture("site.json")])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("controller") || stderr.contains("Controller"),
        "{stderr}"
    );
}

#[test]
fn test_diff_without_credentials_fails() {
    let output = unistate_cmd()
        .args(["diff", &fixture("site.json"), "-c", "https://192.0.2.1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("credentials"), "{stderr}");
}

#[test]
fn test_deploy_validates_before_connecting() {
    // Invalid document + no controller: validation runs first and wins.
    let config = temp_config(
        r#"{ "networks": { "A": { "vlan": 5000 } } }"#,
    );
    let output = unistate_cmd()
        .args(["deploy", config.path().to_str().unwrap(), "-c", "https://192.0.2.1", "--api-key", "k"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
}

// ── Global flags ────────────────────────────────────────────────────

#[test]
fn test_invalid_output_format() {
    let output = unistate_cmd()
        .args(["--output", "yaml", "schema", "list"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_quiet_suppresses_stdout() {
    unistate_cmd()
        .args(["--quiet", "validate", &fixture("site.json")])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}
