//! CLI integration tests
//!
//! Tests the command-line interface using assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command for the pipe-relay binary, isolated from any config file or
/// PIPE_RELAY_* variable on the host
fn relay_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pipe-relay").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env_remove("PIPE_RELAY_CONFIG")
        .env_remove("PIPE_RELAY_EXTERNAL_URL")
        .env_remove("PIPE_RELAY_BIND_ADDRESS")
        .env_remove("PIPE_RELAY_LOG_LEVEL")
        .env_remove("RUST_LOG");
    cmd
}

// ─────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    let home = TempDir::new().unwrap();
    relay_cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("byte pipes"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("version"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_command() {
    let home = TempDir::new().unwrap();
    relay_cmd(&home)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pipe-relay"))
        .stdout(predicate::str::contains("Commit:"))
        .stdout(predicate::str::contains("Target:"));
}

#[test]
fn test_short_version_flag() {
    let home = TempDir::new().unwrap();
    relay_cmd(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pipe-relay"));
}

// ─────────────────────────────────────────────────────────────────
// Config Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_config_show_default() {
    let home = TempDir::new().unwrap();
    relay_cmd(&home)
        .arg("config")
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("[node]"))
        .stdout(predicate::str::contains("[forwarding]"))
        .stdout(predicate::str::contains("[relay]"))
        .stdout(predicate::str::contains("[logging]"));
}

#[test]
fn test_config_validate_default() {
    let home = TempDir::new().unwrap();
    relay_cmd(&home)
        .arg("config")
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_config_validate_nonexistent_file() {
    let home = TempDir::new().unwrap();
    relay_cmd(&home)
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg("/nonexistent/path/relay.toml")
        .assert()
        .code(10)
        .stderr(predicate::str::contains("E100"))
        .stderr(predicate::str::contains("config init"));
}

#[test]
fn test_config_init_then_validate() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("conf").join("relay.toml");

    relay_cmd(&home)
        .args(["config", "init", "--path"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration file created"));
    assert!(path.exists());

    relay_cmd(&home)
        .args(["config", "init", "--path"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    relay_cmd(&home)
        .args(["config", "validate", "--config"])
        .arg(&path)
        .assert()
        .success();
}

#[test]
fn test_config_init_help() {
    let home = TempDir::new().unwrap();
    relay_cmd(&home)
        .args(["config", "init", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialize"))
        .stdout(predicate::str::contains("--path"))
        .stdout(predicate::str::contains("--force"));
}

// ─────────────────────────────────────────────────────────────────
// Run Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_run_help() {
    let home = TempDir::new().unwrap();
    relay_cmd(&home)
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Run the relay node"))
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--bind"))
        .stdout(predicate::str::contains("--external-url"));
}

#[test]
fn test_run_with_missing_config() {
    let home = TempDir::new().unwrap();
    relay_cmd(&home)
        .args(["run", "--config", "/nonexistent/relay.toml"])
        .assert()
        .failure()
        .code(10);
}

#[test]
fn test_run_with_invalid_bind_override() {
    let home = TempDir::new().unwrap();
    relay_cmd(&home)
        .args(["run", "--bind", "not-an-address"])
        .assert()
        .failure()
        .code(10)
        .stderr(predicate::str::contains("socket address"));
}

#[test]
fn test_run_with_invalid_external_url() {
    let home = TempDir::new().unwrap();
    relay_cmd(&home)
        .args(["run", "--external-url", "ftp://node-a"])
        .assert()
        .failure()
        .code(10);
}

// ─────────────────────────────────────────────────────────────────
// Verbosity Flag Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_verbose_flags() {
    let home = TempDir::new().unwrap();
    relay_cmd(&home).args(["-v", "version"]).assert().success();
    relay_cmd(&home).args(["-vv", "version"]).assert().success();
}

#[test]
fn test_quiet_flag() {
    let home = TempDir::new().unwrap();
    relay_cmd(&home).args(["--quiet", "version"]).assert().success();
}

// ─────────────────────────────────────────────────────────────────
// Error Handling Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_unknown_command() {
    let home = TempDir::new().unwrap();
    relay_cmd(&home)
        .arg("unknown-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_missing_subcommand() {
    let home = TempDir::new().unwrap();
    relay_cmd(&home).assert().failure();
}
