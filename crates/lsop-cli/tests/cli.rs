//! End-to-end checks of the `lsop` binary that do not depend on the host's
//! process table.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `lsop` with an empty config file, isolated from the user's own.
fn lsop(dir: &TempDir) -> Command {
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "").unwrap();
    let mut cmd = Command::cargo_bin("lsop").unwrap();
    cmd.arg("--config").arg(config).env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    lsop(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--state"))
        .stdout(predicate::str::contains("--create-whitelist"));
}

#[test]
fn version_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    lsop(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn recursive_without_state_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    lsop(&dir)
        .arg("-r")
        .assert()
        .code(64)
        .stderr(predicate::str::contains("require a state file"));
}

#[test]
fn directories_without_state_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    lsop(&dir).arg("/usr/lib").assert().code(64);
}

#[test]
fn create_and_consult_conflict() {
    let dir = tempfile::tempdir().unwrap();
    lsop(&dir).args(["-c", "out", "-w", "in"]).assert().code(64);
}

#[test]
fn whitelist_on_stdout_with_json_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    lsop(&dir)
        .args(["-c", "-", "-o", "json"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("JSON"));
}

#[test]
fn unknown_flag_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    lsop(&dir).arg("--frobnicate").assert().code(64);
}

#[test]
fn bad_output_format_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    lsop(&dir).args(["-o", "yaml"]).assert().code(64);
}

#[test]
fn malformed_whitelist_fails() {
    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("whitelist");
    std::fs::write(&list, "/usr/bin/unpacker\t0\n").unwrap();
    lsop(&dir)
        .arg("-w")
        .arg(&list)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("line 1"));
}

#[test]
fn whitelist_from_stdin_is_parsed() {
    let dir = tempfile::tempdir().unwrap();
    lsop(&dir)
        .args(["-w", "-"])
        .write_stdin("no tab here\n")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("whitelist"));
}

#[test]
fn missing_whitelist_fails() {
    let dir = tempfile::tempdir().unwrap();
    lsop(&dir)
        .arg("-w")
        .arg(dir.path().join("absent"))
        .assert()
        .code(1);
}

#[test]
fn malformed_state_file_fails_and_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state");
    std::fs::write(&state, "5:100:1000\n").unwrap();
    lsop(&dir)
        .arg("-s")
        .arg(&state)
        .arg(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("state file"));
    assert_eq!(std::fs::read_to_string(&state).unwrap(), "5:100:1000\n");
}

#[test]
fn invalid_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bad.toml");
    std::fs::write(&config, "no_header = maybe\n").unwrap();
    Command::cargo_bin("lsop")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid config file"));
}
