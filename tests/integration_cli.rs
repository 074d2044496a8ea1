// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Integration tests for the `procflow` binary.
//!
//! Runs the compiled binary and checks stdout and the exit status.

#![cfg(unix)]

use std::process::{Command, Output};

fn procflow(args: &[&str]) -> Output {
    let dir = tempfile::tempdir().unwrap();
    Command::new(env!("CARGO_BIN_EXE_procflow"))
        .current_dir(dir.path())
        .env_remove("PROCFLOW_DEFAULTS__NOTHROW")
        .args(args)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// =============================================================================
// Informational commands
// =============================================================================

#[test]
fn cli_version() {
    let output = procflow(&["version"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), env!("CARGO_PKG_VERSION"));
}

#[test]
fn cli_options_with_set() {
    let output = procflow(&["-s", "defaults.nothrow=true", "options"]);
    assert!(output.status.success());
    insta::assert_snapshot!(stdout(&output).trim_end(), @r"
    defaults.nothrow = true
    log.file_level   = 5
    log.level        = 3
    ");
}

#[test]
fn cli_configs_lists_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("extra.toml");
    std::fs::write(&path, "[defaults]\nquiet = true\n").unwrap();

    let output = procflow(&["--config", path.to_str().unwrap(), "configs"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), format!("1. [file] {}", path.display()));
}

#[test]
fn cli_bad_config_fails() {
    let output = procflow(&["-s", "defaults.timeout_ms=0", "options"]);
    assert!(!output.status.success());
}

// =============================================================================
// run / pipe
// =============================================================================

#[test]
fn cli_run_forwards_stdout() {
    let output = procflow(&["run", "--", "echo", "hello", "world"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "hello world\n");
}

#[test]
fn cli_run_propagates_exit_code() {
    let output = procflow(&["run", "--", "exit 7"]);
    assert_eq!(output.status.code(), Some(7));
}

#[test]
fn cli_run_nothrow() {
    let output = procflow(&["run", "--nothrow", "--", "exit 7"]);
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn cli_run_timeout() {
    let output = procflow(&["run", "--timeout-ms", "100", "--", "sleep 5"]);
    assert_eq!(output.status.code(), Some(130));
}

#[test]
fn cli_run_env_flag() {
    let output = procflow(&["run", "-e", "GREETING=hi", "--", "echo $GREETING"]);
    assert_eq!(stdout(&output), "hi\n");
}

#[test]
fn cli_pipe() {
    let output = procflow(&["pipe", "printf 'b\\na\\n'", "sort"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "a\nb\n");
}

#[test]
fn cli_pipe_failure_status() {
    let output = procflow(&["pipe", "exit 3", "cat"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn cli_pipe_reader_exits_first() {
    // The timeout turns a stuck upstream into status 130 instead of a hang
    let output = procflow(&["pipe", "--timeout-ms", "10000", "yes", "head -n1"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "y\n");
}

#[test]
fn cli_pipe_reader_fails_first() {
    let output = procflow(&["pipe", "--timeout-ms", "10000", "yes", "exit 4"]);
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn cli_missing_command() {
    let output = procflow(&[]);
    assert!(!output.status.success());
}
