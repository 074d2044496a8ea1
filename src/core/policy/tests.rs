// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::PathBuf;
use std::time::Duration;

use super::{
    Policy, PolicyOverride, StdioMode, cd, defaults, resolve, update_defaults,
};
use crate::core::group::SignalName;
use crate::core::shell::ShellSetting;
use crate::error::ProcessError;

fn config_option(err: &ProcessError) -> &'static str {
    match err {
        ProcessError::Config { option, .. } => option,
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn test_call_beats_instance_beats_global() {
    let global = PolicyOverride::builder()
        .nothrow(false)
        .quiet(true)
        .delimiter("\0")
        .build();
    let instance = PolicyOverride::builder().nothrow(true).quiet(false).build();
    let call = PolicyOverride::builder().quiet(true).build();

    let policy = resolve(&call, &instance, &global).unwrap();
    assert!(policy.nothrow());
    assert!(policy.quiet());
    assert_eq!(policy.delimiter(), "\0");
}

#[test]
fn test_env_merges_one_level() {
    let mut global = PolicyOverride::default();
    global.set_env("A", "global");
    global.set_env("B", "global");
    let mut call = PolicyOverride::default();
    call.set_env("B", "call");

    let policy = resolve(&call, &PolicyOverride::default(), &global).unwrap();
    let env: Vec<_> = policy
        .env()
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    assert_eq!(env, ["A=global", "B=call"]);
}

#[test]
fn test_defaults_when_unset() {
    let policy = Policy::from_override(PolicyOverride::default()).unwrap();
    assert_eq!(policy.delimiter(), "\n");
    assert_eq!(policy.stdout(), StdioMode::Pipe);
    assert_eq!(policy.timeout_signal(), SignalName::SIGTERM);
    assert_eq!(policy.stdin_mode(false), StdioMode::Inherit);
    assert_eq!(policy.stdin_mode(true), StdioMode::Pipe);
    assert!(!policy.nothrow());
    assert!(!policy.halt());
}

#[test]
fn test_contradictions_rejected() {
    let cases = [
        PolicyOverride::builder().delimiter("").build(),
        PolicyOverride::builder().timeout(Duration::ZERO).build(),
        PolicyOverride::builder().timeout_signal("SIGNOPE").build(),
        PolicyOverride::builder()
            .shell(ShellSetting::Path(PathBuf::new()))
            .build(),
        PolicyOverride::builder()
            .input(b"data".to_vec())
            .stdin(StdioMode::Inherit)
            .build(),
    ];
    let options: Vec<_> = cases
        .into_iter()
        .map(|case| config_option(&Policy::from_override(case).unwrap_err()))
        .collect();
    assert_eq!(options, ["delimiter", "timeout", "signal", "shell", "input"]);
}

#[test]
fn test_prefix_wrapping() {
    let policy = Policy::from_override(
        PolicyOverride::builder()
            .shell(ShellSetting::Path(PathBuf::from("/bin/bash")))
            .postfix("; echo done")
            .build(),
    )
    .unwrap();
    assert_eq!(policy.prefix(), "set -euo pipefail;");
    insta::assert_snapshot!(
        policy.wrap_line("ls"),
        @"set -euo pipefail; ls ; echo done"
    );
}

#[test]
fn test_round_trip_through_override() {
    let policy = Policy::from_override(
        PolicyOverride::builder()
            .nothrow(true)
            .timeout(Duration::from_secs(3))
            .timeout_signal("KILL")
            .build(),
    )
    .unwrap();
    let again = Policy::from_override(policy.to_override()).unwrap();
    assert!(again.nothrow());
    assert_eq!(again.timeout(), Some(Duration::from_secs(3)));
    assert_eq!(again.timeout_signal(), SignalName::SIGKILL);
}

#[test]
fn test_stdio_mode_parse() {
    assert_eq!(StdioMode::parse("ignore").unwrap(), StdioMode::Null);
    assert_eq!(StdioMode::parse("Inherit").unwrap(), StdioMode::Inherit);
    assert!(StdioMode::parse("socket").is_err());
}

#[test]
fn test_update_defaults_is_snapshotted() {
    let key = "PROCFLOW_TEST_SNAPSHOT_KEY";
    let before = defaults();
    update_defaults(|d| d.set_env(key, "1"));
    let after = defaults();

    assert!(before.env.as_ref().is_none_or(|env| !env.contains_key(key)));
    assert_eq!(
        after.env.as_ref().and_then(|env| env.get(key)).map(String::as_str),
        Some("1")
    );
}

#[test]
fn test_cd_rejects_missing_directory() {
    let err = cd("/definitely/not/a/dir").unwrap_err();
    assert_eq!(config_option(&err), "cwd");
}
