// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::PathBuf;

use super::{
    Invocation, ShellKind, ShellSetting, quote_bash, quote_posix, quote_powershell,
};

#[test]
fn test_bash_quoting() {
    assert_eq!(quote_bash("plain-word_1.txt"), "plain-word_1.txt");
    assert_eq!(quote_bash(""), "$''");
    insta::assert_snapshot!(quote_bash("it's here"), @r"$'it\'s here'");
    insta::assert_snapshot!(quote_bash("a\nb"), @r"$'a\nb'");
    insta::assert_snapshot!(quote_bash("$HOME; rm"), @"$'$HOME; rm'");
}

#[test]
fn test_posix_quoting() {
    assert_eq!(quote_posix("plain-word_1.txt"), "plain-word_1.txt");
    assert_eq!(quote_posix(""), "''");
    assert_eq!(quote_posix("a b"), "'a b'");
    insta::assert_snapshot!(quote_posix("it's here"), @r"'it'\''s here'");
    insta::assert_snapshot!(quote_posix("$HOME; rm"), @"'$HOME; rm'");
}

#[test]
fn test_shell_kind_by_name() {
    let kind = |path: &str| ShellKind::of(&PathBuf::from(path));
    assert_eq!(kind("/bin/bash"), ShellKind::Bash);
    assert_eq!(kind("zsh"), ShellKind::Bash);
    assert_eq!(kind("/bin/dash"), ShellKind::Posix);
    assert_eq!(kind("/bin/sh"), ShellKind::Posix);
    assert_eq!(kind("pwsh.exe"), ShellKind::PowerShell);
}

#[test]
fn test_powershell_quoting() {
    assert_eq!(quote_powershell("simple"), "simple");
    assert_eq!(quote_powershell(""), "''");
    assert_eq!(quote_powershell("it's"), "'it''s'");
}

#[test]
fn test_shell_setting_from_value() {
    assert_eq!(ShellSetting::from_value("auto"), ShellSetting::Auto);
    assert_eq!(ShellSetting::from_value("none"), ShellSetting::Disabled);
    assert_eq!(
        ShellSetting::from_value("/bin/zsh"),
        ShellSetting::Path(PathBuf::from("/bin/zsh"))
    );
    assert_eq!(ShellSetting::Disabled.to_string(), "none");
}

#[test]
fn test_default_prefix_only_for_bash_like() {
    assert_eq!(
        ShellSetting::Path(PathBuf::from("/usr/bin/bash")).default_prefix(),
        Some("set -euo pipefail;")
    );
    assert_eq!(
        ShellSetting::Path(PathBuf::from("/bin/sh")).default_prefix(),
        None
    );
    assert_eq!(ShellSetting::Disabled.default_prefix(), None);
}

#[test]
fn test_argv_shapes() {
    let posix = Invocation::Shell {
        program: PathBuf::from("/bin/sh"),
        kind: ShellKind::Posix,
    };
    let (program, args) = posix.argv("echo hi").unwrap();
    assert_eq!(program, PathBuf::from("/bin/sh"));
    assert_eq!(args, ["-c", "echo hi"]);

    let pwsh = Invocation::Shell {
        program: PathBuf::from("pwsh"),
        kind: ShellKind::PowerShell,
    };
    let (_, args) = pwsh.argv("Get-Date").unwrap();
    assert_eq!(args, ["-NoProfile", "-NonInteractive", "-Command", "Get-Date"]);

    let (_, args) = Invocation::Direct.argv("tool  --flag value").unwrap();
    assert_eq!(args, ["--flag", "value"]);
}

#[test]
fn test_direct_empty_line_is_spawn_error() {
    let err = Invocation::Direct.argv("   ").unwrap_err();
    assert!(matches!(err, crate::error::ProcessError::Spawn { .. }));
}

#[test]
fn test_missing_shell_is_spawn_error() {
    let setting = ShellSetting::Path(PathBuf::from("/definitely/not/a/shell"));
    let err = setting.invocation().unwrap_err();
    insta::assert_snapshot!(
        err.to_string(),
        @"failed to spawn '/definitely/not/a/shell': shell not found"
    );
}

#[cfg(unix)]
#[test]
fn test_auto_shell_resolves_on_unix() {
    let invocation = ShellSetting::Auto.invocation().unwrap();
    assert!(matches!(
        invocation,
        Invocation::Shell {
            kind: ShellKind::Bash | ShellKind::Posix,
            ..
        }
    ));
}

#[cfg(unix)]
#[tokio::test]
async fn test_plain_sh_receives_quoted_words() {
    let output = crate::cmd!("printf %s {}", "a b")
        .unwrap()
        .shell(ShellSetting::Path(PathBuf::from("/bin/sh")))
        .run()
        .await
        .unwrap();
    assert_eq!(output.text(), "a b");

    let output = crate::cmd!("printf %s {}", "it's $HOME")
        .unwrap()
        .shell(ShellSetting::Path(PathBuf::from("/bin/sh")))
        .run()
        .await
        .unwrap();
    assert_eq!(output.text(), "it's $HOME");
}
