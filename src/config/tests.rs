// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::PathBuf;
use std::time::Duration;

use super::{Config, ConfigLoader};
use crate::core::shell::ShellSetting;
use crate::error::ConfigError;
use crate::logging::LogLevel;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.log.level, LogLevel::INFO);
    assert_eq!(config.log.file_level, LogLevel::TRACE);
    assert!(config.log.file.is_none());
    assert!(config.defaults.nothrow.is_none());
    insta::assert_snapshot!(config.format_options().join("\n"), @r"
    log.file_level = 5
    log.level      = 3
    ");
}

#[test]
fn test_parse_full_file() {
    let config = Config::parse(
        r#"
        [defaults]
        shell = "none"
        prefix = "set -e;"
        nothrow = true
        timeout_ms = 1500
        timeout_signal = "int"
        delimiter = "\u0000"

        [defaults.env]
        greeting = "hello"

        [log]
        level = 4
        file = "procflow.log"
        "#,
    )
    .unwrap();

    assert_eq!(config.log.level, LogLevel::DEBUG);
    assert_eq!(config.log.file, Some(PathBuf::from("procflow.log")));

    let policy = config.policy().unwrap();
    assert_eq!(policy.shell, Some(ShellSetting::Disabled));
    assert_eq!(policy.prefix.as_deref(), Some("set -e;"));
    assert_eq!(policy.nothrow, Some(true));
    assert_eq!(policy.timeout, Some(Duration::from_millis(1500)));
    assert_eq!(policy.timeout_signal.as_deref(), Some("int"));
    assert_eq!(policy.delimiter.as_deref(), Some("\0"));
    assert_eq!(
        policy.env.unwrap().get("greeting").map(String::as_str),
        Some("hello")
    );
    assert!(policy.quiet.is_none());
}

#[test]
fn test_unknown_field_rejected() {
    assert!(Config::parse("[defaults]\nnothorw = true\n").is_err());
    assert!(Config::parse("[paths]\nprefix = \"x\"\n").is_err());
}

#[test]
fn test_invalid_values() {
    let message = |toml: &str| {
        let err = Config::parse(toml).unwrap_err();
        let config_err = err
            .downcast_ref::<ConfigError>()
            .unwrap_or_else(|| panic!("expected ConfigError, got {err:#}"));
        config_err.to_string()
    };

    insta::assert_snapshot!(
        message("[defaults]\ntimeout_ms = 0\n"),
        @"invalid value for 'timeout_ms' in section '[defaults]': must be greater than zero"
    );
    insta::assert_snapshot!(
        message("[defaults]\ntimeout_signal = \"SIGNOPE\"\n"),
        @"invalid value for 'timeout_signal' in section '[defaults]': unknown signal 'SIGNOPE'"
    );
    insta::assert_snapshot!(
        message("[defaults]\ndelimiter = \"\"\n"),
        @"invalid value for 'delimiter' in section '[defaults]': must not be empty"
    );
}

#[test]
fn test_log_level_out_of_range() {
    assert!(Config::parse("[log]\nlevel = 9\n").is_err());
}

#[test]
fn test_later_sources_win() {
    let config = ConfigLoader::new()
        .add_toml_str("[defaults]\nnothrow = false\nquiet = true\n")
        .add_toml_str("[defaults]\nnothrow = true\n")
        .set("defaults.verbose", true)
        .unwrap()
        .set_str("defaults.timeout_ms = 250")
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(config.defaults.nothrow, Some(true));
    assert_eq!(config.defaults.quiet, Some(true));
    assert_eq!(config.defaults.verbose, Some(true));
    assert_eq!(config.defaults.timeout_ms, Some(250));
}

#[test]
fn test_set_str_needs_equals() {
    assert!(ConfigLoader::new().set_str("defaults.nothrow").is_err());
}

#[test]
fn test_missing_required_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Config::from_file(dir.path().join("absent.toml")).is_err());

    let loader = ConfigLoader::new().add_toml_file_optional(dir.path().join("absent.toml"));
    assert!(loader.loaded_files().is_empty());
    assert_eq!(loader.build().unwrap(), Config::default());
}

#[test]
fn test_from_file_and_listing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("procflow.toml");
    std::fs::write(&path, "[defaults]\ncwd = \"/tmp\"\n").unwrap();

    let loader = ConfigLoader::new().add_toml_file(&path).add_toml_str("");
    let listing = loader.format_loaded_files();
    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0], format!("1. [file] {}", path.display()));
    assert_eq!(listing[1], "2. [string] <string>");

    let config = loader.build().unwrap();
    assert_eq!(config.defaults.cwd, Some(PathBuf::from("/tmp")));
}

#[test]
fn test_format_options() {
    let config = Config::parse(
        "[defaults]\nnothrow = true\ndelimiter = \"\\t\"\n[defaults.env]\ngreeting = \"hi\"\n",
    )
    .unwrap();
    insta::assert_snapshot!(config.format_options().join("\n"), @r#"
    defaults.delimiter    = "\t"
    defaults.env.greeting = hi
    defaults.nothrow      = true
    log.file_level        = 5
    log.level             = 3
    "#);
}

#[test]
fn test_log_section_to_log_config() {
    let config = Config::parse("[log]\nlevel = 2\nfile_level = 4\nfile = \"x.log\"\n").unwrap();
    let log = config.log.log_config();
    assert_eq!(log.console_level(), LogLevel::WARN);
    assert_eq!(log.file_level(), LogLevel::DEBUG);
    assert_eq!(log.log_file(), Some("x.log"));
}
