// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use super::{ConfigError, FlowError, FlowResult, ProcessError};
use crate::core::process::ProcessOutput;

#[test]
fn test_config_error_display() {
    let err = ConfigError::InvalidValue {
        section: "defaults".to_string(),
        key: "timeout_ms".to_string(),
        message: "must be greater than zero".to_string(),
    };
    insta::assert_snapshot!(
        err.to_string(),
        @"invalid value for 'timeout_ms' in section '[defaults]': must be greater than zero"
    );
}

#[test]
fn test_exit_error_surfaces_stderr() {
    let output = ProcessOutput::builder()
        .stderr(b"boom\n".to_vec())
        .exit_code(3)
        .build();
    let err = ProcessError::Exit {
        command: "false".to_string(),
        code: 3,
        output: Box::new(output),
    };
    insta::assert_snapshot!(err.to_string(), @r"
    process 'false' exited with code 3
    boom
    ");
    assert_eq!(err.exit_code(), Some(3));
    assert!(!err.is_cancelled());
}

#[test]
fn test_cancelled_error_accessors() {
    let err = ProcessError::Cancelled {
        command: "sleep 10".to_string(),
        reason: "timed out after 100ms".to_string(),
        signal: Some("SIGTERM".to_string()),
        output: Box::default(),
    };
    assert!(err.is_cancelled());
    assert_eq!(err.signal(), Some("SIGTERM"));
    assert!(err.output().is_some());
}

#[test]
fn test_flow_error_wraps_sources() {
    let err = FlowError::from(ProcessError::config("stdio", "not piped"));
    insta::assert_snapshot!(err.to_string(), @"process error: invalid option 'stdio': not piped");

    let err = FlowError::from(std::io::Error::other("disk full"));
    insta::assert_snapshot!(err.to_string(), @"io error: disk full");
}

#[test]
fn test_flow_error_size() {
    let size = std::mem::size_of::<FlowError>();
    assert!(size <= 24, "FlowError is {size} bytes, expected <= 24");
}

#[test]
fn test_flow_result_size() {
    let size = std::mem::size_of::<FlowResult<()>>();
    assert!(size <= 24, "FlowResult<()> is {size} bytes, expected <= 24");
}
