// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use super::run::{CANCELLED_STATUS, exit_status};
use crate::core::process::ProcessOutput;
use crate::error::ProcessError;

fn exited(code: i32) -> ProcessError {
    ProcessError::Exit {
        command: "false".into(),
        code,
        output: Box::default(),
    }
}

#[test]
fn test_exit_status_passes_code_through() {
    assert_eq!(exit_status(&exited(3)), Some(3));
    assert_eq!(exit_status(&exited(255)), Some(255));
}

#[test]
fn test_exit_status_out_of_range_is_failure() {
    assert_eq!(exit_status(&exited(-1)), Some(1));
    assert_eq!(exit_status(&exited(256)), Some(1));
}

#[test]
fn test_exit_status_cancelled() {
    let err = ProcessError::Cancelled {
        command: "sleep 5".into(),
        reason: "interrupted".into(),
        signal: Some("SIGTERM".into()),
        output: Box::new(ProcessOutput::default()),
    };
    assert_eq!(exit_status(&err), Some(CANCELLED_STATUS));
}

#[cfg(unix)]
#[test]
fn test_exit_status_signal() {
    let err = ProcessError::Signal {
        command: "sleep 5".into(),
        signal: "SIGKILL".into(),
        output: Box::default(),
    };
    assert_eq!(exit_status(&err), Some(137));
}

#[test]
fn test_exit_status_none_without_process() {
    let err = ProcessError::Spawn {
        command: "nope".into(),
        message: "not found".into(),
    };
    assert_eq!(exit_status(&err), None);
    assert_eq!(exit_status(&ProcessError::config("stdio", "bad")), None);
}

#[cfg(unix)]
mod unix {
    use clap::Parser;

    use crate::cli::{Cli, Command};
    use crate::cmd::run::{CANCELLED_STATUS, run_pipe_command, run_run_command};
    use crate::core::cancel::CancelToken;

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(args)
            .unwrap()
            .command
            .expect("subcommand")
    }

    #[tokio::test]
    async fn test_run_reports_exit_code() {
        let Command::Run(args) = parse(&["procflow", "run", "--", "exit", "4"]) else {
            panic!("expected run");
        };
        let status = run_run_command(&args, &CancelToken::new()).await.unwrap();
        assert_eq!(status, 4);
    }

    #[tokio::test]
    async fn test_run_nothrow_succeeds() {
        let Command::Run(args) = parse(&["procflow", "run", "--nothrow", "--", "exit", "4"]) else {
            panic!("expected run");
        };
        let status = run_run_command(&args, &CancelToken::new()).await.unwrap();
        assert_eq!(status, 0);
    }

    #[tokio::test]
    async fn test_run_timeout_is_cancelled() {
        let Command::Run(args) = parse(&["procflow", "run", "--timeout-ms", "100", "--", "sleep 5"])
        else {
            panic!("expected run");
        };
        let status = run_run_command(&args, &CancelToken::new()).await.unwrap();
        assert_eq!(status, CANCELLED_STATUS);
    }

    #[tokio::test]
    async fn test_run_cancelled_by_token() {
        let Command::Run(args) = parse(&["procflow", "run", "--", "sleep 5"]) else {
            panic!("expected run");
        };
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            trigger.cancel("interrupted");
        });
        let status = run_run_command(&args, &cancel).await.unwrap();
        assert_eq!(status, CANCELLED_STATUS);
    }

    #[tokio::test]
    async fn test_run_retries_until_success() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("seen");
        let line = format!(
            "test -f '{0}' || {{ touch '{0}'; exit 9; }}",
            marker.display()
        );
        let argv = ["procflow", "run", "--retries", "2", "--", line.as_str()];
        let Command::Run(args) = parse(&argv) else {
            panic!("expected run");
        };
        let status = run_run_command(&args, &CancelToken::new()).await.unwrap();
        assert_eq!(status, 0);
    }

    #[tokio::test]
    async fn test_run_bad_env_flag_is_error() {
        let Command::Run(args) = parse(&["procflow", "run", "-e", "NOEQUALS", "--", "true"]) else {
            panic!("expected run");
        };
        assert!(run_run_command(&args, &CancelToken::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_pipe_reports_first_failure() {
        let Command::Pipe(args) = parse(&["procflow", "pipe", "echo hi; exit 6", "cat"]) else {
            panic!("expected pipe");
        };
        let status = run_pipe_command(&args, &CancelToken::new()).await.unwrap();
        assert_eq!(status, 6);
    }

    #[tokio::test]
    async fn test_pipe_success() {
        let argv = ["procflow", "pipe", "printf 'b\\na\\n'", "sort", "head -n 1"];
        let Command::Pipe(args) = parse(&argv) else {
            panic!("expected pipe");
        };
        let status = run_pipe_command(&args, &CancelToken::new()).await.unwrap();
        assert_eq!(status, 0);
    }
}
