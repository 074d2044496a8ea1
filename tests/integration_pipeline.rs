// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Integration tests for processes and pipelines.
//!
//! Drives the public API the way a script would: templates, awaitable
//! handles, replayed output and chained stages.

#![cfg(unix)]

use std::time::Duration;

use futures_util::StreamExt;
use procflow::cmd;
use procflow::core::cancel::CancelToken;
use procflow::core::command::{Command, Runner};
use procflow::core::policy::PolicyOverride;
use procflow::core::process::{Channel, Stage};
use procflow::core::retry::{Backoff, retry};
use procflow::error::ProcessError;

// =============================================================================
// Templates
// =============================================================================

#[tokio::test]
async fn template_quotes_arguments() {
    let name = "it's a test";
    let output = cmd!("printf '%s' {}", name).unwrap().run().await.unwrap();
    assert_eq!(output, "it's a test");
}

#[tokio::test]
async fn template_list_expands_to_words() {
    let files = vec!["one", "two words"];
    let output = cmd!("printf '[%s]' {}", files).unwrap().run().await.unwrap();
    assert_eq!(output, "[one][two words]");
}

#[tokio::test]
async fn template_accepts_a_running_process() {
    let inner = Command::new("printf inner").spawn().unwrap();
    let output = cmd!("echo outer {}", inner).unwrap().await.unwrap();
    assert_eq!(output, "outer inner");
}

// =============================================================================
// Handles
// =============================================================================

#[tokio::test]
async fn handle_output_is_replayed() {
    let handle = Command::new("printf 'a\\nb\\nc\\n'").spawn().unwrap();
    handle.wait().await.unwrap();

    let lines: Vec<String> = handle.lines().collect().await;
    assert_eq!(lines, vec!["a", "b", "c"]);
    assert_eq!(handle.stdout().read_to_end().await, b"a\nb\nc\n");
    assert_eq!(handle.stage(), Stage::Fulfilled);
}

#[tokio::test]
async fn handle_reports_exit_code() {
    let err = Command::new("echo bad >&2; exit 5").run().await.unwrap_err();
    assert_eq!(err.exit_code(), Some(5));
    assert_eq!(
        err.output().map(|o| o.channel_text(Channel::Stderr).into_owned()),
        Some("bad\n".to_string())
    );
}

#[tokio::test]
async fn handle_timeout_rejects_as_cancelled() {
    let err = Command::new("sleep 5")
        .timeout(Duration::from_millis(100))
        .run()
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.signal(), Some("SIGTERM"));
}

#[tokio::test]
async fn external_token_aborts_process() {
    let token = CancelToken::new();
    let handle = Command::new("sleep 5").signal(token.clone()).spawn().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel("deploy aborted");

    let err = handle.wait().await.unwrap_err();
    assert!(matches!(
        err,
        ProcessError::Cancelled { ref reason, .. } if reason == "deploy aborted"
    ));
}

#[tokio::test]
async fn runner_shares_instance_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let mut layer = PolicyOverride {
        cwd: Some(dir.path().to_path_buf()),
        ..PolicyOverride::default()
    };
    layer.set_env("STAGE", "ci");
    let runner = Runner::new(layer);

    runner.command("echo $STAGE > stage.txt").run().await.unwrap();
    let output = runner.command("cat stage.txt").run().await.unwrap();
    assert_eq!(output, "ci");
}

// =============================================================================
// Pipelines
// =============================================================================

#[tokio::test]
async fn pipeline_of_three_stages() {
    let output = Command::new("printf 'pear\\napple\\npear\\n'")
        .spawn()
        .unwrap()
        .pipe(Command::new("sort"))
        .unwrap()
        .pipe(Command::new("uniq -c"))
        .unwrap()
        .await
        .unwrap();
    let counts: Vec<String> = output
        .lines()
        .iter()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect();
    assert_eq!(counts, vec!["1 apple", "2 pear"]);
}

#[tokio::test]
async fn pipeline_reports_the_first_failure() {
    let err = Command::new("printf data; exit 3")
        .spawn()
        .unwrap()
        .pipe(Command::new("cat"))
        .unwrap()
        .wait()
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), Some(3));
}

#[tokio::test]
async fn pipeline_abort_reaches_every_stage() {
    let head = Command::new("sleep 5").spawn().unwrap();
    let tail = head.pipe(Command::new("sleep 5")).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    tail.abort("stop");

    assert!(head.wait().await.unwrap_err().is_cancelled());
    assert!(tail.wait().await.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn pipeline_reader_stops_early() {
    let tail = Command::new("yes")
        .spawn()
        .unwrap()
        .pipe(Command::new("head -n2"))
        .unwrap();
    let output = tokio::time::timeout(Duration::from_secs(10), tail.wait())
        .await
        .expect("pipeline did not settle")
        .unwrap();
    assert_eq!(output.lines(), vec!["y", "y"]);
}

#[tokio::test]
async fn pipeline_reader_fails_before_writer_finishes() {
    let head = Command::new("yes").spawn().unwrap();
    let tail = head.pipe(Command::new("read line; exit 5")).unwrap();
    let err = tokio::time::timeout(Duration::from_secs(10), tail.wait())
        .await
        .expect("pipeline did not settle")
        .unwrap_err();
    assert_eq!(err.exit_code(), Some(5));
    assert_eq!(head.stage(), Stage::Rejected);
}

#[tokio::test]
async fn pipe_to_writer() {
    let mut sink = Vec::new();
    Command::new("echo to sink")
        .spawn()
        .unwrap()
        .pipe_to(&mut sink)
        .await
        .unwrap();
    assert_eq!(sink, b"to sink\n");
}

// =============================================================================
// Retry
// =============================================================================

#[tokio::test]
async fn retry_gives_up_after_attempts() {
    let err = retry(2, Backoff::Fixed(Duration::from_millis(1)), || {
        Command::new("exit 1").quiet().run()
    })
    .await
    .unwrap_err();
    assert_eq!(err.exit_code(), Some(1));
}
