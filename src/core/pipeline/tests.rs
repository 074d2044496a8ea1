// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

#![cfg(unix)]

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::command::Command;
use crate::core::policy::StdioMode;
use crate::core::process::{Channel, ProcessHandle, Stage};
use crate::core::shell::ShellSetting;
use crate::error::ProcessError;

/// Fails the test instead of hanging when a pipeline never settles.
async fn bounded<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(10), future)
        .await
        .expect("pipeline did not settle within 10s")
}

fn assert_released(upstream: &ProcessHandle, err: &ProcessError, reader: &ProcessHandle) {
    let expected = format!("downstream process #{} stopped reading", reader.id());
    assert!(
        matches!(err, ProcessError::Cancelled { reason, .. } if *reason == expected),
        "stage #{} settled with {err:?}",
        upstream.id()
    );
    assert_eq!(err.signal(), Some("SIGTERM"));
}

#[tokio::test]
async fn test_two_stage_pipe() {
    let source = Command::new("printf hello").spawn().unwrap();
    let upper = source.pipe(Command::new("tr a-z A-Z")).unwrap();
    assert_eq!(upper.wait().await.unwrap(), "HELLO");
    assert_eq!(source.stage(), Stage::Fulfilled);
}

#[tokio::test]
async fn test_pipe_after_source_finished() {
    let source = Command::new("printf 'b\\na\\n'").spawn().unwrap();
    source.wait().await.unwrap();

    let sorted = source.pipe(Command::new("sort")).unwrap();
    assert_eq!(sorted.wait().await.unwrap().lines(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_pipe_stderr_only() {
    let source = Command::new("echo out; echo err 1>&2").spawn().unwrap();
    let counted = source.pipe_stderr(Command::new("cat")).unwrap();
    assert_eq!(counted.wait().await.unwrap(), "err");
    assert_eq!(source.wait().await.unwrap().channel_text(Channel::Stdout), "out\n");
}

#[tokio::test]
async fn test_abort_cancels_every_stage() {
    let first = Command::new("sleep 5").spawn().unwrap();
    let second = first.pipe(Command::new("cat")).unwrap();
    let third = second.pipe(Command::new("cat")).unwrap();

    second.abort("shutdown");

    for handle in [&first, &second, &third] {
        let err = handle.settled().await.unwrap_err();
        assert!(
            matches!(&err, ProcessError::Cancelled { reason, .. } if reason == "shutdown"),
            "stage #{} settled with {err:?}",
            handle.id()
        );
    }
    let err = third.wait().await.unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_failed_upstream_rejects_chain() {
    let tail = Command::new("echo partial; exit 7")
        .spawn()
        .unwrap()
        .pipe(Command::new("cat"))
        .unwrap();
    let err = tail.wait().await.unwrap_err();
    assert_eq!(err.exit_code(), Some(7));
    assert_eq!(err.output().map(ToString::to_string).as_deref(), Some("partial"));
}

#[tokio::test]
async fn test_failed_upstream_stops_slow_downstream() {
    let tail = Command::new("exit 2")
        .spawn()
        .unwrap()
        .pipe(Command::new("sleep 5"))
        .unwrap();
    let err = tail.settled().await.unwrap_err();
    assert!(matches!(
        &err,
        ProcessError::Cancelled { reason, .. } if reason.starts_with("upstream process #")
    ));
    assert_eq!(tail.wait().await.unwrap_err().exit_code(), Some(2));
}

#[tokio::test]
async fn test_nothrow_stage_does_not_reject_chain() {
    let tail = Command::new("echo kept; exit 3")
        .nothrow()
        .spawn()
        .unwrap()
        .pipe(Command::new("cat"))
        .unwrap();
    assert_eq!(tail.wait().await.unwrap(), "kept");
}

#[tokio::test]
async fn test_pipe_into_halted_handle() {
    let target = Command::new("wc -l").halt().spawn().unwrap();
    let source = Command::new("printf 'x\\ny\\n'").spawn().unwrap();

    let piped = source.pipe(&target).unwrap();
    assert_eq!(piped.id(), target.id());
    target.run();
    assert_eq!(target.wait().await.unwrap().to_string().trim(), "2");
}

#[tokio::test]
async fn test_pipe_into_running_piped_handle() {
    let target = Command::new("cat").stdin_mode(StdioMode::Pipe).spawn().unwrap();
    let source = Command::new("printf forwarded").spawn().unwrap();
    source.pipe(&target).unwrap();
    assert_eq!(target.wait().await.unwrap(), "forwarded");
}

#[tokio::test]
async fn test_pipe_into_started_handle_without_pipe_fails() {
    let target = Command::new("sleep 5").spawn().unwrap();
    let source = Command::new("echo x").spawn().unwrap();
    let err = source.pipe(&target).unwrap_err();
    assert!(matches!(err, ProcessError::Config { option: "stdio", .. }));
    target.abort("done");
    let _ = target.settled().await;
}

#[tokio::test]
async fn test_pipe_to_writer() {
    let mut sink: Vec<u8> = Vec::new();
    let output = Command::new("printf 'one\\ntwo\\n'")
        .spawn()
        .unwrap()
        .pipe_to(&mut sink)
        .await
        .unwrap();
    assert_eq!(sink, b"one\ntwo\n");
    assert_eq!(output.lines(), vec!["one", "two"]);
}

#[tokio::test]
async fn test_pipe_to_file_then_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    let mut file = tokio::fs::File::create(&path).await.unwrap();

    Command::new("echo saved")
        .spawn()
        .unwrap()
        .pipe_to_from(Channel::Combined, &mut file)
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "saved\n");
}

#[tokio::test]
async fn test_feed_reader_into_command() {
    let output = Command::new("tr a-z A-Z")
        .feed(&b"streamed"[..])
        .run()
        .await
        .unwrap();
    assert_eq!(output, "STREAMED");
}

#[tokio::test]
async fn test_timeout_on_one_stage_leaves_upstream() {
    let source = Command::new("printf data").spawn().unwrap();
    let slow = source
        .pipe(Command::new("cat; sleep 5").timeout(Duration::from_millis(100)))
        .unwrap();
    assert!(slow.wait().await.unwrap_err().is_cancelled());
    assert_eq!(source.wait().await.unwrap(), "data");
    assert_eq!(source.stage(), Stage::Fulfilled);
}

#[tokio::test]
async fn test_reader_exiting_early_releases_upstream() {
    let source = Command::new("yes").spawn().unwrap();
    let first = source.pipe(Command::new("head -n1")).unwrap();

    assert_eq!(bounded(first.wait()).await.unwrap(), "y");
    assert_eq!(first.stage(), Stage::Fulfilled);
    let err = bounded(source.settled()).await.unwrap_err();
    assert_released(&source, &err, &first);
}

#[tokio::test]
async fn test_failing_reader_rejects_chain_and_releases_upstream() {
    let source = Command::new("yes").spawn().unwrap();
    let tail = source.pipe(Command::new("exit 3")).unwrap();

    let err = bounded(tail.wait()).await.unwrap_err();
    assert_eq!(err.exit_code(), Some(3));
    let err = bounded(source.settled()).await.unwrap_err();
    assert_released(&source, &err, &tail);
}

#[tokio::test]
async fn test_reader_failing_to_spawn_releases_upstream() {
    let source = Command::new("yes").spawn().unwrap();
    let tail = source
        .pipe(Command::new("cat").shell(ShellSetting::Path(PathBuf::from("/no/such/shell"))))
        .unwrap();

    let err = bounded(tail.wait()).await.unwrap_err();
    assert!(matches!(err, ProcessError::Spawn { .. }), "{err:?}");
    assert!(bounded(source.settled()).await.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn test_release_walks_up_the_chain() {
    let source = Command::new("yes").spawn().unwrap();
    let middle = source.pipe(Command::new("cat")).unwrap();
    let first = middle.pipe(Command::new("head -n1")).unwrap();

    assert_eq!(bounded(first.wait()).await.unwrap(), "y");
    let err = bounded(middle.settled()).await.unwrap_err();
    assert_released(&middle, &err, &first);
    let err = bounded(source.settled()).await.unwrap_err();
    assert_released(&source, &err, &middle);
}

#[tokio::test]
async fn test_upstream_kept_while_another_reader_runs() {
    let source = Command::new("printf 'y\\ny\\ny\\n'; sleep 0.3").spawn().unwrap();
    let first = source.pipe(Command::new("head -n1")).unwrap();
    let all = source.pipe(Command::new("cat")).unwrap();

    assert_eq!(bounded(first.wait()).await.unwrap(), "y");
    assert_eq!(bounded(all.wait()).await.unwrap().lines(), vec!["y", "y", "y"]);
    assert_eq!(source.stage(), Stage::Fulfilled);
}
