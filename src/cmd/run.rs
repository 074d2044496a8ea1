// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! `run` and `pipe` commands.
//!
//! ```text
//! run:  Command --spawn--> stdout --pipe_to--> terminal
//!       (retried on failure when --retries > 1)
//! pipe: cmd1 | cmd2 | ... | cmdN --pipe_to--> terminal
//!
//! stdin and stderr are inherited, Ctrl+C cancels the shared token.
//! ```

use std::time::Duration;

use crate::cli::run::{PipeArgs, PolicyArgs, RunArgs};
use crate::core::cancel::CancelToken;
use crate::core::command::Command;
use crate::core::policy::{PolicyOverride, StdioMode};
use crate::core::process::{ProcessHandle, ProcessOutput};
use crate::core::retry::{Backoff, retry};
use crate::error::{ProcessError, ProcessResult, Result};

/// Exit status reported after a cancellation, as for SIGINT.
pub const CANCELLED_STATUS: u8 = 130;

/// Runs one command line and returns the exit status to report.
///
/// # Errors
///
/// Returns an error for bad arguments or when the process cannot be
/// launched at all.
pub async fn run_run_command(args: &RunArgs, cancel: &CancelToken) -> Result<u8> {
    let layer = terminal_layer(&args.policy)?;
    let line = args.line();
    let backoff = Backoff::Fixed(Duration::from_millis(args.retry_delay_ms));

    let result = retry(args.retries, backoff, || {
        let command = Command::new(line.clone())
            .overrides(&layer)
            .signal(cancel.clone());
        async move {
            let handle = command.spawn()?;
            forward_to_stdout(&handle).await
        }
    })
    .await;

    settle(result)
}

/// Runs the command lines as a pipeline and returns the exit status of the
/// first failing stage.
///
/// # Errors
///
/// Returns an error for bad arguments or when a stage cannot be launched.
pub async fn run_pipe_command(args: &PipeArgs, cancel: &CancelToken) -> Result<u8> {
    let layer = terminal_layer(&args.policy)?;
    let mut lines = args.commands.iter();
    let Some(first) = lines.next() else {
        return Ok(0);
    };

    let mut tail = Command::new(first.clone())
        .overrides(&layer)
        .signal(cancel.clone())
        .spawn()?;
    for line in lines {
        tail = tail.pipe(Command::new(line.clone()).overrides(&layer))?;
    }

    settle(forward_to_stdout(&tail).await)
}

/// Maps a settlement error to a process exit status, or `None` for errors
/// that never produced one.
#[must_use]
pub fn exit_status(err: &ProcessError) -> Option<u8> {
    match err {
        ProcessError::Exit { code, .. } => {
            Some(u8::try_from(*code).ok().filter(|c| *c != 0).unwrap_or(1))
        }
        ProcessError::Cancelled { .. } => Some(CANCELLED_STATUS),
        ProcessError::Signal { signal, .. } => Some(signal_status(signal)),
        ProcessError::Spawn { .. } | ProcessError::Parse { .. } | ProcessError::Config { .. } => {
            None
        }
    }
}

#[cfg(unix)]
fn signal_status(signal: &str) -> u8 {
    crate::core::group::SignalName::parse(signal)
        .ok()
        .and_then(crate::core::group::SignalName::to_nix)
        .and_then(|s| u8::try_from(128 + s as i32).ok())
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn signal_status(_signal: &str) -> u8 {
    1
}

/// The call-site layer for terminal use: stderr goes straight to the
/// terminal while stdout is forwarded.
fn terminal_layer(args: &PolicyArgs) -> Result<PolicyOverride> {
    let mut layer = args.to_override()?;
    layer.stdout = Some(StdioMode::Pipe);
    layer.stderr = Some(StdioMode::Inherit);
    Ok(layer)
}

async fn forward_to_stdout(handle: &ProcessHandle) -> ProcessResult<ProcessOutput> {
    let mut stdout = tokio::io::stdout();
    handle.pipe_to(&mut stdout).await
}

fn settle<T>(result: ProcessResult<T>) -> Result<u8> {
    match result {
        Ok(_) => Ok(0),
        Err(err) => match exit_status(&err) {
            Some(status) => {
                eprintln!("Error: {err}");
                Ok(status)
            }
            None => Err(err.into()),
        },
    }
}
