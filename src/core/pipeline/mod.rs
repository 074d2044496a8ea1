// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Pipeline composition over replayable output channels.
//!
//! ```text
//! a.pipe(cmd_b)?.pipe(cmd_c)?        (like `a | b | c`)
//!
//!   a.stdout ReplayStream --consumer--> b.stdin
//!   b.stdout ReplayStream --consumer--> c.stdin
//!
//!   links:   c.upstream = b, b.upstream = a   (strong)
//!            a.downstream = [b], b.downstream = [c] (weak)
//!   cancel:  Command targets inherit a's CancelToken
//!            abort() on any stage walks every link
//!   failure: a rejected stage cancels its downstream stages;
//!            c.wait() rejects with the earliest-settled failure
//!   release: once every reader of a's channel settled while a is still
//!            writing, a gets SIGTERM (`yes | head -n1`); the chain
//!            does not count that cancellation as a failure
//!
//! a.pipe_to(&mut file).await     copy chunks, shutdown sink, wait
//! ```
//!
//! The consumer replays from the first chunk, so piping after the source
//! already finished still delivers its complete output.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::core::command::Command;
use crate::core::policy::StdioMode;
use crate::core::process::{Channel, InputSource, ProcessHandle, ProcessOutput, Stage};
use crate::error::{ProcessError, ProcessResult};

/// The receiving end of [`ProcessHandle::pipe`].
#[derive(Debug)]
pub enum PipeTarget {
    /// A command spawned with the piped channel as stdin.
    Command(Command),
    /// An existing handle: must be halted, or started with piped stdin.
    Handle(ProcessHandle),
}

impl From<Command> for PipeTarget {
    fn from(command: Command) -> Self {
        Self::Command(command)
    }
}

impl From<ProcessHandle> for PipeTarget {
    fn from(handle: ProcessHandle) -> Self {
        Self::Handle(handle)
    }
}

impl From<&ProcessHandle> for PipeTarget {
    fn from(handle: &ProcessHandle) -> Self {
        Self::Handle(handle.clone())
    }
}

impl ProcessHandle {
    /// Pipes stdout into `target` and returns the downstream handle.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Config` if the target's stdin cannot be
    /// connected.
    pub fn pipe(&self, target: impl Into<PipeTarget>) -> ProcessResult<Self> {
        self.pipe_from(Channel::Stdout, target)
    }

    /// Pipes stderr into `target` and returns the downstream handle.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Config` if the target's stdin cannot be
    /// connected.
    pub fn pipe_stderr(&self, target: impl Into<PipeTarget>) -> ProcessResult<Self> {
        self.pipe_from(Channel::Stderr, target)
    }

    /// Pipes the selected channel into `target`.
    ///
    /// Selecting a channel does not affect capture of the others.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Config` if the target's stdin cannot be
    /// connected.
    pub fn pipe_from(
        &self,
        channel: Channel,
        target: impl Into<PipeTarget>,
    ) -> ProcessResult<Self> {
        let source = InputSource::Stream(self.channel(channel));
        match target.into() {
            PipeTarget::Command(command) => command.launch(Some(source), Some((self, channel))),
            PipeTarget::Handle(target) => {
                if target.upstream().is_some() {
                    return Err(ProcessError::config(
                        "stdio",
                        format!("process #{} is already piped", target.id()),
                    ));
                }
                if target.stage() == Stage::Halted {
                    target.connect_input(source)?;
                } else if target.policy().stdin() == Some(StdioMode::Pipe) && !target.is_settled() {
                    forward(source, target.clone());
                } else {
                    return Err(ProcessError::config(
                        "stdio",
                        format!(
                            "process #{} already started without a piped stdin",
                            target.id()
                        ),
                    ));
                }
                target.link_upstream(self, channel);
                Ok(target)
            }
        }
    }

    /// Copies stdout into `sink`, shuts the sink down and waits.
    ///
    /// # Errors
    ///
    /// Returns the chain's settlement error. A sink write failure aborts
    /// the pipeline and surfaces as a cancellation.
    pub async fn pipe_to<W>(&self, sink: &mut W) -> ProcessResult<ProcessOutput>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.pipe_to_from(Channel::Stdout, sink).await
    }

    /// Copies the selected channel into `sink`, shuts it down and waits.
    ///
    /// # Errors
    ///
    /// Returns the chain's settlement error. A sink write failure aborts
    /// the pipeline and surfaces as a cancellation.
    pub async fn pipe_to_from<W>(
        &self,
        channel: Channel,
        sink: &mut W,
    ) -> ProcessResult<ProcessOutput>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let copied = self.channel(channel).copy_to(sink).await;
        let closed = sink.shutdown().await;
        if let Err(e) = copied.map(|_| ()).and(closed) {
            self.abort(format!("sink write failed: {e}"));
        }
        self.wait().await
    }
}

/// Forwards a replayed channel into the live stdin of a running target.
fn forward(source: InputSource, target: ProcessHandle) {
    let InputSource::Stream(mut consumer) = source else {
        return;
    };
    tokio::spawn(async move {
        while let Some(chunk) = consumer.next().await {
            if target.write_stdin(&chunk).await.is_err() {
                return;
            }
        }
        target.close_stdin().await;
    });
}

#[cfg(test)]
mod tests;
