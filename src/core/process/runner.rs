// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Driver task: start, spawn, relay, wait, settle.
//!
//! ```text
//! drive(template)
//!   Halted? wait for run() or cancel
//!   freeze policy + take input, arm policy timeout
//!   shell invocation  (Spawn error if no shell)
//!   render template   (races cancel / local cancel)
//!   build_command()   cwd, env overlay, stdio, own process group
//!   `cmd` event, spawn() --> pid, ProcessGroup
//!   readers + stdin feeder, then Initial -> Running
//!   select! (biased)
//!     cancel.cancelled()      SIGTERM group, grace, SIGKILL
//!     local.cancelled()       timeout/upstream signal, grace, SIGKILL
//!     child.wait()            natural exit
//!   join readers, end combined, build ProcessOutput
//!   decide:
//!     aborted      --> Cancelled(reason)       (overrides nothrow)
//!     local cancel --> Cancelled(reason, signal)
//!     signalled    --> Signal
//!     code != 0    --> Exit (unless nothrow)
//!     else         --> Fulfilled
//!   rejected --> cancel downstream stages
//!   upstream still writing, no reader left --> SIGTERM it (released)
//! ```

use std::process::{ExitStatus, Stdio};
use std::sync::PoisonError;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::handle::ProcessHandle;
use super::io::{Echo, InputSource, spawn_feeder, spawn_reader};
use super::{ProcessOutput, Stage};
use crate::core::command::Template;
use crate::core::group::{ProcessGroup, SignalName};
use crate::core::policy::{Policy, StdioMode};
use crate::core::shell::Invocation;
use crate::error::ProcessError;
use crate::logging::{LogEvent, LogKind, emit};

/// Time a signalled group gets to exit before SIGKILL.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// How the wait loop ended.
enum Ending {
    Exited,
    Aborted(String),
    Local { reason: String, signal: SignalName },
}

fn stdio(mode: StdioMode) -> Stdio {
    match mode {
        StdioMode::Pipe => Stdio::piped(),
        StdioMode::Inherit => Stdio::inherit(),
        StdioMode::Null => Stdio::null(),
    }
}

impl ProcessHandle {
    fn label(&self) -> String {
        format!("#{}", self.id())
    }

    fn cancelled_error(
        &self,
        reason: String,
        signal: Option<SignalName>,
        output: ProcessOutput,
    ) -> ProcessError {
        ProcessError::Cancelled {
            command: self.command_line(),
            reason,
            signal: signal.map(|s| s.as_str().to_string()),
            output: Box::new(output),
        }
    }

    fn abort_reason(&self) -> String {
        self.inner
            .cancel
            .reason()
            .unwrap_or(crate::core::cancel::DEFAULT_REASON)
            .to_string()
    }

    fn local_cancel(&self) -> (String, SignalName) {
        self.inner.local_reason.get().map_or_else(
            || ("cancelled".to_string(), SignalName::SIGTERM),
            |local| (local.reason.clone(), local.signal),
        )
    }

    /// Settles with a rejection before any process exists.
    fn reject_early(&self, error: ProcessError) {
        debug!(process = %self.label(), error = %error, "rejected before spawn");
        self.settle(Err(error));
        self.cancel_downstream();
    }

    /// Runs the whole lifecycle of the process.
    pub(super) async fn drive(self, template: Template) {
        if self.stage() == Stage::Halted {
            let mut stage = self.inner.stage.subscribe();
            tokio::select! {
                biased;
                () = self.inner.cancel.cancelled() => {
                    let error =
                        self.cancelled_error(self.abort_reason(), None, ProcessOutput::default());
                    self.reject_early(error);
                    return;
                }
                _ = stage.wait_for(|stage| *stage != Stage::Halted) => {}
            }
        }
        if self.is_settled() {
            return;
        }

        let (policy, input) = {
            let mut setup = self.setup();
            setup.frozen = true;
            (setup.policy.clone(), setup.input.take())
        };
        if let Some(timeout) = policy.timeout() {
            self.timeout(timeout, policy.timeout_signal());
        }

        let invocation = match policy.shell().invocation() {
            Ok(invocation) => invocation,
            Err(e) => return self.reject_early(e),
        };

        let rendered = tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => Err(self.cancelled_error(
                self.abort_reason(), None, ProcessOutput::default(),
            )),
            () = self.inner.local.cancelled() => {
                let (reason, signal) = self.local_cancel();
                Err(self.cancelled_error(reason, Some(signal), ProcessOutput::default()))
            }
            line = template.render(&invocation) => line,
        };
        let line = match rendered {
            Ok(line) if line.trim().is_empty() => {
                return self.reject_early(ProcessError::Spawn {
                    command: line,
                    message: "empty command line".to_string(),
                });
            }
            Ok(line) => line,
            Err(e) => return self.reject_early(e),
        };
        let _ = self.inner.command_line.set(line.clone());

        let full_line = match invocation {
            Invocation::Shell { .. } => policy.wrap_line(&line),
            Invocation::Direct => line.clone(),
        };
        let mut command = match build_command(&invocation, &full_line, &policy, input.is_some()) {
            Ok(command) => command,
            Err(e) => return self.reject_early(e),
        };

        let label = self.label();
        if let Some(cwd) = policy.cwd() {
            let cwd = cwd.display().to_string();
            emit(&LogEvent::new(LogKind::Cd, &label, &cwd).gated(policy.verbose(), policy.quiet()));
        }
        emit(&LogEvent::new(LogKind::Cmd, &label, &line).gated(policy.verbose(), policy.quiet()));

        if self.inner.cancel.is_cancelled() {
            let error = self.cancelled_error(self.abort_reason(), None, ProcessOutput::default());
            return self.reject_early(error);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return self.reject_early(ProcessError::Spawn {
                    command: line,
                    message: e.to_string(),
                });
            }
        };

        if let Some(pid) = child.id() {
            let _ = self.inner.pid.set(pid);
            *self
                .inner
                .group
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(ProcessGroup::attach(pid));
        }
        trace!(process = %self.label(), pid = ?child.id(), "spawned");

        // Stdin slot is filled before writers can observe Running
        let relay = self.start_relay(child_io(&mut child), &policy, input).await;
        self.transition(Stage::Running);
        let (status, ending) = self.wait_child(&mut child).await;
        self.finish(relay, status, ending, &policy).await;
    }

    /// Starts the output readers and the stdin feeder.
    async fn start_relay(
        &self,
        io: ChildIo,
        policy: &Policy,
        input: Option<InputSource>,
    ) -> Relay {
        let echo = |kind| Echo {
            kind,
            source: self.label(),
            delimiter: policy.delimiter().to_string(),
            verbose: policy.verbose(),
            quiet: policy.quiet(),
        };

        let mut readers = Vec::with_capacity(2);
        match io.stdout {
            Some(stdout) => readers.push(spawn_reader(
                stdout,
                self.inner.stdout.clone(),
                self.inner.combined.clone(),
                echo(LogKind::Stdout),
            )),
            None => self.inner.stdout.end(),
        }
        match io.stderr {
            Some(stderr) => readers.push(spawn_reader(
                stderr,
                self.inner.stderr.clone(),
                self.inner.combined.clone(),
                echo(LogKind::Stderr),
            )),
            None => self.inner.stderr.end(),
        }

        let mut feeder = None;
        if let Some(stdin) = io.stdin {
            let source =
                input.or_else(|| policy.input().map(|bytes| InputSource::Bytes(bytes.to_vec())));
            match source {
                Some(source) => feeder = Some(spawn_feeder(source, stdin, self.label())),
                None => *self.inner.stdin.lock().await = Some(stdin),
            }
        }
        Relay { readers, feeder }
    }

    /// Waits for exit, abort or local cancellation.
    async fn wait_child(&self, child: &mut Child) -> (std::io::Result<ExitStatus>, Ending) {
        tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => {
                let reason = self.abort_reason();
                warn!(process = %self.label(), reason = %reason, "aborting process");
                (self.terminate(child, SignalName::SIGTERM).await, Ending::Aborted(reason))
            }
            () = self.inner.local.cancelled() => {
                let (reason, signal) = self.local_cancel();
                warn!(
                    process = %self.label(), reason = %reason, signal = %signal,
                    "terminating process"
                );
                (self.terminate(child, signal).await, Ending::Local { reason, signal })
            }
            status = child.wait() => (status, Ending::Exited),
        }
    }

    /// Signals the group, then escalates to SIGKILL after a grace period.
    async fn terminate(
        &self,
        child: &mut Child,
        signal: SignalName,
    ) -> std::io::Result<ExitStatus> {
        if let Err(e) = self.kill(signal) {
            debug!(process = %self.label(), error = %e, "signal failed, will force kill");
        }
        match tokio::time::timeout(KILL_GRACE, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                let _ = self.kill(SignalName::SIGKILL);
                child.kill().await.ok();
                child.wait().await
            }
        }
    }

    /// Joins the relay, builds the output and settles.
    async fn finish(
        &self,
        relay: Relay,
        status: std::io::Result<ExitStatus>,
        ending: Ending,
        policy: &Policy,
    ) {
        for reader in relay.readers {
            let _ = reader.await;
        }
        if let Some(feeder) = relay.feeder {
            feeder.abort();
        }
        self.inner.stdin.lock().await.take();
        self.inner.combined.end();

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                self.settle(Err(ProcessError::Spawn {
                    command: self.command_line(),
                    message: format!("failed waiting for process: {e}"),
                }));
                self.cancel_downstream();
                return;
            }
        };

        let output = ProcessOutput::builder()
            .stdout(self.inner.stdout.snapshot())
            .stderr(self.inner.stderr.snapshot())
            .combined(self.inner.combined.snapshot())
            .maybe_exit_code(status.code())
            .maybe_signal(exit_signal(status))
            .delimiter(policy.delimiter())
            .build();
        let command = self.command_line();

        let result = match ending {
            Ending::Aborted(reason) => {
                Err(self.cancelled_error(reason, Some(SignalName::SIGTERM), output))
            }
            Ending::Local { reason, signal } => {
                Err(self.cancelled_error(reason, Some(signal), output))
            }
            Ending::Exited => match (output.signal(), output.exit_code()) {
                (Some(signal), _) => Err(ProcessError::Signal {
                    command,
                    signal: signal.as_str().to_string(),
                    output: Box::new(output),
                }),
                (None, Some(code)) if code != 0 && !policy.nothrow() => Err(ProcessError::Exit {
                    command,
                    code,
                    output: Box::new(output),
                }),
                _ => Ok(output),
            },
        };

        trace!(process = %self.label(), ok = result.is_ok(), "settled");
        let rejected = result.is_err();
        self.settle(result);
        if rejected {
            self.cancel_downstream();
        }
    }
}

/// Tasks relaying the child's stdio.
struct Relay {
    readers: Vec<JoinHandle<()>>,
    feeder: Option<JoinHandle<()>>,
}

/// The child's pipes, taken once after spawn.
struct ChildIo {
    stdin: Option<tokio::process::ChildStdin>,
    stdout: Option<tokio::process::ChildStdout>,
    stderr: Option<tokio::process::ChildStderr>,
}

fn child_io(child: &mut Child) -> ChildIo {
    ChildIo {
        stdin: child.stdin.take(),
        stdout: child.stdout.take(),
        stderr: child.stderr.take(),
    }
}

#[cfg(unix)]
fn exit_signal(status: ExitStatus) -> Option<SignalName> {
    use std::os::unix::process::ExitStatusExt;
    status.signal().and_then(SignalName::from_raw)
}

#[cfg(not(unix))]
const fn exit_signal(_status: ExitStatus) -> Option<SignalName> {
    None
}

/// Builds the tokio Command for a resolved line.
fn build_command(
    invocation: &Invocation,
    line: &str,
    policy: &Policy,
    has_input: bool,
) -> Result<Command, ProcessError> {
    let (program, args) = invocation.argv(line)?;
    let mut command = Command::new(program);
    command.args(args);

    if let Some(cwd) = policy.cwd() {
        command.current_dir(cwd);
    }
    command.envs(policy.env());

    command.stdin(stdio(policy.stdin_mode(has_input)));
    command.stdout(stdio(policy.stdout()));
    command.stderr(stdio(policy.stderr()));

    command.kill_on_drop(true);

    // Own process group so signals reach descendants
    #[cfg(unix)]
    command.process_group(0);

    #[cfg(windows)]
    command.creation_flags(windows::Win32::System::Threading::CREATE_NEW_PROCESS_GROUP.0);

    Ok(command)
}
