// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! The awaitable process handle.
//!
//! ```text
//! ProcessHandle::launch(template, policy, input, upstream)
//!   --> Inner { stage watch, replay streams, tokens, result slot }
//!   --> tokio::spawn(drive)              (see runner.rs)
//!
//! wait():   own settlement + every upstream settlement
//!           --> earliest-settled rejection in the chain, else own output
//!           (an upstream released by its reader is not a rejection)
//! settle(): record result, end streams, publish terminal stage
//!           --> release upstream still writing into a settled reader
//! abort():  once per handle: fire shared token, then abort every link
//! kill():   Running only: signal the process group
//! timeout(): timer task racing settlement; expiry fires the local token
//! ```

use futures_util::Stream;
use futures_util::future::BoxFuture;
use std::collections::VecDeque;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::process::ChildStdin;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::io::InputSource;
use super::{Channel, ProcessOutput, Stage};
use crate::core::cancel::CancelToken;
use crate::core::command::Template;
use crate::core::group::{ProcessGroup, SignalName};
use crate::core::policy::{Policy, StdioMode};
use crate::core::stream::{Consumer, ReplayStream};
use crate::error::{ProcessError, ProcessResult};
use crate::utility::encoding::LineBuffer;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);
static SETTLE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Policy and stdin source, frozen together when the driver starts.
#[derive(Debug)]
pub(super) struct Setup {
    pub(super) policy: Policy,
    pub(super) input: Option<InputSource>,
    pub(super) frozen: bool,
}

/// Why the stage-local token fired.
#[derive(Debug, Clone)]
pub(super) struct LocalCancel {
    pub(super) reason: String,
    pub(super) signal: SignalName,
    /// Set when the stage reading this one's output settled first.
    pub(super) released: bool,
}

#[derive(Debug)]
pub(super) struct Inner {
    pub(super) id: u64,
    pub(super) preview: String,
    pub(super) command_line: OnceLock<String>,
    pub(super) setup: Mutex<Setup>,
    pub(super) stage: watch::Sender<Stage>,
    pub(super) stdout: ReplayStream,
    pub(super) stderr: ReplayStream,
    pub(super) combined: ReplayStream,
    pub(super) pid: OnceLock<u32>,
    pub(super) group: Mutex<Option<ProcessGroup>>,
    pub(super) cancel: CancelToken,
    pub(super) local: CancellationToken,
    pub(super) local_reason: OnceLock<LocalCancel>,
    pub(super) aborted: AtomicBool,
    pub(super) stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    pub(super) result: OnceLock<ProcessResult<ProcessOutput>>,
    settle_seq: OnceLock<u64>,
    upstream: OnceLock<ProcessHandle>,
    source: OnceLock<Channel>,
    downstream: Mutex<Vec<Weak<Inner>>>,
}

impl Inner {
    pub(super) fn stream(&self, channel: Channel) -> &ReplayStream {
        match channel {
            Channel::Stdout => &self.stdout,
            Channel::Stderr => &self.stderr,
            Channel::Combined => &self.combined,
        }
    }
}

/// Awaitable handle to one spawned (or parked) process.
///
/// Clones share the same process. Awaiting the handle (or calling
/// [`wait`](Self::wait)) yields the settled [`ProcessOutput`].
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pub(super) inner: Arc<Inner>,
}

impl ProcessHandle {
    /// Creates the handle and starts its driver task.
    pub(crate) fn launch(
        template: Template,
        mut policy: Policy,
        input: Option<InputSource>,
        upstream: Option<(Self, Channel)>,
    ) -> Self {
        let cancel = policy.signal().cloned().unwrap_or_default();
        policy.set_signal(cancel.clone());
        let initial = if policy.halt() {
            Stage::Halted
        } else {
            Stage::Initial
        };
        let (stage, _) = watch::channel(initial);

        let inner = Arc::new(Inner {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            preview: template.preview(),
            command_line: OnceLock::new(),
            setup: Mutex::new(Setup {
                policy,
                input,
                frozen: false,
            }),
            stage,
            stdout: ReplayStream::new(),
            stderr: ReplayStream::new(),
            combined: ReplayStream::new(),
            pid: OnceLock::new(),
            group: Mutex::new(None),
            cancel,
            local: CancellationToken::new(),
            local_reason: OnceLock::new(),
            aborted: AtomicBool::new(false),
            stdin: tokio::sync::Mutex::new(None),
            result: OnceLock::new(),
            settle_seq: OnceLock::new(),
            upstream: OnceLock::new(),
            source: OnceLock::new(),
            downstream: Mutex::new(Vec::new()),
        });

        let handle = Self { inner };
        if let Some((upstream, channel)) = upstream {
            handle.link_upstream(&upstream, channel);
        }
        tokio::spawn(handle.clone().drive(template));
        handle
    }

    /// Process-unique handle id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// OS process id once spawned.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.inner.pid.get().copied()
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        *self.inner.stage.borrow()
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.stage().is_terminal()
    }

    /// The resolved command line, or the template text before resolution.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.inner
            .command_line
            .get()
            .cloned()
            .unwrap_or_else(|| self.inner.preview.clone())
    }

    /// Snapshot of the effective policy.
    #[must_use]
    pub fn policy(&self) -> Policy {
        self.setup().policy.clone()
    }

    /// The cancellation token shared with linked stages.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.inner.cancel
    }

    /// Upstream stage this handle reads from, if piped.
    #[must_use]
    pub fn upstream(&self) -> Option<&Self> {
        self.inner.upstream.get()
    }

    /// Records `upstream` as the stage feeding this handle from `channel`.
    ///
    /// Linking below an already rejected stage cancels this one at once.
    pub(crate) fn link_upstream(&self, upstream: &Self, channel: Channel) {
        if self.inner.upstream.set(upstream.clone()).is_err() {
            return;
        }
        let _ = self.inner.source.set(channel);
        upstream
            .inner
            .downstream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::downgrade(&self.inner));
        if matches!(upstream.inner.result.get(), Some(Err(_))) {
            self.cancel_local(
                format!("upstream process #{} failed", upstream.id()),
                SignalName::SIGTERM,
            );
        }
        if self.is_settled() {
            self.release_upstream();
        }
    }

    pub(super) fn setup(&self) -> std::sync::MutexGuard<'_, Setup> {
        self.inner
            .setup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Changes the policy of a handle that has not started yet.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Config` once the policy is frozen.
    pub fn update_policy(&self, update: impl FnOnce(&mut Policy)) -> ProcessResult<()> {
        let mut setup = self.setup();
        if setup.frozen {
            return Err(ProcessError::config(
                "policy",
                "policy is frozen once the process is running",
            ));
        }
        update(&mut setup.policy);
        Ok(())
    }

    /// Sets `nothrow` before the process starts.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Config` once the policy is frozen.
    pub fn set_nothrow(&self, nothrow: bool) -> ProcessResult<()> {
        self.update_policy(|policy| policy.set_nothrow(nothrow))
    }

    /// Sets `quiet` before the process starts.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Config` once the policy is frozen.
    pub fn set_quiet(&self, quiet: bool) -> ProcessResult<()> {
        self.update_policy(|policy| policy.set_quiet(quiet))
    }

    /// Sets `verbose` before the process starts.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Config` once the policy is frozen.
    pub fn set_verbose(&self, verbose: bool) -> ProcessResult<()> {
        self.update_policy(|policy| policy.set_verbose(verbose))
    }

    /// Attaches a stdin source to a halted handle.
    pub(crate) fn connect_input(&self, source: InputSource) -> ProcessResult<()> {
        let mut setup = self.setup();
        if setup.frozen || self.stage() != Stage::Halted {
            return Err(ProcessError::config(
                "stdio",
                "stdin can only be connected before the process starts",
            ));
        }
        if setup.input.is_some() || setup.policy.input().is_some() {
            return Err(ProcessError::config(
                "input",
                "stdin already has an input source",
            ));
        }
        if let Some(mode) = setup.policy.stdin()
            && mode != StdioMode::Pipe
        {
            return Err(ProcessError::config(
                "stdio",
                format!("cannot pipe into stdin configured as '{}'", mode.as_str()),
            ));
        }
        setup.input = Some(source);
        Ok(())
    }

    /// Feeds `bytes` to stdin of a halted handle.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Config` if the handle already started or
    /// stdin is not piped.
    pub fn stdin(&self, bytes: impl Into<Vec<u8>>) -> ProcessResult<()> {
        self.connect_input(InputSource::Bytes(bytes.into()))
    }

    /// Streams `reader` into stdin of a halted handle.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Config` if the handle already started or
    /// stdin is not piped.
    pub fn feed<R>(&self, reader: R) -> ProcessResult<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.connect_input(InputSource::Reader(Box::new(reader)))
    }

    /// Writes to the live stdin pipe of a process started with piped stdin
    /// and no other input source. Waits until the process is running.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Config` if no writable stdin exists.
    pub async fn write_stdin(&self, bytes: &[u8]) -> ProcessResult<()> {
        self.wait_started().await;
        let mut slot = self.inner.stdin.lock().await;
        let Some(stdin) = slot.as_mut() else {
            return Err(ProcessError::config(
                "stdio",
                "stdin is not an open pipe",
            ));
        };
        if let Err(e) = stdin.write_all(bytes).await {
            *slot = None;
            return Err(ProcessError::config("stdio", format!("stdin write failed: {e}")));
        }
        Ok(())
    }

    /// Closes the live stdin pipe so the child sees end-of-file.
    pub async fn close_stdin(&self) {
        self.wait_started().await;
        if let Some(mut stdin) = self.inner.stdin.lock().await.take() {
            let _ = stdin.shutdown().await;
        }
    }

    async fn wait_started(&self) {
        let mut stage = self.inner.stage.subscribe();
        let _ = stage
            .wait_for(|stage| matches!(stage, Stage::Running) || stage.is_terminal())
            .await;
    }

    /// Starts a halted handle. A no-op in every other stage.
    pub fn run(&self) -> &Self {
        self.inner.stage.send_if_modified(|stage| {
            if *stage == Stage::Halted {
                *stage = Stage::Initial;
                true
            } else {
                false
            }
        });
        self
    }

    /// A consumer replaying this process's stdout from the beginning.
    #[must_use]
    pub fn stdout(&self) -> Consumer {
        self.inner.stdout.attach()
    }

    /// A consumer replaying this process's stderr from the beginning.
    #[must_use]
    pub fn stderr(&self) -> Consumer {
        self.inner.stderr.attach()
    }

    /// A consumer replaying both channels in arrival order.
    #[must_use]
    pub fn combined(&self) -> Consumer {
        self.inner.combined.attach()
    }

    #[must_use]
    pub fn channel(&self, channel: Channel) -> Consumer {
        self.inner.stream(channel).attach()
    }

    /// Stdout split into lines on the policy delimiter as they arrive.
    pub fn lines(&self) -> impl Stream<Item = String> + Send + 'static {
        let buffer = LineBuffer::new(self.setup().policy.delimiter());
        let state = (self.stdout(), buffer, VecDeque::new(), false);
        futures_util::stream::unfold(
            state,
            |(mut consumer, mut buffer, mut ready, mut done)| async move {
                loop {
                    if let Some(line) = ready.pop_front() {
                        return Some((line, (consumer, buffer, ready, done)));
                    }
                    if done {
                        return None;
                    }
                    match consumer.next().await {
                        Some(chunk) => {
                            buffer.push(&chunk);
                            ready.extend(buffer.drain(false));
                        }
                        None => {
                            done = true;
                            ready.extend(buffer.drain(true));
                        }
                    }
                }
            },
        )
    }

    /// Sends `signal` to the process group. A no-op unless running.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Spawn` if delivery fails.
    pub fn kill(&self, signal: SignalName) -> ProcessResult<()> {
        if self.stage() != Stage::Running {
            return Ok(());
        }
        let group = self
            .inner
            .group
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(group) = group.as_ref() else {
            return Ok(());
        };
        debug!(process = self.id(), signal = %signal, "kill");
        group.signal(signal).map_err(|e| ProcessError::Spawn {
            command: self.command_line(),
            message: format!("failed to deliver {signal}: {e}"),
        })
    }

    /// Like [`kill`](Self::kill) with a signal name such as `"SIGINT"`.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Config` for unknown names.
    pub fn kill_with(&self, signal: &str) -> ProcessResult<()> {
        self.kill(SignalName::parse(signal)?)
    }

    /// Fires the shared cancellation token with `reason` and aborts every
    /// linked stage. Repeated calls are no-ops.
    pub fn abort(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.inner.aborted.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.cancel.cancel(reason.clone());

        let mut linked: Vec<Self> = self.downstream_handles();
        linked.extend(self.upstream().cloned());
        for handle in linked {
            handle.abort(reason.clone());
        }
    }

    fn downstream_handles(&self) -> Vec<Self> {
        self.inner
            .downstream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(Weak::upgrade)
            .map(|inner| Self { inner })
            .collect()
    }

    /// Cancels only this stage, terminating it with `signal`.
    pub(super) fn cancel_local(&self, reason: String, signal: SignalName) {
        self.cancel_local_with(LocalCancel {
            reason,
            signal,
            released: false,
        });
    }

    fn cancel_local_with(&self, cancel: LocalCancel) {
        if self.inner.local_reason.set(cancel).is_ok() {
            self.inner.local.cancel();
        }
    }

    /// Terminates the upstream stage once nothing reads its output any
    /// more, as a closed pipe would.
    ///
    /// Only applies while the channel this stage read from is still open,
    /// so an upstream that already finished writing settles on its own.
    fn release_upstream(&self) {
        let (Some(upstream), Some(channel)) = (self.upstream(), self.inner.source.get()) else {
            return;
        };
        if upstream.is_settled() || upstream.inner.stream(*channel).is_ended() {
            return;
        }
        let readers_left = upstream
            .downstream_handles()
            .iter()
            .any(|handle| !handle.is_settled());
        if readers_left {
            return;
        }
        debug!(
            process = upstream.id(),
            reader = self.id(),
            "releasing upstream after its reader settled"
        );
        upstream.cancel_local_with(LocalCancel {
            reason: format!("downstream process #{} stopped reading", self.id()),
            signal: SignalName::SIGTERM,
            released: true,
        });
    }

    /// Whether `err` is this stage's own release by its reader.
    fn is_release(&self, err: &ProcessError) -> bool {
        let Some(local) = self.inner.local_reason.get().filter(|local| local.released) else {
            return false;
        };
        !self.inner.aborted.load(Ordering::Acquire)
            && matches!(err, ProcessError::Cancelled { reason, .. } if *reason == local.reason)
    }

    /// Cancels downstream stages after this stage failed.
    pub(super) fn cancel_downstream(&self) {
        for handle in self.downstream_handles() {
            handle.cancel_local(
                format!("upstream process #{} failed", self.id()),
                SignalName::SIGTERM,
            );
        }
    }

    /// Kills the process with `signal` unless it settles within `duration`.
    pub fn timeout(&self, duration: Duration, signal: SignalName) -> &Self {
        let handle = self.clone();
        tokio::spawn(async move {
            let mut stage = handle.inner.stage.subscribe();
            tokio::select! {
                _ = stage.wait_for(|stage| stage.is_terminal()) => {}
                () = tokio::time::sleep(duration) => {
                    handle.cancel_local(
                        format!("timed out after {}ms", duration.as_millis()),
                        signal,
                    );
                }
            }
        });
        self
    }

    /// Records the settlement exactly once and notifies waiters.
    pub(super) fn settle(&self, result: ProcessResult<ProcessOutput>) {
        let next = if result.is_ok() {
            Stage::Fulfilled
        } else {
            Stage::Rejected
        };
        if self.inner.result.set(result).is_err() {
            return;
        }
        let _ = self
            .inner
            .settle_seq
            .set(SETTLE_SEQ.fetch_add(1, Ordering::AcqRel));
        self.inner.stdout.end();
        self.inner.stderr.end();
        self.inner.combined.end();
        self.inner
            .group
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // Any non-terminal stage may settle; the result slot guards re-entry
        self.inner.stage.send_if_modified(|stage| {
            if stage.is_terminal() {
                false
            } else {
                *stage = next;
                true
            }
        });
        self.release_upstream();
    }

    pub(super) fn transition(&self, next: Stage) -> bool {
        self.inner.stage.send_if_modified(|stage| {
            if stage.can_transition_to(next) {
                *stage = next;
                true
            } else {
                false
            }
        })
    }

    /// Waits for this handle alone to settle.
    pub async fn settled(&self) -> ProcessResult<ProcessOutput> {
        let mut stage = self.inner.stage.subscribe();
        let _ = stage.wait_for(|stage| stage.is_terminal()).await;
        self.inner.result.get().cloned().unwrap_or_else(|| {
            Err(ProcessError::Cancelled {
                command: self.command_line(),
                reason: "process was dropped before settling".to_string(),
                signal: None,
                output: Box::default(),
            })
        })
    }

    /// The await contract: settles with this stage's output, or with the
    /// earliest rejection among this stage and its upstream stages.
    ///
    /// An upstream stage terminated because every reader settled before it
    /// finished writing does not count as a rejection here, just as a shell
    /// ignores SIGPIPE in `yes | head -n1`.
    ///
    /// # Errors
    ///
    /// Returns the first (in settlement order) stage error of the chain.
    pub async fn wait(&self) -> ProcessResult<ProcessOutput> {
        let own = self.settled().await;

        let mut first_error: Option<(u64, ProcessError)> = own
            .as_ref()
            .err()
            .map(|e| (self.seq(), e.clone()));
        let mut stage = self.upstream().cloned();
        while let Some(handle) = stage {
            if let Err(e) = handle.settled().await
                && !handle.is_release(&e)
            {
                let seq = handle.seq();
                if first_error.as_ref().is_none_or(|(first, _)| seq < *first) {
                    first_error = Some((seq, e));
                }
            }
            stage = handle.upstream().cloned();
        }

        match first_error {
            Some((_, e)) => Err(e),
            None => own,
        }
    }

    fn seq(&self) -> u64 {
        self.inner.settle_seq.get().copied().unwrap_or(u64::MAX)
    }

    /// Waits for settlement and returns the exit code, if the process
    /// exited normally.
    pub async fn exit_code(&self) -> Option<i32> {
        match self.settled().await {
            Ok(output) => output.exit_code(),
            Err(e) => e.exit_code(),
        }
    }
}

impl IntoFuture for ProcessHandle {
    type Output = ProcessResult<ProcessOutput>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.wait().await })
    }
}

impl IntoFuture for &ProcessHandle {
    type Output = ProcessResult<ProcessOutput>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let handle = self.clone();
        Box::pin(async move { handle.wait().await })
    }
}
