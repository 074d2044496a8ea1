// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Output relay and stdin feeding for a running child.
//!
//! ```text
//! ChildStdout --read 8K--> channel ReplayStream + combined ReplayStream
//!                  \--> LineBuffer --> stdout/stderr log events
//! (channel stream ends when its pipe hits EOF; combined ends after both)
//!
//! InputSource --> ChildStdin (write, then shutdown so the child sees EOF)
//!   Bytes    write_all
//!   Stream   replay consumer of an upstream stage
//!   Reader   tokio::io::copy
//! ```

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::ChildStdin;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core::stream::{Consumer, ReplayStream};
use crate::logging::{LogEvent, LogKind, emit};
use crate::utility::encoding::LineBuffer;

const READ_CHUNK: usize = 8 * 1024;

/// Where a process reads its stdin from.
pub(crate) enum InputSource {
    Bytes(Vec<u8>),
    Stream(Consumer),
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl std::fmt::Debug for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Stream(consumer) => write!(f, "Stream(#{})", consumer.id()),
            Self::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// How relayed lines are echoed to the log.
#[derive(Debug, Clone)]
pub(super) struct Echo {
    pub(super) kind: LogKind,
    pub(super) source: String,
    pub(super) delimiter: String,
    pub(super) verbose: bool,
    pub(super) quiet: bool,
}

impl Echo {
    fn emit_lines(&self, lines: impl Iterator<Item = String>) {
        for line in lines {
            emit(&LogEvent::new(self.kind, &self.source, &line).gated(self.verbose, self.quiet));
        }
    }
}

/// Spawns the single reader that drains one OS pipe into the replay logs.
pub(super) fn spawn_reader<R>(
    mut reader: R,
    channel: ReplayStream,
    combined: ReplayStream,
    echo: Echo,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = LineBuffer::new(&echo.delimiter);
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = &buf[..n];
                    channel.push(chunk);
                    combined.push(chunk);
                    lines.push(chunk);
                    echo.emit_lines(lines.drain(false));
                }
                Err(e) => {
                    warn!(
                        source = %echo.source,
                        stream = echo.kind.as_str(),
                        error = %e,
                        "error reading stream"
                    );
                    break;
                }
            }
        }
        echo.emit_lines(lines.drain(true));
        channel.end();
    })
}

/// Spawns the task that writes `source` into the child's stdin.
pub(super) fn spawn_feeder(
    source: InputSource,
    mut stdin: ChildStdin,
    label: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = match source {
            InputSource::Bytes(bytes) => stdin.write_all(&bytes).await.map(|()| bytes.len() as u64),
            InputSource::Stream(consumer) => consumer.copy_to(&mut stdin).await,
            InputSource::Reader(mut reader) => tokio::io::copy(&mut reader, &mut stdin).await,
        };
        match result {
            Ok(written) => debug!(process = %label, bytes = written, "stdin closed"),
            // The child may exit without draining its input
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!(process = %label, "stdin closed early by child");
            }
            Err(e) => warn!(process = %label, error = %e, "failed to write stdin"),
        }
        let _ = stdin.shutdown().await;
    })
}
