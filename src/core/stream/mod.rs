// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Multi-consumer byte stream with full replay.
//!
//! ```text
//!  OS pipe --(single reader task)--> ReplayStream::push(chunk)
//!                                         |
//!                       append-only log [c0, c1, c2, ...] + ended flag
//!                                         |
//!               watch<usize> version bump (subscribe/notify)
//!                 /                |                \
//!         Consumer#0 cursor   Consumer#1 cursor   Consumer#2 (attached after end)
//!          next() -> c0..      next() -> c0..      next() -> c0.. then None
//! ```
//!
//! Every consumer sees the full ordered history regardless of when it
//! attached. Chunks are never consumed exclusively and the log is kept in
//! full until the stream is dropped, trading memory for replay.

use futures_util::Stream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;

/// A shared, immutable chunk of output.
pub type Chunk = Arc<[u8]>;

#[derive(Debug, Default)]
struct Log {
    chunks: Vec<Chunk>,
    ended: bool,
}

#[derive(Debug)]
struct Shared {
    log: Mutex<Log>,
    /// Bumped on every push and on end
    version: watch::Sender<usize>,
    next_consumer: AtomicUsize,
}

/// Append-only chunk log fanned out to independent consumers.
///
/// Cloning yields another handle to the same log.
#[derive(Debug, Clone)]
pub struct ReplayStream {
    shared: Arc<Shared>,
}

impl Default for ReplayStream {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayStream {
    #[must_use]
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                log: Mutex::new(Log::default()),
                version,
                next_consumer: AtomicUsize::new(0),
            }),
        }
    }

    fn log(&self) -> std::sync::MutexGuard<'_, Log> {
        self.shared.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a chunk. Ignored once the stream has ended or if empty.
    pub fn push(&self, bytes: impl Into<Chunk>) {
        let chunk = bytes.into();
        if chunk.is_empty() {
            return;
        }
        {
            let mut log = self.log();
            if log.ended {
                return;
            }
            log.chunks.push(chunk);
        }
        self.shared.version.send_modify(|version| *version += 1);
    }

    /// Marks end-of-stream for all current and future consumers.
    pub fn end(&self) {
        {
            let mut log = self.log();
            if log.ended {
                return;
            }
            log.ended = true;
        }
        self.shared.version.send_modify(|version| *version += 1);
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.log().ended
    }

    /// Total bytes buffered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.log().chunks.iter().map(|chunk| chunk.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log().chunks.is_empty()
    }

    /// Concatenates the log as it stands now.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.log().chunks.concat()
    }

    /// Attaches a new consumer whose cursor starts at the first chunk.
    #[must_use]
    pub fn attach(&self) -> Consumer {
        Consumer {
            id: self.shared.next_consumer.fetch_add(1, Ordering::Relaxed),
            updates: self.shared.version.subscribe(),
            shared: Arc::clone(&self.shared),
            cursor: 0,
        }
    }
}

/// An independent reader of a [`ReplayStream`].
#[derive(Debug)]
pub struct Consumer {
    id: usize,
    shared: Arc<Shared>,
    cursor: usize,
    updates: watch::Receiver<usize>,
}

enum Step {
    Chunk(Chunk),
    Ended,
    Pending,
}

impl Consumer {
    /// Identifier unique within the owning stream.
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    fn poll_log(&mut self) -> Step {
        let log = self.shared.log.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(chunk) = log.chunks.get(self.cursor) {
            self.cursor += 1;
            Step::Chunk(Arc::clone(chunk))
        } else if log.ended {
            Step::Ended
        } else {
            Step::Pending
        }
    }

    /// Returns the next chunk, or `None` at end-of-stream.
    pub async fn next(&mut self) -> Option<Chunk> {
        loop {
            // Mark the current version seen before inspecting the log so that
            // a push racing with this check still wakes `changed()`.
            let _ = self.updates.borrow_and_update();
            match self.poll_log() {
                Step::Chunk(chunk) => return Some(chunk),
                Step::Ended => return None,
                Step::Pending => {
                    if self.updates.changed().await.is_err() {
                        // Sender gone: only the log remains
                        return match self.poll_log() {
                            Step::Chunk(chunk) => Some(chunk),
                            Step::Ended | Step::Pending => None,
                        };
                    }
                }
            }
        }
    }

    /// Converts the consumer into a `Stream` of chunks.
    pub fn into_stream(self) -> impl Stream<Item = Chunk> + Send + 'static {
        futures_util::stream::unfold(self, |mut consumer| async move {
            consumer.next().await.map(|chunk| (chunk, consumer))
        })
    }

    /// Reads until end-of-stream and returns the concatenated bytes.
    pub async fn read_to_end(mut self) -> Vec<u8> {
        let mut bytes = Vec::new();
        while let Some(chunk) = self.next().await {
            bytes.extend_from_slice(&chunk);
        }
        bytes
    }

    /// Copies every chunk into `writer` until end-of-stream.
    ///
    /// # Errors
    ///
    /// Returns the first write error.
    pub async fn copy_to<W>(mut self, writer: &mut W) -> std::io::Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut written = 0u64;
        while let Some(chunk) = self.next().await {
            writer.write_all(&chunk).await?;
            written += u64::try_from(chunk.len()).unwrap_or(u64::MAX);
        }
        writer.flush().await?;
        Ok(written)
    }
}
