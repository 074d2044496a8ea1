// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Process handles: one spawned OS process as an awaitable state machine.
//!
//! ```text
//!            halt                 run()
//!  Halted ----------> (parked) ----------+
//!     |                                  v
//!     |  abort              Initial (resolving args, spawning)
//!     |                        |            |
//!     |                   spawn ok     spawn/render error, abort
//!     |                        v            |
//!     |                     Running         |
//!     |                    /      \         |
//!     |          exit 0 or        exit != 0, signal,
//!     |          nothrow          abort, timeout
//!     v                  v          v       v
//!  Rejected <------- Fulfilled   Rejected <-+
//!
//! Inner (Arc, shared by clones, the driver task and downstream links)
//!   stdout / stderr / combined : ReplayStream
//!   cancel : CancelToken (shared across a pipeline)
//!   local  : CancellationToken (timeout, upstream failure, reader gone;
//!            this stage only)
//!   result : OnceLock<ProcessResult<ProcessOutput>> (set once)
//! ```

mod handle;
mod io;
mod output;
mod runner;

pub use handle::ProcessHandle;
pub(crate) use io::InputSource;
pub use output::ProcessOutput;

/// Lifecycle stage of a process handle.
///
/// ```text
/// halt:     Halted --run()--> Initial --> Running --> Fulfilled | Rejected
/// default:                    Initial --> Running --> Fulfilled | Rejected
/// ```
///
/// `Initial` is not reserved for halted handles: every handle that is not
/// halted starts there and stays there while its arguments resolve and the
/// process spawns. `Running` means the process and its stdio relay are up.
/// Any non-terminal stage may settle as `Rejected` (cancel, spawn failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Created with `halt`; waiting for [`ProcessHandle::run`].
    Halted,
    /// Resolving arguments and spawning. Entered at creation, or from
    /// `Halted` on [`ProcessHandle::run`].
    Initial,
    /// The OS process is alive.
    Running,
    /// Settled successfully.
    Fulfilled,
    /// Settled with an error.
    Rejected,
}

impl Stage {
    /// Returns true for `Fulfilled` and `Rejected`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Fulfilled | Self::Rejected)
    }

    /// Returns true if the OS process has been (or is being) started.
    #[must_use]
    pub const fn is_started(self) -> bool {
        !matches!(self, Self::Halted)
    }

    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Halted, Self::Initial | Self::Rejected)
                | (Self::Initial, Self::Running | Self::Rejected)
                | (Self::Running, Self::Fulfilled | Self::Rejected)
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Halted => "halted",
            Self::Initial => "initial",
            Self::Running => "running",
            Self::Fulfilled => "fulfilled",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selectable output channel of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Channel {
    #[default]
    Stdout,
    Stderr,
    /// Both channels interleaved in arrival order.
    Combined,
}
