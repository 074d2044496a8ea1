// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Signal names and process-group delivery.
//!
//! ```text
//! SignalName::parse("term" | "SIGTERM" | "TERM") --> SIGTERM
//!
//! ProcessGroup (leader pid == pgid, spawned with process_group(0))
//!   Unix:    killpg(pgid, sig)       ESRCH ignored (group already gone)
//!   Windows: SIGINT/SIGBREAK --> CTRL_BREAK_EVENT to the console group
//!            anything else   --> TerminateJobObject (KILL_ON_JOB_CLOSE job)
//! ```

#[cfg(windows)]
mod job;

#[cfg(windows)]
pub use job::JobObject;

use std::fmt;

use crate::error::{ProcessError, ProcessResult};

/// Names accepted by [`SignalName::parse`].
const KNOWN_SIGNALS: &[&str] = &[
    "SIGHUP", "SIGINT", "SIGQUIT", "SIGILL", "SIGTRAP", "SIGABRT", "SIGBUS", "SIGFPE", "SIGKILL",
    "SIGUSR1", "SIGSEGV", "SIGUSR2", "SIGPIPE", "SIGALRM", "SIGTERM", "SIGCHLD", "SIGCONT",
    "SIGSTOP", "SIGTSTP", "SIGTTIN", "SIGTTOU", "SIGURG", "SIGXCPU", "SIGXFSZ", "SIGVTALRM",
    "SIGPROF", "SIGWINCH", "SIGIO", "SIGSYS", "SIGBREAK",
];

/// A validated, canonical signal name (`"SIGTERM"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalName(&'static str);

impl SignalName {
    pub const SIGTERM: Self = Self("SIGTERM");
    pub const SIGKILL: Self = Self("SIGKILL");
    pub const SIGINT: Self = Self("SIGINT");

    /// Parses `"TERM"`, `"term"`, `"SIGTERM"` and the like.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Config` for unknown names.
    pub fn parse(name: &str) -> ProcessResult<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let wanted = if upper.starts_with("SIG") {
            upper
        } else {
            format!("SIG{upper}")
        };
        KNOWN_SIGNALS
            .iter()
            .find(|known| **known == wanted)
            .map(|known| Self(*known))
            .ok_or_else(|| ProcessError::config("signal", format!("unknown signal '{name}'")))
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }

    /// Converts to the `nix` signal, if the platform defines it.
    #[cfg(unix)]
    #[must_use]
    pub fn to_nix(self) -> Option<nix::sys::signal::Signal> {
        self.0.parse().ok()
    }

    /// Maps a raw signal number from an exit status to its name.
    #[cfg(unix)]
    #[must_use]
    pub fn from_raw(raw: i32) -> Option<Self> {
        let signal = nix::sys::signal::Signal::try_from(raw).ok()?;
        Self::parse(signal.as_str()).ok()
    }
}

impl fmt::Display for SignalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// The OS process group rooted at a spawned child.
#[derive(Debug)]
pub struct ProcessGroup {
    pid: u32,
    #[cfg(windows)]
    job: Option<JobObject>,
}

impl ProcessGroup {
    /// Wraps the group led by `pid`.
    ///
    /// On Windows the process is also placed in a Job Object so that the
    /// whole tree can be terminated. Failure to create the job is logged and
    /// leaves only console-group signalling available.
    #[must_use]
    pub fn attach(pid: u32) -> Self {
        #[cfg(windows)]
        {
            let job = JobObject::new()
                .and_then(|job| job.assign_pid(pid).map(|()| job))
                .inspect_err(|e| tracing::debug!(pid, error = %e, "job object unavailable"))
                .ok();
            Self { pid, job }
        }
        #[cfg(not(windows))]
        {
            Self { pid }
        }
    }

    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Delivers `signal` to every process in the group.
    ///
    /// A group that has already exited is not an error.
    ///
    /// # Errors
    ///
    /// Returns the OS error if delivery failed for any other reason.
    #[cfg(unix)]
    pub fn signal(&self, signal: SignalName) -> std::io::Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        let Some(sig) = signal.to_nix() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                format!("{signal} is not available on this platform"),
            ));
        };
        let pgid = Pid::from_raw(i32::try_from(self.pid).map_err(std::io::Error::other)?);
        match killpg(pgid, sig) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(std::io::Error::from(errno)),
        }
    }

    /// Delivers `signal` to every process in the group.
    ///
    /// # Errors
    ///
    /// Returns the OS error if delivery failed.
    #[cfg(windows)]
    pub fn signal(&self, signal: SignalName) -> std::io::Result<()> {
        if matches!(signal.as_str(), "SIGINT" | "SIGBREAK") {
            return send_ctrl_break(self.pid);
        }
        match &self.job {
            Some(job) => job.terminate(1).map_err(std::io::Error::other),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "no job object for process group",
            )),
        }
    }
}

/// Sends CTRL+BREAK to a console process group on Windows.
#[cfg(windows)]
fn send_ctrl_break(pid: u32) -> std::io::Result<()> {
    use windows::Win32::System::Console::{CTRL_BREAK_EVENT, GenerateConsoleCtrlEvent};

    // SAFETY: GenerateConsoleCtrlEvent is safe to call with any process group ID
    unsafe {
        GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid)
            .map_err(|e| std::io::Error::from_raw_os_error(e.code().0))
    }
}
