// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Error handling module.
//!
//! ```text
//!            FlowError (~16 bytes)
//!                   |
//!    +--------+-----+-----+
//!    |        |     |     |
//!    v        v     v     v
//!  Config Process  Job    Io
//!   Box     Box    Box   Box
//!
//! ProcessError (settlement + construction, Clone):
//!   Spawn      executable / shell missing      (fatal, no retry)
//!   Exit       non-zero exit without nothrow   (carries output)
//!   Signal     terminated by a signal          (carries output)
//!   Cancelled  abort / timeout                 (carries reason)
//!   Parse      result formatter decode failure (local to the call)
//!   Config     contradictory policy options    (construction time)
//! ```

use thiserror::Error;

use crate::core::process::ProcessOutput;

/// Convenience alias for `anyhow::Result`, used by the binary layer.
pub type Result<T> = anyhow::Result<T>;

/// Result type using [`FlowError`].
pub type FlowResult<T> = std::result::Result<T, FlowError>;

/// Result type of the orchestration engine.
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;

/// Top-level application error type.
///
/// All sub-errors are boxed to keep this enum small on the stack.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] Box<ConfigError>),

    /// Process orchestration error.
    #[error("process error: {0}")]
    Process(#[from] Box<ProcessError>),

    /// Process-group error (Windows).
    #[error("job error: {0}")]
    Job(#[from] Box<JobError>),

    /// I/O error.
    #[error("io error: {0}")]
    Io(Box<std::io::Error>),
}

/// Macro to generate `From` implementations that box the source error.
macro_rules! impl_from_boxed {
    ($($error:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$error> for FlowError {
                fn from(err: $error) -> Self {
                    FlowError::$variant(Box::new(err))
                }
            }
        )+
    };
}

impl_from_boxed! {
    ConfigError => Config,
    ProcessError => Process,
    JobError => Job,
    std::io::Error => Io,
}

// --- Config Errors ---

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("invalid value for '{key}' in section '[{section}]': {message}")]
    InvalidValue {
        section: String,
        key: String,
        message: String,
    },
}

// --- Process Errors ---

/// Errors produced by the orchestration engine.
///
/// Every variant is `Clone`: a settled handle hands the same rejection to
/// each of its awaiters.
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    /// The executable or shell could not be started.
    #[error("failed to spawn '{command}': {message}")]
    Spawn { command: String, message: String },

    /// The process exited with a non-zero code and `nothrow` was not set.
    #[error("process '{command}' exited with code {code}{}", output.stderr_excerpt())]
    Exit {
        command: String,
        code: i32,
        output: Box<ProcessOutput>,
    },

    /// The process was terminated by a signal.
    #[error("process '{command}' was terminated by {signal}{}", output.stderr_excerpt())]
    Signal {
        command: String,
        signal: String,
        output: Box<ProcessOutput>,
    },

    /// The process was aborted or timed out.
    #[error("process '{command}' was cancelled: {reason}")]
    Cancelled {
        command: String,
        reason: String,
        signal: Option<String>,
        output: Box<ProcessOutput>,
    },

    /// A result formatter could not decode the captured output.
    #[error("failed to parse output as {format}: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    /// Contradictory or invalid execution policy.
    #[error("invalid option '{option}': {message}")]
    Config {
        option: &'static str,
        message: String,
    },
}

impl ProcessError {
    /// Creates a [`ProcessError::Config`].
    pub fn config(option: &'static str, message: impl Into<String>) -> Self {
        Self::Config {
            option,
            message: message.into(),
        }
    }

    /// Returns the captured output carried by settlement errors.
    #[must_use]
    pub fn output(&self) -> Option<&ProcessOutput> {
        match self {
            Self::Exit { output, .. }
            | Self::Signal { output, .. }
            | Self::Cancelled { output, .. } => Some(output),
            Self::Spawn { .. } | Self::Parse { .. } | Self::Config { .. } => None,
        }
    }

    /// Returns the exit code, if the process exited normally.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exit { code, .. } => Some(*code),
            _ => self.output().and_then(ProcessOutput::exit_code),
        }
    }

    /// Returns the signal name that terminated the process, if any.
    #[must_use]
    pub fn signal(&self) -> Option<&str> {
        match self {
            Self::Signal { signal, .. } => Some(signal),
            Self::Cancelled { signal, .. } => signal.as_deref(),
            _ => None,
        }
    }

    /// Returns true for abort and timeout rejections.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

// --- Job Object Errors (Windows) ---

/// Windows Job Object errors.
#[derive(Debug, Error)]
pub enum JobError {
    /// Failed to create a Job Object.
    #[error("failed to create job object")]
    CreateFailed(#[source] std::io::Error),

    /// Failed to configure a Job Object.
    #[error("failed to configure job object")]
    ConfigureFailed(#[source] std::io::Error),

    /// Failed to assign a process to a Job Object.
    #[error("failed to assign process (PID {pid}) to job")]
    AssignFailed {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    /// Failed to open a process for job assignment.
    #[error("failed to open process (PID {pid})")]
    OpenProcessFailed {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    /// Failed to terminate a Job Object.
    #[error("failed to terminate job")]
    TerminateFailed(#[source] std::io::Error),
}

#[cfg(test)]
mod tests;
