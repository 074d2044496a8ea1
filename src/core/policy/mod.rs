// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Execution policy: layered overrides resolved into a frozen [`Policy`].
//!
//! ```text
//!   call override      (Command builder methods)
//!        | layer_over
//!   instance default   (Runner)
//!        | layer_over
//!   global default     (snapshot of DEFAULTS at Command construction)
//!        |
//!        v
//!   resolve() --> validate --> Policy
//!
//! Per key: first Some wins. env: maps merged one level, upper layer
//! replaces per key.
//!
//! Rejected: empty delimiter, zero timeout, unknown timeout signal,
//!           empty shell path, input with non-pipe stdin
//! ```

use bon::Builder;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{OnceLock, PoisonError, RwLock};
use std::time::Duration;

use crate::core::cancel::CancelToken;
use crate::core::group::SignalName;
use crate::core::shell::ShellSetting;
use crate::error::{ProcessError, ProcessResult};
use crate::logging::{LogEvent, LogKind, emit};

/// Environment overlay applied on top of the inherited environment.
pub type EnvMap = BTreeMap<String, String>;

/// How one standard stream of the child is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StdioMode {
    /// Captured through a pipe.
    #[default]
    Pipe,
    /// Shared with the parent.
    Inherit,
    /// Connected to the null device.
    Null,
}

impl StdioMode {
    /// Parses `"pipe"`, `"inherit"` or `"ignore"`/`"null"`.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Config` for anything else.
    pub fn parse(value: &str) -> ProcessResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pipe" => Ok(Self::Pipe),
            "inherit" => Ok(Self::Inherit),
            "ignore" | "null" => Ok(Self::Null),
            other => Err(ProcessError::config(
                "stdio",
                format!("unknown stdio mode '{other}'"),
            )),
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pipe => "pipe",
            Self::Inherit => "inherit",
            Self::Null => "ignore",
        }
    }
}

/// One layer of policy options. Every field is optional.
#[derive(Debug, Clone, Default, Builder)]
pub struct PolicyOverride {
    #[builder(into)]
    pub cwd: Option<PathBuf>,
    pub env: Option<EnvMap>,
    pub shell: Option<ShellSetting>,
    #[builder(into)]
    pub prefix: Option<String>,
    #[builder(into)]
    pub postfix: Option<String>,
    /// `None` at every layer means pipe when an input source exists,
    /// inherit otherwise.
    pub stdin: Option<StdioMode>,
    pub stdout: Option<StdioMode>,
    pub stderr: Option<StdioMode>,
    pub timeout: Option<Duration>,
    #[builder(into)]
    pub timeout_signal: Option<String>,
    pub signal: Option<CancelToken>,
    pub nothrow: Option<bool>,
    pub quiet: Option<bool>,
    pub verbose: Option<bool>,
    pub halt: Option<bool>,
    #[builder(into)]
    pub delimiter: Option<String>,
    #[builder(into)]
    pub input: Option<Vec<u8>>,
}

impl PolicyOverride {
    /// Returns `self` with unset keys taken from `base`.
    #[must_use]
    pub fn layer_over(&self, base: &Self) -> Self {
        let env = match (&self.env, &base.env) {
            (Some(upper), Some(lower)) => {
                let mut merged = lower.clone();
                merged.extend(upper.iter().map(|(k, v)| (k.clone(), v.clone())));
                Some(merged)
            }
            (upper, lower) => upper.clone().or_else(|| lower.clone()),
        };
        Self {
            cwd: self.cwd.clone().or_else(|| base.cwd.clone()),
            env,
            shell: self.shell.clone().or_else(|| base.shell.clone()),
            prefix: self.prefix.clone().or_else(|| base.prefix.clone()),
            postfix: self.postfix.clone().or_else(|| base.postfix.clone()),
            stdin: self.stdin.or(base.stdin),
            stdout: self.stdout.or(base.stdout),
            stderr: self.stderr.or(base.stderr),
            timeout: self.timeout.or(base.timeout),
            timeout_signal: self
                .timeout_signal
                .clone()
                .or_else(|| base.timeout_signal.clone()),
            signal: self.signal.clone().or_else(|| base.signal.clone()),
            nothrow: self.nothrow.or(base.nothrow),
            quiet: self.quiet.or(base.quiet),
            verbose: self.verbose.or(base.verbose),
            halt: self.halt.or(base.halt),
            delimiter: self.delimiter.clone().or_else(|| base.delimiter.clone()),
            input: self.input.clone().or_else(|| base.input.clone()),
        }
    }

    /// Sets one environment variable in this layer.
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env
            .get_or_insert_with(EnvMap::new)
            .insert(key.into(), value.into());
    }
}

/// Resolves the three layers into an effective policy.
///
/// # Errors
///
/// Returns a `ProcessError::Config` for contradictory or invalid options.
pub fn resolve(
    call: &PolicyOverride,
    instance: &PolicyOverride,
    global: &PolicyOverride,
) -> ProcessResult<Policy> {
    Policy::from_override(call.layer_over(&instance.layer_over(global)))
}

/// Effective, validated execution policy of one process.
#[derive(Debug, Clone)]
pub struct Policy {
    cwd: Option<PathBuf>,
    env: EnvMap,
    shell: ShellSetting,
    prefix: String,
    postfix: String,
    stdin: Option<StdioMode>,
    stdout: StdioMode,
    stderr: StdioMode,
    timeout: Option<Duration>,
    timeout_signal: SignalName,
    signal: Option<CancelToken>,
    nothrow: bool,
    quiet: bool,
    verbose: bool,
    halt: bool,
    delimiter: String,
    input: Option<Vec<u8>>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            cwd: None,
            env: EnvMap::new(),
            shell: ShellSetting::Auto,
            prefix: String::new(),
            postfix: String::new(),
            stdin: None,
            stdout: StdioMode::Pipe,
            stderr: StdioMode::Pipe,
            timeout: None,
            timeout_signal: SignalName::SIGTERM,
            signal: None,
            nothrow: false,
            quiet: false,
            verbose: false,
            halt: false,
            delimiter: "\n".to_string(),
            input: None,
        }
    }
}

impl Policy {
    /// Validates a fully layered override and fills defaults.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Config` for contradictory or invalid options.
    pub fn from_override(layered: PolicyOverride) -> ProcessResult<Self> {
        if layered.delimiter.as_deref() == Some("") {
            return Err(ProcessError::config("delimiter", "must not be empty"));
        }
        if layered.timeout == Some(Duration::ZERO) {
            return Err(ProcessError::config(
                "timeout",
                "must be greater than zero",
            ));
        }
        if let Some(ShellSetting::Path(path)) = &layered.shell
            && path.as_os_str().is_empty()
        {
            return Err(ProcessError::config("shell", "shell path must not be empty"));
        }
        if layered.input.is_some()
            && let Some(mode) = layered.stdin
            && mode != StdioMode::Pipe
        {
            return Err(ProcessError::config(
                "input",
                format!("stdin input requires a piped stdin, got '{}'", mode.as_str()),
            ));
        }
        let timeout_signal = layered
            .timeout_signal
            .as_deref()
            .map(SignalName::parse)
            .transpose()?
            .unwrap_or(SignalName::SIGTERM);

        let shell = layered.shell.unwrap_or_default();
        let prefix = layered
            .prefix
            .unwrap_or_else(|| shell.default_prefix().unwrap_or_default().to_string());

        Ok(Self {
            cwd: layered.cwd,
            env: layered.env.unwrap_or_default(),
            shell,
            prefix,
            postfix: layered.postfix.unwrap_or_default(),
            stdin: layered.stdin,
            stdout: layered.stdout.unwrap_or_default(),
            stderr: layered.stderr.unwrap_or_default(),
            timeout: layered.timeout,
            timeout_signal,
            signal: layered.signal,
            nothrow: layered.nothrow.unwrap_or(false),
            quiet: layered.quiet.unwrap_or(false),
            verbose: layered.verbose.unwrap_or(false),
            halt: layered.halt.unwrap_or(false),
            delimiter: layered.delimiter.unwrap_or_else(|| "\n".to_string()),
            input: layered.input,
        })
    }

    /// Converts back to a fully populated override layer.
    #[must_use]
    pub fn to_override(&self) -> PolicyOverride {
        PolicyOverride {
            cwd: self.cwd.clone(),
            env: Some(self.env.clone()),
            shell: Some(self.shell.clone()),
            prefix: Some(self.prefix.clone()),
            postfix: Some(self.postfix.clone()),
            stdin: self.stdin,
            stdout: Some(self.stdout),
            stderr: Some(self.stderr),
            timeout: self.timeout,
            timeout_signal: Some(self.timeout_signal.as_str().to_string()),
            signal: self.signal.clone(),
            nothrow: Some(self.nothrow),
            quiet: Some(self.quiet),
            verbose: Some(self.verbose),
            halt: Some(self.halt),
            delimiter: Some(self.delimiter.clone()),
            input: self.input.clone(),
        }
    }

    #[must_use]
    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    #[must_use]
    pub const fn env(&self) -> &EnvMap {
        &self.env
    }

    #[must_use]
    pub const fn shell(&self) -> &ShellSetting {
        &self.shell
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn postfix(&self) -> &str {
        &self.postfix
    }

    /// Stdin mode, with auto resolved against whether an input source exists.
    #[must_use]
    pub fn stdin_mode(&self, has_input: bool) -> StdioMode {
        self.stdin.unwrap_or(if has_input || self.input.is_some() {
            StdioMode::Pipe
        } else {
            StdioMode::Inherit
        })
    }

    /// Explicitly configured stdin mode, if any.
    #[must_use]
    pub const fn stdin(&self) -> Option<StdioMode> {
        self.stdin
    }

    #[must_use]
    pub const fn stdout(&self) -> StdioMode {
        self.stdout
    }

    #[must_use]
    pub const fn stderr(&self) -> StdioMode {
        self.stderr
    }

    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[must_use]
    pub const fn timeout_signal(&self) -> SignalName {
        self.timeout_signal
    }

    /// External cancellation token, if one was supplied.
    #[must_use]
    pub const fn signal(&self) -> Option<&CancelToken> {
        self.signal.as_ref()
    }

    #[must_use]
    pub const fn nothrow(&self) -> bool {
        self.nothrow
    }

    #[must_use]
    pub const fn quiet(&self) -> bool {
        self.quiet
    }

    #[must_use]
    pub const fn verbose(&self) -> bool {
        self.verbose
    }

    #[must_use]
    pub const fn halt(&self) -> bool {
        self.halt
    }

    #[must_use]
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    #[must_use]
    pub fn input(&self) -> Option<&[u8]> {
        self.input.as_deref()
    }

    /// Wraps a resolved command line in the policy's prefix and postfix.
    #[must_use]
    pub fn wrap_line(&self, line: &str) -> String {
        let mut wrapped =
            String::with_capacity(self.prefix.len() + line.len() + self.postfix.len() + 2);
        if !self.prefix.is_empty() {
            wrapped.push_str(&self.prefix);
            wrapped.push(' ');
        }
        wrapped.push_str(line);
        if !self.postfix.is_empty() {
            wrapped.push(' ');
            wrapped.push_str(&self.postfix);
        }
        wrapped
    }

    pub(crate) fn set_signal(&mut self, token: CancelToken) {
        self.signal = Some(token);
    }

    pub(crate) fn set_stdin(&mut self, mode: StdioMode) {
        self.stdin = Some(mode);
    }

    pub(crate) const fn set_nothrow(&mut self, nothrow: bool) {
        self.nothrow = nothrow;
    }

    pub(crate) fn set_timeout(&mut self, timeout: Duration, signal: SignalName) {
        self.timeout = Some(timeout);
        self.timeout_signal = signal;
    }

    pub(crate) const fn set_quiet(&mut self, quiet: bool) {
        self.quiet = quiet;
    }

    pub(crate) const fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }
}

// --- Process-wide defaults ---

static DEFAULTS: OnceLock<RwLock<PolicyOverride>> = OnceLock::new();

fn defaults_lock() -> &'static RwLock<PolicyOverride> {
    DEFAULTS.get_or_init(|| RwLock::new(PolicyOverride::default()))
}

/// Returns a snapshot of the process-wide default layer.
#[must_use]
pub fn defaults() -> PolicyOverride {
    defaults_lock()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Replaces the process-wide default layer.
pub fn set_defaults(defaults: PolicyOverride) {
    *defaults_lock()
        .write()
        .unwrap_or_else(PoisonError::into_inner) = defaults;
}

/// Mutates the process-wide default layer in place.
pub fn update_defaults(update: impl FnOnce(&mut PolicyOverride)) {
    update(
        &mut defaults_lock()
            .write()
            .unwrap_or_else(PoisonError::into_inner),
    );
}

/// Changes the default working directory for subsequently built commands.
///
/// Relative paths resolve against the current default (or the process
/// working directory).
///
/// # Errors
///
/// Returns a `ProcessError::Config` if `dir` is not a directory.
pub fn cd(dir: impl AsRef<Path>) -> ProcessResult<PathBuf> {
    let dir = dir.as_ref();
    let mut lock = defaults_lock()
        .write()
        .unwrap_or_else(PoisonError::into_inner);

    let base = match &lock.cwd {
        Some(cwd) => cwd.clone(),
        None => std::env::current_dir()
            .map_err(|e| ProcessError::config("cwd", e.to_string()))?,
    };
    let target = base.join(dir);
    if !target.is_dir() {
        return Err(ProcessError::config(
            "cwd",
            format!("'{}' is not a directory", target.display()),
        ));
    }
    lock.cwd = Some(target.clone());
    drop(lock);

    let message = target.display().to_string();
    emit(&LogEvent::new(LogKind::Cd, "defaults", &message).loud());
    Ok(target)
}

#[cfg(test)]
mod tests;
