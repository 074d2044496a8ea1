// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration sections.
//!
//! ```text
//! [defaults]  DefaultsConfig --to_policy()--> PolicyOverride (global layer)
//! [log]       LogSection     --log_config()-> LogConfig
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::group::SignalName;
use crate::core::policy::PolicyOverride;
use crate::core::shell::ShellSetting;
use crate::error::ConfigError;
use crate::logging::{LogConfig, LogLevel};

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        section: "defaults".to_string(),
        key: key.to_string(),
        message: message.into(),
    }
}

/// Process-wide execution defaults. Unset fields leave the built-in
/// default in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsConfig {
    /// `auto`, `none`, or a path to bash/sh/pwsh.
    pub shell: Option<String>,
    /// Prepended to every shell command line.
    pub prefix: Option<String>,
    /// Appended to every shell command line.
    pub postfix: Option<String>,
    pub quiet: Option<bool>,
    pub verbose: Option<bool>,
    /// Tolerate non-zero exit codes.
    pub nothrow: Option<bool>,
    pub timeout_ms: Option<u64>,
    /// Signal sent on timeout, e.g. `SIGTERM` or `KILL`.
    pub timeout_signal: Option<String>,
    pub cwd: Option<PathBuf>,
    /// Variables layered over the inherited environment.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Line delimiter used by `lines()`.
    pub delimiter: Option<String>,
}

impl DefaultsConfig {
    /// Converts to the global policy layer.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a zero timeout, an unknown
    /// signal, an empty delimiter or an empty shell.
    pub fn to_policy(&self) -> Result<PolicyOverride, ConfigError> {
        if self.timeout_ms == Some(0) {
            return Err(invalid("timeout_ms", "must be greater than zero"));
        }
        if let Some(signal) = &self.timeout_signal
            && SignalName::parse(signal).is_err()
        {
            return Err(invalid(
                "timeout_signal",
                format!("unknown signal '{signal}'"),
            ));
        }
        if self.delimiter.as_deref() == Some("") {
            return Err(invalid("delimiter", "must not be empty"));
        }
        if self.shell.as_deref().is_some_and(|shell| shell.trim().is_empty()) {
            return Err(invalid("shell", "use 'auto' or 'none' instead of an empty value"));
        }

        Ok(PolicyOverride {
            cwd: self.cwd.clone(),
            env: (!self.env.is_empty()).then(|| self.env.clone()),
            shell: self.shell.as_deref().map(ShellSetting::from_value),
            prefix: self.prefix.clone(),
            postfix: self.postfix.clone(),
            timeout: self.timeout_ms.map(Duration::from_millis),
            timeout_signal: self.timeout_signal.clone(),
            nothrow: self.nothrow,
            quiet: self.quiet,
            verbose: self.verbose,
            delimiter: self.delimiter.clone(),
            ..PolicyOverride::default()
        })
    }
}

/// Logging options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    /// Console log level (0-5).
    pub level: LogLevel,
    /// File log level (0-5).
    pub file_level: LogLevel,
    /// Log file path; no file logging when unset.
    pub file: Option<PathBuf>,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: LogLevel::INFO,
            file_level: LogLevel::TRACE,
            file: None,
        }
    }
}

impl LogSection {
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        LogConfig::builder()
            .with_console_level(self.level)
            .with_file_level(self.file_level)
            .maybe_with_log_file(self.file.as_ref().map(|p| p.display().to_string()))
            .build()
    }
}
