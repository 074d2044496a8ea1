// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration for the `procflow` binary.
//!
//! # Configuration Hierarchy
//!
//! ```text
//! Priority (low → high)
//! 1. built-in defaults
//! 2. procflow.toml (cwd, optional)
//! 3. --config FILE (repeatable)
//! 4. PROCFLOW_* env vars
//! 5. --set / CLI flags
//! ```
//!
//! # Environment Variable Mapping
//!
//! ```text
//! PROCFLOW_DEFAULTS__NOTHROW=true      → defaults.nothrow = true
//! PROCFLOW_DEFAULTS__TIMEOUT_MS=500    → defaults.timeout_ms = 500
//! PROCFLOW_LOG__LEVEL=4                → log.level = 4
//! ```
//!
//! # File Format
//!
//! ```toml
//! [defaults]
//! shell = "/bin/bash"
//! timeout_ms = 30000
//! timeout_signal = "SIGINT"
//!
//! [defaults.env]
//! LC_ALL = "C"
//!
//! [log]
//! level = 3
//! ```

pub mod loader;
pub mod types;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::core::policy::PolicyOverride;
use crate::error::{ConfigError, Result};

use loader::ConfigLoader;
use types::{DefaultsConfig, LogSection};

/// Default config file looked up in the working directory.
pub const DEFAULT_FILE: &str = "procflow.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "PROCFLOW";

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Process-wide execution defaults.
    pub defaults: DefaultsConfig,
    /// Logging options.
    pub log: LogSection,
}

impl Config {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use procflow::config::Config;
    ///
    /// let config = Config::builder()
    ///     .add_toml_file_optional("procflow.toml")
    ///     .with_env_prefix("PROCFLOW")
    ///     .build()?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    #[must_use]
    pub fn builder() -> ConfigLoader {
        ConfigLoader::new()
    }

    /// Load configuration from a single TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid TOML, or
    /// does not match the `Config` structure.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::builder().add_toml_file(path).build()
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not valid TOML or does not match the
    /// `Config` structure.
    pub fn parse(content: &str) -> Result<Self> {
        Self::builder().add_toml_str(content).build()
    }

    /// Checks every value that deserialization alone cannot.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending key.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.defaults.to_policy().map(drop)
    }

    /// The global policy layer described by `[defaults]`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending key.
    pub fn policy(&self) -> std::result::Result<PolicyOverride, ConfigError> {
        self.defaults.to_policy()
    }

    /// Format configuration options for display, one `key = value` per line
    /// in key order. Unset options are omitted.
    #[must_use]
    pub fn format_options(&self) -> Vec<String> {
        let mut options = BTreeMap::new();
        self.format_defaults_options(&mut options);
        self.format_log_options(&mut options);

        let max_key_len = options.keys().map(String::len).max().unwrap_or(0);

        options
            .into_iter()
            .map(|(key, value)| format!("{key:<max_key_len$} = {value}"))
            .collect()
    }

    fn format_defaults_options(&self, options: &mut BTreeMap<String, String>) {
        let defaults = &self.defaults;
        let mut put = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                options.insert(format!("defaults.{key}"), value);
            }
        };
        put("shell", defaults.shell.clone());
        put("prefix", defaults.prefix.clone());
        put("postfix", defaults.postfix.clone());
        put("quiet", defaults.quiet.map(|v| v.to_string()));
        put("verbose", defaults.verbose.map(|v| v.to_string()));
        put("nothrow", defaults.nothrow.map(|v| v.to_string()));
        put("timeout_ms", defaults.timeout_ms.map(|v| v.to_string()));
        put("timeout_signal", defaults.timeout_signal.clone());
        put("cwd", defaults.cwd.as_ref().map(|p| p.display().to_string()));
        put("delimiter", defaults.delimiter.as_ref().map(|d| format!("{d:?}")));
        for (key, value) in &defaults.env {
            put(&format!("env.{key}"), Some(value.clone()));
        }
    }

    fn format_log_options(&self, options: &mut BTreeMap<String, String>) {
        options.insert("log.level".into(), self.log.level.as_u8().to_string());
        options.insert(
            "log.file_level".into(),
            self.log.file_level.as_u8().to_string(),
        );
        if let Some(file) = &self.log.file {
            options.insert("log.file".into(), file.display().to_string());
        }
    }
}
