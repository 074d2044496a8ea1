// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! `run` and `pipe` command arguments.

use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::policy::PolicyOverride;
use crate::core::shell::ShellSetting;
use crate::error::Result;

/// Execution policy flags shared by `run` and `pipe`.
#[derive(Debug, Clone, Default, Args)]
pub struct PolicyArgs {
    /// Tolerate non-zero exit codes.
    #[arg(long)]
    pub nothrow: bool,

    /// Never echo commands and output to the log.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Echo commands and output to the log at info level.
    #[arg(long)]
    pub verbose: bool,

    /// Kill the process after this many milliseconds.
    #[arg(long = "timeout-ms", value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: Option<u64>,

    /// Signal sent on timeout (e.g. SIGTERM, INT).
    #[arg(long = "timeout-signal", value_name = "SIGNAL")]
    pub timeout_signal: Option<String>,

    /// Working directory.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Shell: a path, 'auto' or 'none'.
    #[arg(long, value_name = "SHELL")]
    pub shell: Option<String>,

    /// Sets an environment variable (KEY=VALUE). Can be repeated.
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE", action = clap::ArgAction::Append)]
    pub env: Vec<String>,
}

impl PolicyArgs {
    /// Builds the call-site policy layer. Unset flags stay unset so config
    /// defaults still apply.
    ///
    /// # Errors
    ///
    /// Returns an error for an `--env` value without `=`.
    pub fn to_override(&self) -> Result<PolicyOverride> {
        let mut layer = PolicyOverride {
            cwd: self.cwd.clone(),
            shell: self.shell.as_deref().map(ShellSetting::from_value),
            timeout: self.timeout_ms.map(Duration::from_millis),
            timeout_signal: self.timeout_signal.clone(),
            nothrow: self.nothrow.then_some(true),
            quiet: self.quiet.then_some(true),
            verbose: self.verbose.then_some(true),
            ..PolicyOverride::default()
        };
        for pair in &self.env {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("expected KEY=VALUE for --env, got '{pair}'"))?;
            layer.set_env(key, value);
        }
        Ok(layer)
    }
}

/// Runs one command line.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub policy: PolicyArgs,

    /// Total attempts before giving up.
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub retries: u32,

    /// Delay between attempts in milliseconds.
    #[arg(long = "retry-delay-ms", value_name = "MS", default_value_t = 0)]
    pub retry_delay_ms: u64,

    /// The command line, passed to the shell as one string.
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    pub command: Vec<String>,
}

impl RunArgs {
    /// The command words joined into one line.
    #[must_use]
    pub fn line(&self) -> String {
        self.command.join(" ")
    }
}

/// Pipes the stdout of each command into the next.
#[derive(Debug, Clone, Args)]
pub struct PipeArgs {
    #[command(flatten)]
    pub policy: PolicyArgs,

    /// Command lines, one per stage.
    #[arg(required = true, num_args = 1.., value_name = "COMMAND")]
    pub commands: Vec<String>,
}
