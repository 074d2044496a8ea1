// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! CLI module for procflow using clap derive.
//!
//! # Command Structure
//!
//! ```text
//! procflow [global options] <command>
//! version
//! options
//! configs
//! run  [policy flags] [--retries N] -- <command line>
//! pipe [policy flags] <command> <command> ...
//! ```

pub mod global;
pub mod run;


use crate::cli::global::GlobalOptions;
use crate::cli::run::{PipeArgs, RunArgs};
use clap::{Parser, Subcommand};

/// Async process orchestration.
///
/// Runs shell command lines and pipelines with timeouts, retries and
/// cancellation.
#[derive(Debug, Parser)]
#[command(
    name = "procflow",
    author,
    version,
    about = "Async process orchestration",
    long_about = "procflow Copyright (C) 2026 Romeo Ahmed\n\
                  This program comes with ABSOLUTELY NO WARRANTY\n\
                  This is free software, and you are welcome to redistribute it\n\
                  under certain conditions; see LICENSE for details.\n\n\
                  Runs command lines through a shell with timeouts, retries and\n\
                  cancellation, and connects them into pipelines. Do\n\
                  `procflow run -- <command line>` to run one command, or\n\
                  `procflow pipe <cmd> <cmd>...` to chain several.",
    after_help = "CONFIG FILES:\n\n\
                  procflow reads `procflow.toml` from the current directory if\n\
                  present, then every --config file in order. PROCFLOW_* variables\n\
                  (e.g. PROCFLOW_DEFAULTS__NOTHROW=true) and --set override both.\n\
                  Use --no-default-config to skip `procflow.toml`."
)]
pub struct Cli {
    /// Global options shared by all commands
    #[command(flatten)]
    pub global: GlobalOptions,

    /// Command to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shows the version.
    Version,

    /// Lists the effective configuration options.
    Options,

    /// Lists the config files used.
    Configs,

    /// Runs a command line.
    Run(RunArgs),

    /// Runs command lines as a pipeline.
    Pipe(PipeArgs),
}

/// Parses command-line arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

/// Parses command-line arguments from an iterator.
pub fn parse_from<I, T>(iter: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::parse_from(iter)
}

/// Tries to parse command-line arguments, returning an error on failure.
///
/// # Errors
///
/// Returns a `clap::Error` if the arguments are invalid or if help/version information
/// was requested.
pub fn try_parse() -> Result<Cli, clap::Error> {
    Cli::try_parse()
}
