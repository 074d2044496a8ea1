// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Command implementations.
//!
//! ```text
//! CLI args --> cmd::run_* handlers
//!   config (options, configs), run (run, pipe)
//! ```

pub mod config;
pub mod run;

#[cfg(test)]
mod tests;
