// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Orchestration engine.
//!
//! ```text
//!      command  ----- cmd!, Arg, Template, Runner
//!         |  resolve layers (policy) + shell quoting (shell)
//!         v
//!      process  ----- ProcessHandle state machine, driver, output
//!       |   |   \
//!       |   |    group   killpg / Job Object
//!       |   cancel       shared token with reason
//!       stream           replay log, one cursor per consumer
//!         |
//!      pipeline ----- pipe(), pipe_to(), chain settlement
//!
//!      retry    ----- re-run with backoff, `retry` events
//! ```

pub mod cancel;
pub mod command;
pub mod group;
pub mod pipeline;
pub mod policy;
pub mod process;
pub mod retry;
pub mod shell;
pub mod stream;
