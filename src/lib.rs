// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Library root.
//!
//! # Crate Architecture
//!
//! ```text
//!                        main.rs
//!                           |
//!                +----------+----------+
//!                v                     v
//!             cli (clap)          cmd (handlers)
//!                |               run / pipe
//!                +----------+----------+
//!                           v
//!              ,---------------------------,
//!              |          config           |
//!              |  TOML + env, [defaults]   |
//!              '-------------+-------------'
//!                            v
//!   +-----------------------------------------------+
//!   |  core   command -> process -> pipeline, retry  |
//!   |         policy, shell, stream, cancel, group   |
//!   +-----------------------------------------------+
//!   |  foundation   error, logging, utility          |
//!   +-----------------------------------------------+
//! ```
//!
//! # Example
//!
//! ```no_run
//! use procflow::core::command::Command;
//!
//! # async fn demo() -> procflow::error::ProcessResult<()> {
//! let words = Command::new("printf 'b\\na\\n'")
//!     .spawn()?
//!     .pipe(Command::new("sort"))?
//!     .await?;
//! assert_eq!(words.to_string(), "a\nb");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod cmd;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod utility;
