// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Utility modules.
//!
//! ```text
//! encoding
//!   Encoding::decode()  UTF-8 / UTF-16LE / any WHATWG label --> UTF-8
//!   LineBuffer          streaming splitter on an arbitrary delimiter
//! ```

pub mod encoding;
