// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Immutable result of a settled process.
//!
//! ```text
//! ProcessOutput { stdout, stderr, combined, exit_code, signal, delimiter }
//!   text() / text_with(enc)   decode combined
//!   channel_text(Channel)     decode one channel
//!   lines() / lines_with(d)   split text, drop one trailing empty segment
//!   json::<T>()               serde_json over text(), Parse error on failure
//!   buffer() / blob()         raw combined bytes
//!   Display / PartialEq       combined minus exactly one trailing "\n" or "\r\n"
//! ```

use bon::Builder;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use super::Channel;
use crate::core::group::SignalName;
use crate::error::{ProcessError, ProcessResult};
use crate::utility::encoding::{Encoding, split_lines};

/// Captured output and exit metadata of one process.
#[derive(Debug, Clone, Default, Builder)]
pub struct ProcessOutput {
    #[builder(default)]
    stdout: Vec<u8>,
    #[builder(default)]
    stderr: Vec<u8>,
    /// Both channels interleaved in arrival order.
    #[builder(default)]
    combined: Vec<u8>,
    exit_code: Option<i32>,
    signal: Option<SignalName>,
    #[builder(default = "\n".to_string(), into)]
    delimiter: String,
}

/// Strips exactly one trailing line terminator.
fn trim_terminator(bytes: &[u8]) -> &[u8] {
    bytes
        .strip_suffix(b"\r\n")
        .or_else(|| bytes.strip_suffix(b"\n"))
        .unwrap_or(bytes)
}

impl ProcessOutput {
    #[must_use]
    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    #[must_use]
    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    #[must_use]
    pub fn combined(&self) -> &[u8] {
        &self.combined
    }

    /// Raw bytes of one channel.
    #[must_use]
    pub fn channel(&self, channel: Channel) -> &[u8] {
        match channel {
            Channel::Stdout => &self.stdout,
            Channel::Stderr => &self.stderr,
            Channel::Combined => &self.combined,
        }
    }

    /// Exit code, absent when the process was terminated by a signal.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Terminating signal, if any.
    #[must_use]
    pub const fn signal(&self) -> Option<SignalName> {
        self.signal
    }

    /// Returns true if the process exited with code 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }

    /// Combined output decoded as UTF-8.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        self.text_with(Encoding::Utf8)
    }

    /// Combined output decoded with `encoding`.
    #[must_use]
    pub fn text_with(&self, encoding: Encoding) -> Cow<'_, str> {
        encoding.decode(&self.combined)
    }

    /// One channel decoded as UTF-8.
    #[must_use]
    pub fn channel_text(&self, channel: Channel) -> Cow<'_, str> {
        Encoding::Utf8.decode(self.channel(channel))
    }

    /// Splits the combined text on the process delimiter.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines_with(&self.delimiter)
    }

    /// Splits the combined text on `delimiter`.
    #[must_use]
    pub fn lines_with(&self, delimiter: &str) -> Vec<String> {
        split_lines(&self.combined, delimiter, Encoding::Utf8)
    }

    /// Parses the combined text as JSON.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Parse` if the text is not well-formed.
    pub fn json<T: DeserializeOwned>(&self) -> ProcessResult<T> {
        serde_json::from_slice(&self.combined).map_err(|e| ProcessError::Parse {
            format: "json",
            message: e.to_string(),
        })
    }

    /// Combined bytes.
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.combined
    }

    /// Combined bytes as an owned, shareable blob.
    #[must_use]
    pub fn blob(&self) -> Arc<[u8]> {
        Arc::from(self.combined.as_slice())
    }

    /// Stderr formatted for error messages: empty, or a newline followed by
    /// the stderr text minus one trailing terminator.
    #[must_use]
    pub fn stderr_excerpt(&self) -> String {
        if self.stderr.is_empty() {
            return String::new();
        }
        format!("\n{}", String::from_utf8_lossy(trim_terminator(&self.stderr)))
    }

    fn trimmed(&self) -> &[u8] {
        trim_terminator(&self.combined)
    }
}

impl fmt::Display for ProcessOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.trimmed()))
    }
}

impl PartialEq for ProcessOutput {
    fn eq(&self, other: &Self) -> bool {
        self.trimmed() == other.trimmed()
    }
}

impl PartialEq<str> for ProcessOutput {
    fn eq(&self, other: &str) -> bool {
        self.trimmed() == other.as_bytes()
    }
}

impl PartialEq<&str> for ProcessOutput {
    fn eq(&self, other: &&str) -> bool {
        self.trimmed() == other.as_bytes()
    }
}

impl PartialEq<String> for ProcessOutput {
    fn eq(&self, other: &String) -> bool {
        self.trimmed() == other.as_bytes()
    }
}
