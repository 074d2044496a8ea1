// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Shared, idempotent cancellation token carrying an abort reason.
//!
//! ```text
//! CancelToken (Clone = same token)
//!   cancel("reason") --> first call wins, records reason, fires token
//!   cancel("again")  --> no-op, returns false
//!   cancelled().await  resolves once fired (subscribe/notify, no polling)
//! ```

use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

/// Reason reported when a token fires without an explicit one.
pub const DEFAULT_REASON: &str = "aborted";

/// Cancellation token shared by reference across pipeline stages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    token: CancellationToken,
    reason: Arc<OnceLock<String>>,
}

impl CancelToken {
    /// Creates a fresh, unfired token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing `tokio-util` token, e.g. one tied to Ctrl+C.
    #[must_use]
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            reason: Arc::default(),
        }
    }

    /// Fires the token. Returns `true` only for the call that fired it.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        let fired = self.reason.set(reason.into()).is_ok();
        self.token.cancel();
        fired
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns the abort reason (or [`DEFAULT_REASON`] if fired externally).
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        if !self.token.is_cancelled() {
            return None;
        }
        Some(self.reason.get().map_or(DEFAULT_REASON, String::as_str))
    }

    /// Resolves once the token fires.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Returns the underlying `tokio-util` token.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[cfg(test)]
mod tests;
