// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Re-running fallible async operations with backoff.
//!
//! ```text
//! retry(3, Backoff::exponential(100ms, 1s), || cmd!(...)?.run())
//!
//!   attempt 1 --err--> `retry` event, sleep 100ms
//!   attempt 2 --err--> `retry` event, sleep 200ms
//!   attempt 3 --err--> return the last error
//!             --ok---> return immediately
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::logging::{LogEvent, LogKind, emit};

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// The same delay after every failure.
    Fixed(Duration),
    /// `base * 2^n`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// No delay between attempts.
    pub const NONE: Self = Self::Fixed(Duration::ZERO);

    #[must_use]
    pub const fn exponential(base: Duration, max: Duration) -> Self {
        Self::Exponential { base, max }
    }

    /// Delay after the failure of attempt `failed` (0-indexed).
    #[must_use]
    pub fn delay(&self, failed: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential { base, max } => base
                .checked_mul(2u32.saturating_pow(failed))
                .map_or(max, |delay| delay.min(max)),
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::exponential(Duration::from_millis(100), Duration::from_secs(5))
    }
}

/// Runs `operation` up to `attempts` times, sleeping per `backoff` between
/// failures. Zero attempts is treated as one.
///
/// # Errors
///
/// Returns the error of the last attempt.
pub async fn retry<T, E, F, Fut>(attempts: u32, backoff: Backoff, mut operation: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = attempts.max(1);
    let mut failed = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if failed + 1 >= attempts => return Err(e),
            Err(e) => {
                let delay = backoff.delay(failed);
                failed += 1;
                let message = format!(
                    "attempt {failed}/{attempts} failed, retrying in {}ms: {e}",
                    delay.as_millis()
                );
                emit(&LogEvent::new(LogKind::Retry, "retry", &message).loud());
                tokio::time::sleep(delay).await;
            }
        }
    }
}
