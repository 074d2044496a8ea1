// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::CancelToken;

#[test]
fn test_first_cancel_wins() {
    let token = CancelToken::new();
    assert_eq!(token.reason(), None);

    assert!(token.cancel("first"));
    assert!(!token.cancel("second"));
    assert!(token.is_cancelled());
    assert_eq!(token.reason(), Some("first"));
}

#[test]
fn test_clones_share_state() {
    let token = CancelToken::new();
    let clone = token.clone();
    clone.cancel("stop");
    assert!(token.is_cancelled());
    assert_eq!(token.reason(), Some("stop"));
}

#[test]
fn test_external_token_uses_default_reason() {
    let inner = CancellationToken::new();
    let token = CancelToken::from_token(inner.clone());
    inner.cancel();
    assert_eq!(token.reason(), Some("aborted"));
}

#[tokio::test]
async fn test_cancelled_resolves() {
    let token = CancelToken::new();
    let clone = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        clone.cancel("later");
    });
    tokio::time::timeout(Duration::from_secs(5), token.cancelled())
        .await
        .expect("token should fire");
    assert_eq!(token.reason(), Some("later"));
}
