// src/browser/wait.rs
//! Bounded polling waits used instead of fixed sleeps

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Poll `check` every `poll` until it yields a value or `timeout` elapses.
///
/// The check always runs at least once, so a zero timeout is a single check.
pub async fn poll_until<T, F, Fut>(timeout: Duration, poll: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = check().await {
            return Some(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        tokio::time::sleep(poll.min(deadline - now)).await;
    }
}

/// Boolean form of [`poll_until`]
pub async fn wait_until<F, Fut>(timeout: Duration, poll: Duration, mut predicate: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    poll_until(timeout, poll, || {
        let check = predicate();
        async move { check.await.then_some(()) }
    })
    .await
    .is_some()
}
