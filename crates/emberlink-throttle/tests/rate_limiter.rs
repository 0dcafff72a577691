//! Integration tests for the per-key cooldown limiter.
//!
//! All tests run on a paused clock so sleeps resolve as soon as every task
//! is idle, and elapsed time can be compared exactly.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use emberlink_throttle::{CooldownConfig, RateLimiter, ThrottleError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// =========================================================================
// Helpers
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Key {
    Say,
    Yell,
}

fn limiter() -> Arc<RateLimiter<Key>> {
    Arc::new(RateLimiter::new(
        CooldownConfig::uniform(Duration::from_millis(500))
            .with(Key::Say, Duration::from_secs(1))
            .with(Key::Yell, Duration::from_secs(2)),
    ))
}

// =========================================================================
// Spacing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_are_spaced_by_cooldown() {
    let limiter = limiter();
    let stamps = Arc::new(Mutex::new(Vec::new()));
    let start = Instant::now();

    let mut tasks = Vec::new();
    for id in 0..4u32 {
        let limiter = Arc::clone(&limiter);
        let stamps = Arc::clone(&stamps);
        tasks.push(tokio::spawn(async move {
            let permit = limiter.acquire(Key::Say, &CancellationToken::new()).await.unwrap();
            stamps.lock().unwrap().push((id, Instant::now()));
            permit.record();
        }));
        // Give each task time to queue so arrival order is fixed.
        tokio::task::yield_now().await;
    }
    for task in tasks {
        task.await.unwrap();
    }

    let stamps = stamps.lock().unwrap();
    let order: Vec<u32> = stamps.iter().map(|(id, _)| *id).collect();
    assert_eq!(order, vec![0, 1, 2, 3]);
    for (i, (_, at)) in stamps.iter().enumerate() {
        assert_eq!(*at - start, Duration::from_secs(i as u64));
    }
}

#[tokio::test(start_paused = true)]
async fn test_keys_do_not_wait_on_each_other() {
    let limiter = limiter();
    let cancel = CancellationToken::new();

    limiter.acquire(Key::Yell, &cancel).await.unwrap().record();
    let start = Instant::now();
    let permit = limiter.acquire(Key::Say, &cancel).await.unwrap();

    assert_eq!(Instant::now(), start);
    assert_eq!(permit.waited(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_partial_cooldown_only_waits_remainder() {
    let limiter = limiter();
    let cancel = CancellationToken::new();

    limiter.acquire(Key::Yell, &cancel).await.unwrap().record();
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    let start = Instant::now();
    let permit = limiter.acquire(Key::Yell, &cancel).await.unwrap();

    assert_eq!(Instant::now() - start, Duration::from_millis(500));
    assert_eq!(permit.waited(), Duration::from_millis(500));
}

// =========================================================================
// Cancellation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_during_cooldown_keeps_last_timestamp() {
    let limiter = limiter();
    limiter
        .acquire(Key::Say, &CancellationToken::new())
        .await
        .unwrap()
        .record();
    let recorded = limiter.last_sent(&Key::Say).unwrap();

    let cancel = CancellationToken::new();
    let task = {
        let limiter = Arc::clone(&limiter);
        let cancel = cancel.clone();
        tokio::spawn(async move { limiter.acquire(Key::Say, &cancel).await.map(|_| ()) })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();

    assert_eq!(task.await.unwrap(), Err(ThrottleError::Cancelled));
    assert_eq!(limiter.last_sent(&Key::Say), Some(recorded));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_queued_behind_holder() {
    let limiter = limiter();
    let held = limiter
        .acquire(Key::Say, &CancellationToken::new())
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let task = {
        let limiter = Arc::clone(&limiter);
        let cancel = cancel.clone();
        tokio::spawn(async move { limiter.acquire(Key::Say, &cancel).await.map(|_| ()) })
    };
    tokio::task::yield_now().await;
    cancel.cancel();

    assert_eq!(task.await.unwrap(), Err(ThrottleError::Cancelled));
    drop(held);
}
