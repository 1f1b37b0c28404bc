//! Distributed lock tests.
//!
//! Verifies mutual exclusion, token-checked release (non-theft), and the
//! watchdog renewal lifecycle. The watchdog tests use real time because
//! the in-memory store's TTLs are wall-clock based.
//!
//! Run with: `cargo test --test lock_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use flashsale::LockManager;
use flashsale_testing::MemoryCounterStore;
use std::time::Duration;

const RESOURCE: &str = "flash:sale:lock:P1";

#[tokio::test]
async fn only_one_acquirer_wins() {
    let counter = MemoryCounterStore::new();
    let locks = LockManager::new(counter);

    let first = locks
        .try_acquire(RESOURCE, Duration::from_secs(30))
        .await
        .unwrap();
    let second = locks
        .try_acquire(RESOURCE, Duration::from_secs(30))
        .await
        .unwrap();

    assert!(first.is_some());
    assert!(second.is_none());
    locks.shutdown().await;
}

#[tokio::test]
async fn concurrent_acquirers_grant_exactly_one_lease() {
    let counter = MemoryCounterStore::new();

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let locks = LockManager::new(counter.clone());
        tasks.push(tokio::spawn(async move {
            let granted = locks
                .try_acquire(RESOURCE, Duration::from_secs(30))
                .await
                .unwrap();
            locks.shutdown().await;
            granted
        }));
    }

    let mut granted = 0;
    for task in tasks {
        if task.await.unwrap().is_some() {
            granted += 1;
        }
    }
    assert_eq!(granted, 1);
}

#[tokio::test]
async fn release_requires_the_owning_token() {
    let counter = MemoryCounterStore::new();
    let locks = LockManager::new(counter.clone());

    let token = locks
        .try_acquire(RESOURCE, Duration::from_secs(30))
        .await
        .unwrap()
        .unwrap();

    // A stale token neither errors nor deletes the lease.
    assert!(!locks.release(RESOURCE, "not-the-token").await.unwrap());
    assert_eq!(counter.raw_value(RESOURCE).as_deref(), Some(token.as_str()));

    assert!(locks.release(RESOURCE, &token).await.unwrap());
    assert!(counter.raw_value(RESOURCE).is_none());

    // Releasing again is a reported no-op.
    assert!(!locks.release(RESOURCE, &token).await.unwrap());
}

#[tokio::test]
async fn renewal_never_extends_a_stolen_lease() {
    let counter = MemoryCounterStore::new();
    let locks = LockManager::new(counter.clone());

    let token = locks
        .try_acquire(RESOURCE, Duration::from_secs(2))
        .await
        .unwrap()
        .unwrap();

    // The lease expires and another holder takes it.
    counter.expire_now(RESOURCE);
    let other = LockManager::new(counter.clone());
    let other_token = other
        .try_acquire(RESOURCE, Duration::from_secs(60))
        .await
        .unwrap()
        .unwrap();

    // Give the original watchdog time to observe the mismatch and stop.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(
        counter.raw_value(RESOURCE).as_deref(),
        Some(other_token.as_str())
    );

    // The original release must not delete the new holder's lease either.
    assert!(!locks.release(RESOURCE, &token).await.unwrap());
    assert_eq!(
        counter.raw_value(RESOURCE).as_deref(),
        Some(other_token.as_str())
    );

    locks.shutdown().await;
    other.shutdown().await;
}

#[tokio::test]
async fn stopped_watchdog_unregisters_itself() {
    let counter = MemoryCounterStore::new();
    let locks = LockManager::new(counter.clone());

    let _token = locks
        .try_acquire(RESOURCE, Duration::from_secs(2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(locks.active_renewals().await, 1);

    // The lease disappears underneath the watchdog; its next renewal
    // fails and the task must clean up its own registry entry, even
    // though the caller never releases.
    counter.expire_now(RESOURCE);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(locks.active_renewals().await, 0);
}

#[tokio::test]
async fn release_leaves_no_registered_watchdog() {
    let counter = MemoryCounterStore::new();
    let locks = LockManager::new(counter);

    let token = locks
        .try_acquire(RESOURCE, Duration::from_secs(30))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(locks.active_renewals().await, 1);

    assert!(locks.release(RESOURCE, &token).await.unwrap());
    assert_eq!(locks.active_renewals().await, 0);
}

#[tokio::test]
async fn watchdog_keeps_a_held_lease_alive() {
    let counter = MemoryCounterStore::new();
    let locks = LockManager::new(counter.clone());

    // 2s lease, renewed every 1s. Without the watchdog the entry would be
    // gone after 2s.
    let token = locks
        .try_acquire(RESOURCE, Duration::from_secs(2))
        .await
        .unwrap()
        .unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(counter.raw_value(RESOURCE).as_deref(), Some(token.as_str()));

    // After release the watchdog is cancelled and nothing resurrects the key.
    assert!(locks.release(RESOURCE, &token).await.unwrap());
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(counter.raw_value(RESOURCE).is_none());
}
