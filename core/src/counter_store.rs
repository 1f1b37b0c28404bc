//! Atomic counter store contract.
//!
//! The counter store is the fast, shared key-value store holding stock
//! counters, dirty marks, lock leases, cache entries, and the order-id
//! sequence. Its two scripted operations, check-and-decrement and
//! check-and-increment, must execute as single indivisible steps with
//! respect to all concurrent callers on the same key. That per-key
//! serialization, performed by the store itself, is the only thing standing
//! between a flash sale and an oversell: no two concurrent decrements may
//! both observe sufficient stock and both succeed past the point where the
//! combined result would be negative.
//!
//! # Implementation Notes
//!
//! - The Redis implementation (`flashsale-redis`) runs the scripted
//!   operations as Lua scripts, which Redis executes atomically.
//! - The in-memory mock (`flashsale-testing`) runs them under a single
//!   mutex, which gives the same observable guarantee.
//! - Callers must never emulate these operations with a read followed by a
//!   write; that re-introduces the race the scripts exist to close.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;

/// Wire sentinel returned by scripted operations when the key is absent.
pub const SENTINEL_NOT_FOUND: i64 = -2;

/// Wire sentinel returned by check-and-decrement when stock is insufficient.
pub const SENTINEL_INSUFFICIENT: i64 = -1;

/// Outcome of a scripted check-and-mutate operation.
///
/// The two failure cases are distinguishable from each other and from any
/// legitimate stock level, which is never negative.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterUpdate {
    /// The counter was mutated; holds the new value (always >= 0).
    Updated(i64),
    /// The key does not exist (item never preheated, or evicted).
    NotFound,
    /// The current value is smaller than the requested decrement.
    Insufficient,
}

impl CounterUpdate {
    /// Decode a scripted operation's integer reply.
    ///
    /// Non-negative replies are the new counter value; the negative
    /// sentinels map to [`CounterUpdate::NotFound`] and
    /// [`CounterUpdate::Insufficient`]. Any other negative value is
    /// treated as not-found, since no legitimate counter is negative.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            value if value >= 0 => Self::Updated(value),
            SENTINEL_INSUFFICIENT => Self::Insufficient,
            _ => Self::NotFound,
        }
    }
}

/// Shared key-value store with scripted atomic read-modify-write support.
///
/// All methods carry a bounded timeout at the implementation level and
/// surface store failures as `FlashSaleError::TransientStore`.
pub trait CounterStore: Send + Sync {
    /// Read the raw value at `key`, or `None` if absent or expired.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Write `value` at `key`, with an optional time-to-live.
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete `key`. Returns whether a value was present.
    fn delete(&self, key: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Enumerate all live keys starting with `prefix`.
    ///
    /// Used by the reconciliation loop to scan dirty marks. The result is
    /// a snapshot; keys may appear or expire concurrently.
    fn keys_with_prefix(&self, prefix: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Atomically increment the integer at `key` by one, creating it at 1
    /// if absent. Returns the new value.
    fn increment(&self, key: &str) -> impl Future<Output = Result<i64>> + Send;

    /// Scripted atomic check-and-decrement.
    ///
    /// If `key` is absent, returns [`CounterUpdate::NotFound`]; if the
    /// current value is smaller than `quantity`, returns
    /// [`CounterUpdate::Insufficient`]; otherwise decrements and returns
    /// the new (non-negative) value. The stored value never goes negative.
    fn check_and_decrement(
        &self,
        key: &str,
        quantity: i64,
    ) -> impl Future<Output = Result<CounterUpdate>> + Send;

    /// Scripted atomic check-and-increment.
    ///
    /// If `key` is absent, returns [`CounterUpdate::NotFound`]; otherwise
    /// increments and returns the new value.
    fn check_and_increment(
        &self,
        key: &str,
        quantity: i64,
    ) -> impl Future<Output = Result<CounterUpdate>> + Send;

    /// Conditional set-if-absent with expiry (SET NX EX).
    ///
    /// Returns `true` if the value was written, `false` on contention.
    fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Atomically delete `key` only if its current value equals `expected`.
    ///
    /// This is the compare-and-delete a lock release relies on: a caller
    /// presenting a stale token must never delete a lease it no longer
    /// holds.
    fn delete_if_match(
        &self,
        key: &str,
        expected: &str,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Atomically extend the expiry of `key` only if its current value
    /// equals `expected`. The watchdog renewal path.
    fn expire_if_match(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool>> + Send;
}
