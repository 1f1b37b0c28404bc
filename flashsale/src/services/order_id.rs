//! Date-scoped order-id generation.
//!
//! Ids are `<8-digit date><6-digit zero-padded counter>`, e.g.
//! `20250101000042`. The counter lives in the fast store and is bumped
//! with an atomic increment; the first generation call that observes a
//! date mismatch resets it for the new day. That reset race is tolerated
//! as first-writer-wins: a double reset at the day boundary briefly
//! restarts the counter but never duplicates an id within a single reset
//! cycle.

use crate::keys;
use chrono::{NaiveDate, Utc};
use flashsale_core::counter_store::CounterStore;
use flashsale_core::error::{FlashSaleError, Result};
use std::time::Duration;

/// Maximum orders per calendar day.
pub const COUNTER_MAX: i64 = 999_999;

/// Total id length: 8 date digits + 6 counter digits.
const ORDER_ID_LEN: usize = 14;

/// TTL on the date stamp; outlives any day-boundary raciness.
const DATE_TTL: Duration = Duration::from_secs(2 * 24 * 3600);

const DATE_FORMAT: &str = "%Y%m%d";

/// Read-only snapshot of the daily counter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterStatus {
    /// Date stamp the counter currently belongs to, if any.
    pub date: Option<String>,
    /// Current counter value (0 when never used).
    pub counter: i64,
    /// Ids still available under the current stamp.
    pub remaining: i64,
}

/// Order-id generator over a counter store.
#[derive(Clone)]
pub struct OrderIdGenerator<C> {
    counter: C,
}

impl<C: CounterStore> OrderIdGenerator<C> {
    /// Create a generator.
    pub const fn new(counter: C) -> Self {
        Self { counter }
    }

    /// Generate the next order id.
    ///
    /// # Errors
    ///
    /// - `CounterExhausted` once the daily counter exceeds
    ///   [`COUNTER_MAX`].
    /// - `TransientStore` on store failure.
    pub async fn generate(&self) -> Result<String> {
        let today = Utc::now().format(DATE_FORMAT).to_string();

        let mut counter = self.counter.increment(keys::ORDER_COUNTER_KEY).await?;

        let last_date = self.counter.get(keys::ORDER_DATE_KEY).await?;
        if last_date.as_deref() == Some(today.as_str()) {
            if counter > COUNTER_MAX {
                tracing::error!(counter, "Daily order counter exhausted");
                return Err(FlashSaleError::CounterExhausted { counter });
            }
        } else {
            // New day (or first ever call): reset. First writer wins.
            self.counter.set(keys::ORDER_COUNTER_KEY, "1", None).await?;
            self.counter
                .set(keys::ORDER_DATE_KEY, &today, Some(DATE_TTL))
                .await?;
            counter = 1;
            tracing::info!(date = %today, "Order counter reset for new day");
        }

        let order_id = format!("{today}{counter:06}");
        tracing::debug!(order_id = %order_id, "Order id generated");
        Ok(order_id)
    }

    /// Generate `count` ids in sequence.
    ///
    /// # Errors
    ///
    /// - `Validation` unless `1 <= count <= 1000`.
    /// - Any error from [`generate`](OrderIdGenerator::generate).
    pub async fn generate_batch(&self, count: usize) -> Result<Vec<String>> {
        if count == 0 || count > 1000 {
            return Err(FlashSaleError::Validation(format!(
                "batch size must be in 1..=1000, got {count}"
            )));
        }

        let mut order_ids = Vec::with_capacity(count);
        for _ in 0..count {
            order_ids.push(self.generate().await?);
        }
        Ok(order_ids)
    }

    /// Snapshot the counter and its date stamp without mutating either.
    /// Diagnostic.
    ///
    /// # Errors
    ///
    /// Returns `TransientStore` on store failure.
    pub async fn counter_status(&self) -> Result<CounterStatus> {
        let date = self.counter.get(keys::ORDER_DATE_KEY).await?;
        let counter = self
            .counter
            .get(keys::ORDER_COUNTER_KEY)
            .await?
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(0);

        Ok(CounterStatus {
            date,
            counter,
            remaining: (COUNTER_MAX - counter).max(0),
        })
    }
}

/// Check that `order_id` has the exact length, a parseable date, and a
/// counter within `[1, COUNTER_MAX]`.
#[must_use]
pub fn validate(order_id: &str) -> bool {
    parse(order_id).is_ok()
}

/// Extract the `YYYYMMDD` date portion.
///
/// # Errors
///
/// Returns `Validation` on malformed input.
pub fn extract_date(order_id: &str) -> Result<String> {
    parse(order_id).map(|(date, _)| date.format(DATE_FORMAT).to_string())
}

/// Extract the daily counter portion.
///
/// # Errors
///
/// Returns `Validation` on malformed input.
pub fn extract_counter(order_id: &str) -> Result<i64> {
    parse(order_id).map(|(_, counter)| counter)
}

fn parse(order_id: &str) -> Result<(NaiveDate, i64)> {
    let invalid = || FlashSaleError::Validation(format!("invalid order id format: {order_id}"));

    if order_id.len() != ORDER_ID_LEN || !order_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let (date_part, counter_part) = order_id.split_at(8);
    let date = NaiveDate::parse_from_str(date_part, DATE_FORMAT).map_err(|_| invalid())?;
    let counter: i64 = counter_part.parse().map_err(|_| invalid())?;
    if !(1..=COUNTER_MAX).contains(&counter) {
        return Err(invalid());
    }

    Ok((date, counter))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_well_formed_ids() {
        assert!(validate("20250101000001"));
        assert!(validate("20251231999999"));
        assert_eq!(extract_date("20250101000042").unwrap(), "20250101");
        assert_eq!(extract_counter("20250101000042").unwrap(), 42);
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(!validate(""));
        assert!(!validate("2025010100001")); // too short
        assert!(!validate("202501010000001")); // too long
        assert!(!validate("20251301000001")); // month 13
        assert!(!validate("20250101000000")); // counter below 1
        assert!(!validate("2025010100000x")); // non-digit
        assert!(extract_date("bogus").is_err());
        assert!(extract_counter("20251301000001").is_err());
    }

    proptest! {
        #[test]
        fn formatted_ids_round_trip(counter in 1_i64..=COUNTER_MAX) {
            let order_id = format!("20250615{counter:06}");
            prop_assert!(validate(&order_id));
            prop_assert_eq!(extract_counter(&order_id).unwrap(), counter);
            prop_assert_eq!(extract_date(&order_id).unwrap(), "20250615");
        }
    }
}
