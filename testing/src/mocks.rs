//! Mock implementations of the engine's provider traits.

use flashsale_core::counter_store::{CounterStore, CounterUpdate};
use flashsale_core::error::{FlashSaleError, Result};
use flashsale_core::store::{OrderStore, ProductStore};
use flashsale_core::types::{Order, OrderMessage, Product, ProductId};
use flashsale_core::OrderBus;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Counter store
// ============================================================================

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// In-memory [`CounterStore`] with TTL support.
///
/// All operations, including the scripted check-and-mutate pairs, run under
/// one mutex: concurrent callers are totally ordered per the store, exactly
/// as Redis orders Lua script executions.
///
/// Expired entries are dropped lazily on access; [`expire_now`] lets tests
/// simulate eviction without sleeping.
///
/// [`expire_now`]: MemoryCounterStore::expire_now
#[derive(Clone, Default)]
pub struct MemoryCounterStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryCounterStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Immediately expire `key`, simulating eviction from the fast store.
    pub fn expire_now(&self, key: &str) {
        locked(&self.entries).remove(key);
    }

    /// Read a value ignoring the trait's error plumbing. Test convenience.
    #[must_use]
    pub fn raw_value(&self, key: &str) -> Option<String> {
        let mut entries = locked(&self.entries);
        Self::live_value(&mut entries, key).cloned()
    }

    /// Remaining TTL for `key`, if one is set.
    #[must_use]
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        let entries = locked(&self.entries);
        entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .and_then(|entry| entry.expires_at)
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    fn live_value<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a String> {
        if entries.get(key).is_some_and(Entry::is_expired) {
            entries.remove(key);
        }
        entries.get(key).map(|entry| &entry.value)
    }

    fn live_integer(entries: &mut HashMap<String, Entry>, key: &str) -> Result<Option<i64>> {
        match Self::live_value(entries, key) {
            None => Ok(None),
            Some(value) => value.parse::<i64>().map(Some).map_err(|_| {
                FlashSaleError::TransientStore(format!("non-integer value at key {key}"))
            }),
        }
    }
}

impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = locked(&self.entries);
        Ok(Self::live_value(&mut entries, key).cloned())
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut entries = locked(&self.entries);
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = locked(&self.entries);
        let existed = Self::live_value(&mut entries, key).is_some();
        entries.remove(key);
        Ok(existed)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = locked(&self.entries);
        Ok(entries
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && !entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        let mut entries = locked(&self.entries);
        let next = Self::live_integer(&mut entries, key)?.unwrap_or(0) + 1;
        let expires_at = entries.get(key).and_then(|entry| entry.expires_at);
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn check_and_decrement(&self, key: &str, quantity: i64) -> Result<CounterUpdate> {
        let mut entries = locked(&self.entries);
        let Some(current) = Self::live_integer(&mut entries, key)? else {
            return Ok(CounterUpdate::NotFound);
        };
        if current < quantity {
            return Ok(CounterUpdate::Insufficient);
        }
        let next = current - quantity;
        let expires_at = entries.get(key).and_then(|entry| entry.expires_at);
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(CounterUpdate::Updated(next))
    }

    async fn check_and_increment(&self, key: &str, quantity: i64) -> Result<CounterUpdate> {
        let mut entries = locked(&self.entries);
        let Some(current) = Self::live_integer(&mut entries, key)? else {
            return Ok(CounterUpdate::NotFound);
        };
        let next = current + quantity;
        let expires_at = entries.get(key).and_then(|entry| entry.expires_at);
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(CounterUpdate::Updated(next))
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut entries = locked(&self.entries);
        if Self::live_value(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn delete_if_match(&self, key: &str, expected: &str) -> Result<bool> {
        let mut entries = locked(&self.entries);
        if Self::live_value(&mut entries, key).is_some_and(|value| value == expected) {
            entries.remove(key);
            return Ok(true);
        }
        Ok(false)
    }

    async fn expire_if_match(&self, key: &str, expected: &str, ttl: Duration) -> Result<bool> {
        let mut entries = locked(&self.entries);
        if Self::live_value(&mut entries, key).is_some_and(|value| value == expected) {
            if let Some(entry) = entries.get_mut(key) {
                entry.expires_at = Some(Instant::now() + ttl);
                return Ok(true);
            }
        }
        Ok(false)
    }
}

// ============================================================================
// Product store
// ============================================================================

/// In-memory [`ProductStore`] with call counting and failure injection.
#[derive(Clone, Default)]
pub struct MemoryProductStore {
    products: Arc<Mutex<HashMap<ProductId, Product>>>,
    find_calls: Arc<AtomicUsize>,
    failing_saves: Arc<AtomicUsize>,
}

impl MemoryProductStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store preloaded with `products`.
    #[must_use]
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let store = Self::new();
        {
            let mut map = locked(&store.products);
            for product in products {
                map.insert(product.product_id.clone(), product);
            }
        }
        store
    }

    /// Number of `find_by_id` calls made so far. Used by the cache
    /// anti-penetration tests to prove the durable store was not touched.
    #[must_use]
    pub fn find_call_count(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    /// Make the next `count` calls to `save` fail with a transient error.
    pub fn fail_next_saves(&self, count: usize) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }

    /// Read a product without counting the access. Test convenience.
    #[must_use]
    pub fn stored(&self, id: &ProductId) -> Option<Product> {
        locked(&self.products).get(id).cloned()
    }
}

impl ProductStore for MemoryProductStore {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        Ok(locked(&self.products).get(id).cloned())
    }

    async fn save(&self, product: &Product) -> Result<()> {
        let remaining = self.failing_saves.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_saves.store(remaining - 1, Ordering::SeqCst);
            return Err(FlashSaleError::TransientStore(
                "injected save failure".to_string(),
            ));
        }
        locked(&self.products).insert(product.product_id.clone(), product.clone());
        Ok(())
    }

    async fn delete_by_id(&self, id: &ProductId) -> Result<bool> {
        Ok(locked(&self.products).remove(id).is_some())
    }

    async fn find_all(&self) -> Result<Vec<Product>> {
        Ok(locked(&self.products).values().cloned().collect())
    }
}

// ============================================================================
// Order store
// ============================================================================

/// In-memory [`OrderStore`].
#[derive(Clone, Default)]
pub struct MemoryOrderStore {
    orders: Arc<Mutex<HashMap<String, Order>>>,
}

impl MemoryOrderStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All orders saved so far.
    #[must_use]
    pub fn all(&self) -> Vec<Order> {
        locked(&self.orders).values().cloned().collect()
    }
}

impl OrderStore for MemoryOrderStore {
    async fn find_by_id(&self, order_id: &str) -> Result<Option<Order>> {
        Ok(locked(&self.orders).get(order_id).cloned())
    }

    async fn save(&self, order: &Order) -> Result<()> {
        locked(&self.orders)
            .entry(order.order_id.clone())
            .or_insert_with(|| order.clone());
        Ok(())
    }
}

// ============================================================================
// Order bus
// ============================================================================

/// In-memory [`OrderBus`] recording published payloads, with failure
/// injection for compensation tests.
#[derive(Clone, Default)]
pub struct MemoryOrderBus {
    published: Arc<Mutex<Vec<(String, String, Vec<u8>)>>>,
    failing_publishes: Arc<AtomicUsize>,
}

impl MemoryOrderBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` publishes fail.
    pub fn fail_next_publishes(&self, count: usize) {
        self.failing_publishes.store(count, Ordering::SeqCst);
    }

    /// Number of successfully published messages.
    #[must_use]
    pub fn published_count(&self) -> usize {
        locked(&self.published).len()
    }

    /// Decode every published payload as an [`OrderMessage`].
    #[must_use]
    pub fn published_orders(&self) -> Vec<OrderMessage> {
        locked(&self.published)
            .iter()
            .filter_map(|(_, _, payload)| serde_json::from_slice(payload).ok())
            .collect()
    }
}

impl OrderBus for MemoryOrderBus {
    async fn publish(&self, topic: &str, routing_key: &str, payload: &[u8]) -> Result<()> {
        let remaining = self.failing_publishes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_publishes.store(remaining - 1, Ordering::SeqCst);
            return Err(FlashSaleError::Publish(
                "injected publish failure".to_string(),
            ));
        }
        locked(&self.published).push((
            topic.to_string(),
            routing_key.to_string(),
            payload.to_vec(),
        ));
        Ok(())
    }
}
