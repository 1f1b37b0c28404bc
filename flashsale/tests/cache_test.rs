//! Product detail cache tests.
//!
//! Verifies the tombstone-first read order, the anti-penetration guarantee
//! for absent products, and the malformed-entry fallback.
//!
//! Run with: `cargo test --test cache_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use chrono::Utc;
use flashsale::{keys, ProductCacheService};
use flashsale_core::{CounterStore, Product, ProductId, ProductStore};
use flashsale_testing::{MemoryCounterStore, MemoryProductStore};

fn product(id: &str, stock: i64) -> Product {
    Product {
        product_id: ProductId::new(id),
        name: format!("Product {id}"),
        stock,
        created_at: Utc::now(),
    }
}

fn cache(
    products: Vec<Product>,
) -> (
    ProductCacheService<MemoryCounterStore, MemoryProductStore>,
    MemoryCounterStore,
    MemoryProductStore,
) {
    let counter = MemoryCounterStore::new();
    let store = MemoryProductStore::with_products(products);
    (
        ProductCacheService::new(counter.clone(), store.clone()),
        counter,
        store,
    )
}

#[tokio::test]
async fn miss_populates_the_cache_and_subsequent_reads_skip_the_store() {
    let (cache, counter, store) = cache(vec![product("P1", 5)]);
    let id = ProductId::new("P1");

    let first = cache.get_detail(&id).await.unwrap().unwrap();
    assert_eq!(first.stock, 5);
    assert_eq!(store.find_call_count(), 1);
    assert!(counter.raw_value(&keys::detail(&id)).is_some());

    let second = cache.get_detail(&id).await.unwrap().unwrap();
    assert_eq!(second.stock, 5);
    // Served from the cache entry.
    assert_eq!(store.find_call_count(), 1);
}

#[tokio::test]
async fn absent_product_is_tombstoned_and_absorbs_repeat_lookups() {
    let (cache, counter, store) = cache(vec![]);
    let id = ProductId::new("ghost");

    assert!(cache.get_detail(&id).await.unwrap().is_none());
    assert_eq!(store.find_call_count(), 1);
    assert!(counter.raw_value(&keys::tombstone(&id)).is_some());

    // Hammering the same absent id never reaches the durable store again.
    for _ in 0..10 {
        assert!(cache.get_detail(&id).await.unwrap().is_none());
    }
    assert_eq!(store.find_call_count(), 1);
}

#[tokio::test]
async fn tombstone_outlives_a_late_insert_until_it_expires() {
    let (cache, counter, store) = cache(vec![]);
    let id = ProductId::new("P1");

    assert!(cache.get_detail(&id).await.unwrap().is_none());

    // The product is created after the tombstone was written.
    store.save(&product("P1", 5)).await.unwrap();
    assert!(cache.get_detail(&id).await.unwrap().is_none());

    // Once the tombstone expires the product becomes visible.
    counter.expire_now(&keys::tombstone(&id));
    assert_eq!(cache.get_detail(&id).await.unwrap().unwrap().stock, 5);
}

#[tokio::test]
async fn update_clears_the_tombstone_and_writes_the_entry() {
    let (cache, counter, _) = cache(vec![]);
    let id = ProductId::new("P1");

    // A stale tombstone from before the product existed.
    assert!(cache.get_detail(&id).await.unwrap().is_none());
    assert!(counter.raw_value(&keys::tombstone(&id)).is_some());

    cache.update(&product("P1", 7)).await.unwrap();

    assert!(counter.raw_value(&keys::tombstone(&id)).is_none());
    assert_eq!(cache.get_detail(&id).await.unwrap().unwrap().stock, 7);
}

#[tokio::test]
async fn invalidate_drops_entry_and_tombstone() {
    let (cache, counter, store) = cache(vec![product("P1", 5)]);
    let id = ProductId::new("P1");

    cache.get_detail(&id).await.unwrap();
    assert!(counter.raw_value(&keys::detail(&id)).is_some());

    cache.invalidate(&id).await.unwrap();
    assert!(counter.raw_value(&keys::detail(&id)).is_none());

    // Next read goes back to the durable store.
    cache.get_detail(&id).await.unwrap();
    assert_eq!(store.find_call_count(), 2);
}

#[tokio::test]
async fn malformed_entry_falls_back_to_the_durable_store() {
    let (cache, counter, store) = cache(vec![product("P1", 5)]);
    let id = ProductId::new("P1");

    counter
        .set(&keys::detail(&id), "{not json", None)
        .await
        .unwrap();

    let found = cache.get_detail(&id).await.unwrap().unwrap();
    assert_eq!(found.stock, 5);
    assert_eq!(store.find_call_count(), 1);
    // The corrupt entry is left for its TTL; the fallback read does not
    // overwrite it.
    assert_eq!(counter.raw_value(&keys::detail(&id)).as_deref(), Some("{not json"));
}

#[tokio::test]
async fn stats_count_entries_and_tombstones_separately() {
    let (cache, _, _) = cache(vec![product("P1", 1), product("P2", 2)]);

    cache.get_detail(&ProductId::new("P1")).await.unwrap();
    cache.get_detail(&ProductId::new("P2")).await.unwrap();
    cache.get_detail(&ProductId::new("ghost")).await.unwrap();

    let stats = cache.stats().await.unwrap();
    assert_eq!(stats.detail_entries, 2);
    assert_eq!(stats.tombstones, 1);

    cache.invalidate(&ProductId::new("P1")).await.unwrap();
    let stats = cache.stats().await.unwrap();
    assert_eq!(stats.detail_entries, 1);
}

#[tokio::test]
async fn preload_warms_present_products_and_skips_the_rest() {
    let (cache, counter, _) = cache(vec![product("P1", 1), product("P2", 2)]);

    let warmed = cache
        .preload(&[
            ProductId::new("P1"),
            ProductId::new("P2"),
            ProductId::new("ghost"),
        ])
        .await
        .unwrap();

    assert_eq!(warmed, 2);
    assert!(counter.raw_value(&keys::detail(&ProductId::new("P1"))).is_some());
    assert!(counter.raw_value(&keys::detail(&ProductId::new("P2"))).is_some());
    // Preload never writes tombstones; absence is only cached on a real read.
    assert!(counter
        .raw_value(&keys::tombstone(&ProductId::new("ghost")))
        .is_none());
}
