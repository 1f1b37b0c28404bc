//! Cache-aside product detail cache with negative caching.
//!
//! Reads check the tombstone first: a live tombstone means the product was
//! recently confirmed absent, and the durable store is not touched at all.
//! This is the anti-penetration measure: repeated lookups of a
//! nonexistent id are absorbed by the tombstone. The tombstone's TTL is
//! deliberately shorter than the record TTL so a newly created product
//! stays invisible only briefly.
//!
//! Writes are last-write-wins per key; the update path always clears the
//! tombstone before writing the record entry so a consumer never observes
//! both.

use crate::keys;
use flashsale_core::counter_store::CounterStore;
use flashsale_core::error::Result;
use flashsale_core::store::ProductStore;
use flashsale_core::types::{Product, ProductId};
use std::time::Duration;

/// TTL for cached product records.
pub const DETAIL_TTL: Duration = Duration::from_secs(3600);

/// TTL for tombstones. Shorter than [`DETAIL_TTL`] so absence is
/// re-checked reasonably soon.
pub const TOMBSTONE_TTL: Duration = Duration::from_secs(300);

/// Value stored under a tombstone key. Presence is what matters.
const TOMBSTONE_VALUE: &str = "null";

/// Counts of live cache entries by kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Cached product records.
    pub detail_entries: usize,
    /// Negative-cache tombstones.
    pub tombstones: usize,
}

/// Read-through product detail cache.
#[derive(Clone)]
pub struct ProductCacheService<C, P> {
    counter: C,
    products: P,
}

impl<C: CounterStore, P: ProductStore> ProductCacheService<C, P> {
    /// Create a cache over a counter store and a durable product store.
    pub const fn new(counter: C, products: P) -> Self {
        Self { counter, products }
    }

    /// Fetch a product, consulting tombstone, cache entry, and durable
    /// store in that order.
    ///
    /// A malformed cached payload falls back to a direct durable read for
    /// this call; the failure is logged, never cached or propagated.
    ///
    /// # Errors
    ///
    /// Returns `TransientStore` if the fast or durable store fails.
    pub async fn get_detail(&self, product_id: &ProductId) -> Result<Option<Product>> {
        let tombstone_key = keys::tombstone(product_id);
        if self.counter.get(&tombstone_key).await?.is_some() {
            tracing::debug!(product_id = %product_id, "Tombstone hit, product absent");
            return Ok(None);
        }

        let detail_key = keys::detail(product_id);
        if let Some(cached) = self.counter.get(&detail_key).await? {
            match serde_json::from_str::<Product>(&cached) {
                Ok(product) => {
                    tracing::debug!(product_id = %product_id, "Detail cache hit");
                    return Ok(Some(product));
                }
                Err(e) => {
                    tracing::error!(
                        product_id = %product_id,
                        error = %e,
                        "Malformed cache entry, falling back to durable store"
                    );
                    return self.products.find_by_id(product_id).await;
                }
            }
        }

        match self.products.find_by_id(product_id).await? {
            Some(product) => {
                self.write_entry(&product).await;
                Ok(Some(product))
            }
            None => {
                self.counter
                    .set(&tombstone_key, TOMBSTONE_VALUE, Some(TOMBSTONE_TTL))
                    .await?;
                tracing::info!(product_id = %product_id, "Product absent, tombstone written");
                Ok(None)
            }
        }
    }

    /// Refresh the cache entry for `product`, clearing any tombstone first.
    ///
    /// # Errors
    ///
    /// Returns `TransientStore` if the fast store fails.
    pub async fn update(&self, product: &Product) -> Result<()> {
        self.counter
            .delete(&keys::tombstone(&product.product_id))
            .await?;
        self.write_entry(product).await;
        Ok(())
    }

    /// Drop both the record entry and the tombstone for a product.
    ///
    /// # Errors
    ///
    /// Returns `TransientStore` if the fast store fails.
    pub async fn invalidate(&self, product_id: &ProductId) -> Result<()> {
        self.counter.delete(&keys::detail(product_id)).await?;
        self.counter.delete(&keys::tombstone(product_id)).await?;
        tracing::debug!(product_id = %product_id, "Cache invalidated");
        Ok(())
    }

    /// Warm the cache for a list of hot products. Missing ids and
    /// per-product failures are logged and skipped. Returns the number of
    /// entries written.
    ///
    /// # Errors
    ///
    /// This method itself never fails; the `Result` keeps the signature
    /// uniform with the other cache operations.
    pub async fn preload(&self, product_ids: &[ProductId]) -> Result<usize> {
        let mut warmed = 0;
        for product_id in product_ids {
            match self.products.find_by_id(product_id).await {
                Ok(Some(product)) => {
                    if self.update(&product).await.is_ok() {
                        warmed += 1;
                    }
                }
                Ok(None) => {
                    tracing::debug!(product_id = %product_id, "Preload skipped absent product");
                }
                Err(e) => {
                    tracing::error!(product_id = %product_id, error = %e, "Preload failed");
                }
            }
        }
        tracing::info!(warmed, total = product_ids.len(), "Hot product preload complete");
        Ok(warmed)
    }

    /// Counts of live detail entries and tombstones. Diagnostic.
    ///
    /// # Errors
    ///
    /// Returns `TransientStore` on store failure.
    pub async fn stats(&self) -> Result<CacheStats> {
        let detail_entries = self
            .counter
            .keys_with_prefix(keys::DETAIL_PREFIX)
            .await?
            .len();
        let tombstones = self
            .counter
            .keys_with_prefix(keys::TOMBSTONE_PREFIX)
            .await?
            .len();
        Ok(CacheStats {
            detail_entries,
            tombstones,
        })
    }

    /// Serialize and write the record entry. A serialization failure is
    /// logged and the write skipped; the caller still has the product.
    async fn write_entry(&self, product: &Product) {
        match serde_json::to_string(product) {
            Ok(json) => {
                if let Err(e) = self
                    .counter
                    .set(&keys::detail(&product.product_id), &json, Some(DETAIL_TTL))
                    .await
                {
                    tracing::warn!(
                        product_id = %product.product_id,
                        error = %e,
                        "Detail cache write failed"
                    );
                }
            }
            Err(e) => {
                tracing::error!(
                    product_id = %product.product_id,
                    error = %e,
                    "Product serialization failed, entry not cached"
                );
            }
        }
    }
}
