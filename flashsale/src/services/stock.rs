//! Stock control service.
//!
//! Owns every mutation of the per-product stock counters and their dirty
//! marks. The oversell-prevention invariant lives here: `decrement` goes
//! through the counter store's scripted check-and-decrement and never
//! through a read-then-write, so two concurrent purchases can never both
//! pass a stale sufficiency check.
//!
//! Counter lifecycle per product:
//! `UNINITIALIZED → PREHEATED → (DECREMENTED | INSUFFICIENT | SET)*`.
//! Preheat copies every durable product's stock into the fast store at
//! process start; a missing counter afterwards is a meaningful state
//! ("not preheated"), not zero stock.

use crate::keys;
use flashsale_core::counter_store::{CounterStore, CounterUpdate};
use flashsale_core::error::{FlashSaleError, Result};
use flashsale_core::store::ProductStore;
use flashsale_core::types::ProductId;
use std::time::Duration;

/// Default dirty-mark TTL. The reconciliation interval must stay well
/// below this or an unscanned mark could expire and silently drop a
/// pending sync.
pub const DEFAULT_DIRTY_TTL: Duration = Duration::from_secs(300);

/// Snapshot counts over the fast store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StockStats {
    /// Number of live stock counters.
    pub stock_counters: usize,
    /// Number of products awaiting reconciliation.
    pub pending_sync: usize,
}

/// Stock control over a counter store and a durable product store.
#[derive(Clone)]
pub struct StockService<C, P> {
    counter: C,
    products: P,
    dirty_ttl: Duration,
}

impl<C: CounterStore, P: ProductStore> StockService<C, P> {
    /// Create a stock service with the default dirty-mark TTL.
    pub const fn new(counter: C, products: P) -> Self {
        Self {
            counter,
            products,
            dirty_ttl: DEFAULT_DIRTY_TTL,
        }
    }

    /// Override the dirty-mark TTL.
    #[must_use]
    pub const fn with_dirty_ttl(mut self, dirty_ttl: Duration) -> Self {
        self.dirty_ttl = dirty_ttl;
        self
    }

    /// Copy every durable product's stock into the fast store.
    ///
    /// Per-product failures are logged and skipped so one bad record does
    /// not abort the preheat. Returns the number of counters written.
    ///
    /// # Errors
    ///
    /// Returns `FlashSaleError::TransientStore` if the durable scan itself
    /// fails.
    pub async fn preheat(&self) -> Result<usize> {
        tracing::info!("Preheating stock counters from durable store");
        let products = self.products.find_all().await?;

        let mut preheated = 0;
        for product in &products {
            let key = keys::stock(&product.product_id);
            match self
                .counter
                .set(&key, &product.stock.to_string(), None)
                .await
            {
                Ok(()) => {
                    preheated += 1;
                    tracing::debug!(
                        product_id = %product.product_id,
                        stock = product.stock,
                        "Stock counter preheated"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        product_id = %product.product_id,
                        error = %e,
                        "Stock preheat failed for product"
                    );
                }
            }
        }

        tracing::info!(preheated, total = products.len(), "Stock preheat complete");
        Ok(preheated)
    }

    /// Atomically decrement a product's stock.
    ///
    /// On success the product is marked dirty for reconciliation and the
    /// remaining stock (>= 0) is returned.
    ///
    /// # Errors
    ///
    /// - `Validation` if `quantity` is not positive (no store mutation).
    /// - `InsufficientStock` if the counter cannot cover `quantity`.
    /// - `ItemNotPreheated` if no counter exists for the product.
    /// - `TransientStore` on store failure; the caller must treat the
    ///   purchase outcome as unknown, not retry blindly.
    pub async fn decrement(&self, product_id: &ProductId, quantity: i64) -> Result<i64> {
        if quantity <= 0 {
            return Err(FlashSaleError::Validation(format!(
                "decrement quantity must be positive, got {quantity}"
            )));
        }

        let key = keys::stock(product_id);
        match self.counter.check_and_decrement(&key, quantity).await? {
            CounterUpdate::Updated(remaining) => {
                tracing::info!(
                    product_id = %product_id,
                    quantity,
                    remaining,
                    "Stock decremented"
                );
                self.mark_dirty(product_id).await?;
                Ok(remaining)
            }
            CounterUpdate::Insufficient => {
                tracing::warn!(product_id = %product_id, quantity, "Insufficient stock");
                Err(FlashSaleError::InsufficientStock {
                    product_id: product_id.to_string(),
                })
            }
            CounterUpdate::NotFound => {
                tracing::error!(product_id = %product_id, "Stock counter missing, not preheated");
                Err(FlashSaleError::ItemNotPreheated {
                    product_id: product_id.to_string(),
                })
            }
        }
    }

    /// Atomically increment a product's stock.
    ///
    /// Used as the compensation when a downstream step fails after a
    /// successful decrement. Marks the product dirty.
    ///
    /// # Errors
    ///
    /// - `Validation` if `quantity` is not positive (no store mutation).
    /// - `ItemNotPreheated` if no counter exists for the product.
    /// - `TransientStore` on store failure.
    pub async fn increment(&self, product_id: &ProductId, quantity: i64) -> Result<i64> {
        if quantity <= 0 {
            return Err(FlashSaleError::Validation(format!(
                "increment quantity must be positive, got {quantity}"
            )));
        }

        let key = keys::stock(product_id);
        match self.counter.check_and_increment(&key, quantity).await? {
            CounterUpdate::Updated(value) => {
                tracing::info!(product_id = %product_id, quantity, value, "Stock incremented");
                self.mark_dirty(product_id).await?;
                Ok(value)
            }
            CounterUpdate::NotFound | CounterUpdate::Insufficient => {
                tracing::error!(product_id = %product_id, "Stock counter missing, not preheated");
                Err(FlashSaleError::ItemNotPreheated {
                    product_id: product_id.to_string(),
                })
            }
        }
    }

    /// Advisory sufficiency check.
    ///
    /// A `true` result is not a purchase guarantee: a later [`decrement`]
    /// can still fail once concurrent purchases land.
    ///
    /// [`decrement`]: StockService::decrement
    ///
    /// # Errors
    ///
    /// Returns `TransientStore` on store failure.
    pub async fn check_sufficient(&self, product_id: &ProductId, quantity: i64) -> Result<bool> {
        if quantity <= 0 {
            return Ok(false);
        }
        Ok(self
            .current_stock(product_id)
            .await?
            .is_some_and(|stock| stock >= quantity))
    }

    /// Current fast-store stock for a product, or `None` if not preheated.
    ///
    /// # Errors
    ///
    /// Returns `TransientStore` on store failure.
    pub async fn current_stock(&self, product_id: &ProductId) -> Result<Option<i64>> {
        let key = keys::stock(product_id);
        match self.counter.get(&key).await? {
            None => Ok(None),
            Some(raw) => match raw.parse::<i64>() {
                Ok(stock) => Ok(Some(stock)),
                Err(_) => {
                    tracing::error!(product_id = %product_id, raw = %raw, "Malformed stock value");
                    Ok(None)
                }
            },
        }
    }

    /// Administrative stock override. Marks the product dirty.
    ///
    /// # Errors
    ///
    /// - `Validation` if `stock` is negative (no store mutation).
    /// - `TransientStore` on store failure.
    pub async fn set_stock(&self, product_id: &ProductId, stock: i64) -> Result<()> {
        if stock < 0 {
            return Err(FlashSaleError::Validation(format!(
                "stock must be non-negative, got {stock}"
            )));
        }

        let key = keys::stock(product_id);
        self.counter.set(&key, &stock.to_string(), None).await?;
        tracing::info!(product_id = %product_id, stock, "Stock set administratively");
        self.mark_dirty(product_id).await?;
        Ok(())
    }

    /// Counts of live stock counters and pending dirty marks.
    ///
    /// # Errors
    ///
    /// Returns `TransientStore` on store failure.
    pub async fn stats(&self) -> Result<StockStats> {
        let stock_counters = self.counter.keys_with_prefix(keys::STOCK_PREFIX).await?.len();
        let pending_sync = self.counter.keys_with_prefix(keys::DIRTY_PREFIX).await?.len();
        Ok(StockStats {
            stock_counters,
            pending_sync,
        })
    }

    /// Record that a product's counter diverged from the durable store.
    async fn mark_dirty(&self, product_id: &ProductId) -> Result<()> {
        let key = keys::dirty(product_id);
        self.counter.set(&key, "1", Some(self.dirty_ttl)).await
    }
}
