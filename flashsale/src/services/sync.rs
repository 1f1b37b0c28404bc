//! Reconciliation of dirty stock counters into the durable store.
//!
//! The sync service scans the dirty-mark prefix, writes each marked
//! product's authoritative fast-store value into the durable store,
//! refreshes its detail-cache entry, and only then deletes the mark. A
//! mark outlives any failed attempt, so the next cycle retries; re-running
//! an already-synced product is an idempotent no-op.
//!
//! The scan period must stay shorter than the dirty-mark TTL or an
//! unscanned mark could expire and silently drop a pending sync. This
//! loop provides eventual, not immediate, consistency: the durable store
//! may briefly trail a concurrent purchase, and the next cycle converges
//! it.

use crate::keys;
use crate::services::cache::ProductCacheService;
use flashsale_core::counter_store::CounterStore;
use flashsale_core::error::Result;
use flashsale_core::store::ProductStore;
use flashsale_core::types::ProductId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Default reconciliation period. Must stay below the dirty-mark TTL.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Outcome counts of one reconciliation run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Products flushed to the durable store.
    pub synced: usize,
    /// Dirty marks skipped (fast value evicted or product unknown).
    pub skipped: usize,
    /// Products whose sync failed and will be retried next cycle.
    pub failed: usize,
}

/// Periodic fast-to-durable stock reconciliation.
#[derive(Clone)]
pub struct StockSyncService<C, P> {
    counter: C,
    products: P,
    cache: ProductCacheService<C, P>,
}

impl<C, P> StockSyncService<C, P>
where
    C: CounterStore + Clone + Send + Sync + 'static,
    P: ProductStore + Clone + Send + Sync + 'static,
{
    /// Create a sync service.
    pub const fn new(counter: C, products: P, cache: ProductCacheService<C, P>) -> Self {
        Self {
            counter,
            products,
            cache,
        }
    }

    /// Flush one product's fast-store stock into the durable store.
    ///
    /// Returns `Ok(true)` when the durable store was updated and the mark
    /// cleared; `Ok(false)` when the item was skipped because the fast
    /// value is missing (never overwrite the durable record with a stale
    /// value) or the product has no durable record. The dirty mark is
    /// deleted only after the durable write is confirmed.
    ///
    /// # Errors
    ///
    /// Returns `TransientStore` on store failure; the mark is left in
    /// place so the next run retries.
    pub async fn sync_item(&self, product_id: &ProductId) -> Result<bool> {
        let stock_key = keys::stock(product_id);
        let Some(raw) = self.counter.get(&stock_key).await? else {
            tracing::warn!(product_id = %product_id, "Fast stock missing, skipping sync");
            return Ok(false);
        };
        let Ok(stock) = raw.parse::<i64>() else {
            tracing::error!(product_id = %product_id, raw = %raw, "Malformed stock, skipping sync");
            return Ok(false);
        };

        let Some(mut product) = self.products.find_by_id(product_id).await? else {
            tracing::error!(
                product_id = %product_id,
                "Product has fast stock but no durable record, skipping sync"
            );
            return Ok(false);
        };

        product.stock = stock;
        self.products.save(&product).await?;
        self.cache.update(&product).await?;
        self.counter.delete(&keys::dirty(product_id)).await?;

        tracing::debug!(product_id = %product_id, stock, "Stock synced to durable store");
        Ok(true)
    }

    /// Reconcile every currently dirty product.
    ///
    /// One product's failure never aborts the batch; failures stay marked
    /// for the next cycle.
    ///
    /// # Errors
    ///
    /// Returns `TransientStore` only if the dirty-mark scan itself fails.
    pub async fn run_once(&self) -> Result<SyncReport> {
        let dirty_keys = self.counter.keys_with_prefix(keys::DIRTY_PREFIX).await?;
        let mut report = SyncReport::default();

        for dirty_key in dirty_keys {
            let Some(product_id) = keys::product_id_from_dirty(&dirty_key) else {
                tracing::warn!(key = %dirty_key, "Unparseable dirty mark, skipping");
                report.skipped += 1;
                continue;
            };

            match self.sync_item(&product_id).await {
                Ok(true) => report.synced += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        product_id = %product_id,
                        error = %e,
                        "Stock sync failed, will retry next cycle"
                    );
                }
            }
        }

        if report.synced > 0 || report.failed > 0 {
            tracing::info!(
                synced = report.synced,
                skipped = report.skipped,
                failed = report.failed,
                "Stock reconciliation run complete"
            );
        }
        Ok(report)
    }

    /// Force an immediate sync of one product, dirty mark or not.
    ///
    /// # Errors
    ///
    /// Same contract as [`sync_item`](StockSyncService::sync_item).
    pub async fn force_sync(&self, product_id: &ProductId) -> Result<bool> {
        self.sync_item(product_id).await
    }

    /// Run [`run_once`](StockSyncService::run_once) every `period` until
    /// the returned handle is stopped.
    #[must_use]
    pub fn spawn(self, period: Duration) -> SyncHandle {
        let shutdown = Arc::new(Notify::new());
        let shutdown_rx = Arc::clone(&shutdown);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick fires immediately; consume it so the first
            // real run happens one period after startup.
            interval.tick().await;
            loop {
                tokio::select! {
                    () = shutdown_rx.notified() => {
                        tracing::info!("Stock sync loop shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(e) = self.run_once().await {
                            tracing::error!(error = %e, "Stock reconciliation scan failed");
                        }
                    }
                }
            }
        });

        SyncHandle { shutdown, task }
    }
}

/// Handle to a running reconciliation loop.
pub struct SyncHandle {
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Signal shutdown and wait for the loop to finish its current run.
    pub async fn stop(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                tracing::warn!(error = %e, "Stock sync task ended abnormally");
            }
        }
    }
}
