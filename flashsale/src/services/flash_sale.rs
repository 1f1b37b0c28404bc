//! The purchase admission flow.
//!
//! A purchase atomically decrements stock, hands order creation to the
//! broker, and compensates (increments back) if the hand-off fails after
//! the decrement landed. Two admission strategies are supported behind
//! [`StockGate`]: the lock-free scripted decrement used in production, and
//! the conservative per-product lease that serializes all attempts for one
//! item. Their failure semantics differ (only the locked gate can report
//! `LeaseContention`), so they are kept explicit rather than merged.
//!
//! Both gates defer the durable-store write to the reconciliation loop;
//! the locked gate never writes the durable store inside its critical
//! section, so the consistency window is uniform across strategies.

use crate::keys;
use crate::services::lock::LockManager;
use crate::services::stock::StockService;
use flashsale_core::broker::OrderBus;
use flashsale_core::counter_store::CounterStore;
use flashsale_core::error::{FlashSaleError, Result};
use flashsale_core::store::ProductStore;
use flashsale_core::types::{OrderMessage, ProductId, UserId};
use std::time::Duration;

/// Lease duration for the locked gate's critical section.
const PURCHASE_LEASE: Duration = Duration::from_secs(10);

/// Compensation retry schedule: attempts and base backoff.
const COMPENSATION_ATTEMPTS: u32 = 3;
const COMPENSATION_BACKOFF: Duration = Duration::from_millis(100);

/// Admission strategy for the purchase path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StockGate {
    /// Lock-free: rely on the counter store's scripted atomic decrement.
    ScriptedAtomic,
    /// Serialize all attempts for one product through a lease.
    Locked,
}

/// Result of an admitted purchase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PurchaseReceipt {
    /// Stock remaining immediately after this purchase's decrement.
    pub remaining_stock: i64,
}

/// Purchase admission over stock control, locking, and the order bus.
#[derive(Clone)]
pub struct FlashSaleService<C, P, B> {
    stock: StockService<C, P>,
    locks: LockManager<C>,
    bus: B,
    gate: StockGate,
    topic: String,
    routing_key: String,
}

impl<C, P, B> FlashSaleService<C, P, B>
where
    C: CounterStore + Clone + Send + Sync + 'static,
    P: ProductStore + Clone + Send + Sync + 'static,
    B: OrderBus,
{
    /// Create a purchase service publishing to `topic`/`routing_key`.
    pub fn new(
        stock: StockService<C, P>,
        locks: LockManager<C>,
        bus: B,
        gate: StockGate,
        topic: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        Self {
            stock,
            locks,
            bus,
            gate,
            topic: topic.into(),
            routing_key: routing_key.into(),
        }
    }

    /// Attempt a purchase of `quantity` units of `product_id`.
    ///
    /// # Errors
    ///
    /// - `Validation` if `quantity` is not positive.
    /// - `InsufficientStock` / `ItemNotPreheated`: business outcomes.
    /// - `LeaseContention` (locked gate only): another purchase holds the
    ///   product's lease; the caller should back off.
    /// - `Publish`: the broker hand-off failed; stock has been
    ///   compensated back before this is returned.
    /// - `TransientStore`: outcome unknown; must not be retried blindly.
    pub async fn purchase(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<PurchaseReceipt> {
        match self.gate {
            StockGate::ScriptedAtomic => {
                self.decrement_and_publish(user_id, product_id, quantity)
                    .await
            }
            StockGate::Locked => self.purchase_locked(user_id, product_id, quantity).await,
        }
    }

    async fn purchase_locked(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<PurchaseReceipt> {
        let resource = keys::sale_lock(product_id);
        let Some(token) = self.locks.try_acquire(&resource, PURCHASE_LEASE).await? else {
            return Err(FlashSaleError::LeaseContention { resource });
        };

        let outcome = self
            .decrement_and_publish(user_id, product_id, quantity)
            .await;

        if let Err(e) = self.locks.release(&resource, &token).await {
            // The lease expires on its own; losing the release only delays
            // the next purchaser by the remaining lease time.
            tracing::warn!(resource = %resource, error = %e, "Lease release failed");
        }

        outcome
    }

    async fn decrement_and_publish(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<PurchaseReceipt> {
        let remaining_stock = self.stock.decrement(product_id, quantity).await?;

        // From here on stock has been taken: any failure before the broker
        // accepts the message must give it back.
        let message = OrderMessage::new(user_id.clone(), product_id.clone(), quantity);
        let publish_result = match serde_json::to_vec(&message) {
            Ok(payload) => {
                self.bus
                    .publish(&self.topic, &self.routing_key, &payload)
                    .await
            }
            Err(e) => Err(FlashSaleError::Serialization(format!(
                "order message encoding failed: {e}"
            ))),
        };

        match publish_result {
            Ok(()) => {
                tracing::info!(
                    user_id = %user_id,
                    product_id = %product_id,
                    quantity,
                    remaining_stock,
                    "Purchase admitted, order hand-off published"
                );
                Ok(PurchaseReceipt { remaining_stock })
            }
            Err(e) => {
                tracing::error!(
                    user_id = %user_id,
                    product_id = %product_id,
                    error = %e,
                    "Order hand-off failed, compensating stock"
                );
                self.compensate(product_id, quantity).await;
                Err(e)
            }
        }
    }

    /// Give reserved stock back after a failed hand-off.
    ///
    /// Retried with backoff: a decremented-but-uncompensated product is a
    /// silent stock leak, so exhaustion is logged at error level with
    /// enough context to reconcile manually.
    async fn compensate(&self, product_id: &ProductId, quantity: i64) {
        for attempt in 1..=COMPENSATION_ATTEMPTS {
            match self.stock.increment(product_id, quantity).await {
                Ok(value) => {
                    tracing::info!(
                        product_id = %product_id,
                        quantity,
                        stock = value,
                        "Stock compensated after failed hand-off"
                    );
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        product_id = %product_id,
                        attempt,
                        error = %e,
                        "Stock compensation attempt failed"
                    );
                    if attempt < COMPENSATION_ATTEMPTS {
                        tokio::time::sleep(COMPENSATION_BACKOFF * attempt).await;
                    }
                }
            }
        }

        tracing::error!(
            product_id = %product_id,
            quantity,
            "STOCK LEAK: compensation exhausted, manual reconciliation required"
        );
    }
}
