//! Consumer-side order creation.
//!
//! Turns an [`OrderMessage`] delivered by the broker into a durable order
//! record with a freshly generated id. Runs behind the at-least-once
//! consumer, so a handler error leaves the message uncommitted for
//! redelivery.

use crate::services::order_id::OrderIdGenerator;
use chrono::Utc;
use flashsale_core::broker::OrderHandler;
use flashsale_core::counter_store::CounterStore;
use flashsale_core::error::Result;
use flashsale_core::store::OrderStore;
use flashsale_core::types::{Order, OrderMessage, OrderStatus};

/// Creates durable orders from broker messages.
#[derive(Clone)]
pub struct OrderCreationService<C, O> {
    order_ids: OrderIdGenerator<C>,
    orders: O,
}

impl<C: CounterStore, O: OrderStore> OrderCreationService<C, O> {
    /// Create the handler.
    pub const fn new(order_ids: OrderIdGenerator<C>, orders: O) -> Self {
        Self { order_ids, orders }
    }
}

impl<C: CounterStore, O: OrderStore> OrderHandler for OrderCreationService<C, O> {
    async fn handle(&self, message: OrderMessage) -> Result<()> {
        if message.quantity <= 0 {
            // Poison message: retrying will never help, drop it.
            tracing::warn!(
                user_id = %message.user_id,
                product_id = %message.product_id,
                quantity = message.quantity,
                "Dropping order message with non-positive quantity"
            );
            return Ok(());
        }

        let order_id = self.order_ids.generate().await?;
        let order = Order {
            order_id: order_id.clone(),
            user_id: message.user_id,
            product_id: message.product_id,
            quantity: message.quantity,
            order_time: Utc::now(),
            status: OrderStatus::Processing,
        };

        self.orders.save(&order).await?;
        tracing::info!(
            order_id = %order_id,
            user_id = %order.user_id,
            product_id = %order.product_id,
            "Order record created"
        );
        Ok(())
    }
}
