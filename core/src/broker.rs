//! Message broker boundary.
//!
//! The purchase flow hands order creation off to a broker and treats
//! delivery as fire-and-forget: a publish failure triggers the stock
//! compensation before any error reaches the caller. The consuming side
//! decodes the payload back into an [`OrderMessage`](crate::OrderMessage)
//! and dispatches it to an [`OrderHandler`].

use crate::error::Result;
use crate::types::OrderMessage;
use std::future::Future;

/// Producer side of the order hand-off.
pub trait OrderBus: Send + Sync {
    /// Publish `payload` to `topic` under `routing_key`.
    ///
    /// A returned error means the message may not have been delivered;
    /// the caller must run its compensation path.
    fn publish(
        &self,
        topic: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Consumer-side processor for order messages.
pub trait OrderHandler: Send + Sync {
    /// Process one decoded order message.
    ///
    /// Returning an error leaves the message uncommitted so the broker
    /// redelivers it; handlers must therefore be idempotent.
    fn handle(&self, message: OrderMessage) -> impl Future<Output = Result<()>> + Send;
}
