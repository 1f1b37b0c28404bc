//! Domain types for the flash-sale engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a product.
///
/// Products keep their externally assigned string identifiers (SKUs), so
/// this wraps a `String` rather than a generated UUID.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(String);

impl ProductId {
    /// Create a `ProductId` from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Unique identifier for a user.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create a `UserId` from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Records
// ============================================================================

/// A product record as held in the durable store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier (SKU).
    pub product_id: ProductId,
    /// Display name.
    pub name: String,
    /// Durable stock count. The fast store's counter is authoritative
    /// between reconciliation cycles; this value trails it.
    pub stock: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Lifecycle status of an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Order message consumed, record persisted, awaiting fulfilment.
    Processing,
    /// Order fulfilled.
    Success,
    /// Order failed after persistence.
    Failed,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing => write!(f, "PROCESSING"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// An order record as held in the durable store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Date-scoped order identifier (`YYYYMMDD` + 6-digit counter).
    pub order_id: String,
    /// Purchasing user.
    pub user_id: UserId,
    /// Purchased product.
    pub product_id: ProductId,
    /// Purchased quantity.
    pub quantity: i64,
    /// When the order record was created.
    pub order_time: DateTime<Utc>,
    /// Current lifecycle status.
    pub status: OrderStatus,
}

// ============================================================================
// Messages
// ============================================================================

/// Payload handed to the broker after a successful stock decrement.
///
/// The consumer on the other end turns this into a durable [`Order`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderMessage {
    /// Purchasing user.
    pub user_id: UserId,
    /// Purchased product.
    pub product_id: ProductId,
    /// Purchased quantity.
    pub quantity: i64,
}

impl OrderMessage {
    /// Create a new order message.
    #[must_use]
    pub const fn new(user_id: UserId, product_id: ProductId, quantity: i64) -> Self {
        Self {
            user_id,
            product_id,
            quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn order_message_round_trips_as_json() {
        let msg = OrderMessage::new(UserId::new("u1"), ProductId::new("P1"), 2);
        let json = serde_json::to_string(&msg).unwrap();
        let back: OrderMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn order_status_display_matches_stored_form() {
        assert_eq!(OrderStatus::Processing.to_string(), "PROCESSING");
        assert_eq!(OrderStatus::Success.to_string(), "SUCCESS");
        assert_eq!(OrderStatus::Failed.to_string(), "FAILED");
    }
}
