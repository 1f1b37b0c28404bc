//! Error taxonomy for the flash-sale engine.

use thiserror::Error;

/// Result type alias for flash-sale operations.
pub type Result<T> = std::result::Result<T, FlashSaleError>;

/// Error taxonomy covering every failure mode of the engine.
///
/// Business outcomes (`InsufficientStock`, `CounterExhausted`,
/// `LeaseContention`) are distinct from system faults (`TransientStore`)
/// so callers can map them to user-visible responses without inspecting
/// message strings. A `TransientStore` error during a purchase means
/// "outcome unknown": the caller must not assume the decrement happened
/// or blindly retry without idempotency protection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlashSaleError {
    // ═══════════════════════════════════════════════════════════
    // Validation
    // ═══════════════════════════════════════════════════════════
    /// Malformed argument. Fails fast, never touches storage.
    #[error("Invalid argument: {0}")]
    Validation(String),

    // ═══════════════════════════════════════════════════════════
    // Business Outcomes
    // ═══════════════════════════════════════════════════════════
    /// Stock cannot satisfy the requested quantity. Not a system fault.
    #[error("Insufficient stock for product {product_id}")]
    InsufficientStock {
        /// Product whose stock was insufficient.
        product_id: String,
    },

    /// No stock counter exists for the item (never preheated or evicted).
    #[error("Product {product_id} has no preheated stock counter")]
    ItemNotPreheated {
        /// Product missing from the fast store.
        product_id: String,
    },

    /// Requested record does not exist in the durable store.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// The daily order-id counter exceeded its configured maximum.
    #[error("Daily order counter exhausted (counter {counter})")]
    CounterExhausted {
        /// Counter value that exceeded the maximum.
        counter: i64,
    },

    /// A distributed lock could not be acquired. Caller should back off.
    #[error("Lock contention on resource {resource}")]
    LeaseContention {
        /// Resource name the lease was attempted on.
        resource: String,
    },

    // ═══════════════════════════════════════════════════════════
    // System Faults
    // ═══════════════════════════════════════════════════════════
    /// Store-level failure (timeout, connection loss). Retryable by the
    /// caller with idempotency awareness.
    #[error("Transient store error: {0}")]
    TransientStore(String),

    /// Cached payload could not be (de)serialized. Read paths fall back
    /// to the durable store instead of propagating this.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Broker publish failure. Triggers stock compensation in the
    /// purchase flow before being surfaced.
    #[error("Broker publish failed: {0}")]
    Publish(String),
}

impl FlashSaleError {
    /// Whether this error is a transient system fault worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientStore(_) | Self::Publish(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_outcomes_are_not_transient() {
        let err = FlashSaleError::InsufficientStock {
            product_id: "P1".to_string(),
        };
        assert!(!err.is_transient());
        assert!(FlashSaleError::TransientStore("timeout".to_string()).is_transient());
    }

    #[test]
    fn errors_render_without_internal_details() {
        let err = FlashSaleError::LeaseContention {
            resource: "stock:lock:P1".to_string(),
        };
        assert_eq!(err.to_string(), "Lock contention on resource stock:lock:P1");
    }
}
