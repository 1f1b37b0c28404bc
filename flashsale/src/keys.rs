//! Fast-store key layout.
//!
//! Every key the engine writes lives under one of these prefixes so that
//! unrelated tenants of a shared store cannot collide with it, and so the
//! reconciliation scan can enumerate dirty marks by prefix alone.

use flashsale_core::types::ProductId;

/// Stock counter per product.
pub const STOCK_PREFIX: &str = "product:stock:";

/// Dirty mark per product awaiting reconciliation (short TTL).
pub const DIRTY_PREFIX: &str = "stock:sync:";

/// Serialized product detail cache entry.
pub const DETAIL_PREFIX: &str = "product:detail:";

/// Negative-cache tombstone for a confirmed-absent product.
pub const TOMBSTONE_PREFIX: &str = "product:null:";

/// Per-product purchase lease for the lock-based gate.
pub const SALE_LOCK_PREFIX: &str = "flash:sale:lock:";

/// Daily order-id counter (no TTL).
pub const ORDER_COUNTER_KEY: &str = "order:id:counter";

/// Date stamp the order-id counter belongs to (multi-day TTL).
pub const ORDER_DATE_KEY: &str = "order:id:date";

/// Stock counter key for a product.
#[must_use]
pub fn stock(id: &ProductId) -> String {
    format!("{STOCK_PREFIX}{id}")
}

/// Dirty-mark key for a product.
#[must_use]
pub fn dirty(id: &ProductId) -> String {
    format!("{DIRTY_PREFIX}{id}")
}

/// Detail-cache key for a product.
#[must_use]
pub fn detail(id: &ProductId) -> String {
    format!("{DETAIL_PREFIX}{id}")
}

/// Tombstone key for a product.
#[must_use]
pub fn tombstone(id: &ProductId) -> String {
    format!("{TOMBSTONE_PREFIX}{id}")
}

/// Purchase-lease key for a product.
#[must_use]
pub fn sale_lock(id: &ProductId) -> String {
    format!("{SALE_LOCK_PREFIX}{id}")
}

/// Recover the product id from a dirty-mark key found by a prefix scan.
#[must_use]
pub fn product_id_from_dirty(key: &str) -> Option<ProductId> {
    key.strip_prefix(DIRTY_PREFIX)
        .filter(|rest| !rest.is_empty())
        .map(ProductId::new)
}
