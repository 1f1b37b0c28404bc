//! Durable record store contracts.
//!
//! The durable store is the source of truth that outlives the fast store.
//! During normal operation the engine reads it only on cache misses and
//! writes it only from the reconciliation loop and the order consumer, so
//! the traits stay deliberately small: key-addressable CRUD plus a full
//! scan used at preheat time.

use crate::error::Result;
use crate::types::{Order, Product, ProductId};
use std::future::Future;

/// Durable product records.
pub trait ProductStore: Send + Sync {
    /// Fetch a product by id.
    fn find_by_id(&self, id: &ProductId) -> impl Future<Output = Result<Option<Product>>> + Send;

    /// Insert or update a product record.
    fn save(&self, product: &Product) -> impl Future<Output = Result<()>> + Send;

    /// Delete a product by id. Returns whether a record existed.
    fn delete_by_id(&self, id: &ProductId) -> impl Future<Output = Result<bool>> + Send;

    /// Fetch every product. Used only at preheat and reconciliation time.
    fn find_all(&self) -> impl Future<Output = Result<Vec<Product>>> + Send;
}

/// Durable order records.
pub trait OrderStore: Send + Sync {
    /// Fetch an order by id.
    fn find_by_id(&self, order_id: &str) -> impl Future<Output = Result<Option<Order>>> + Send;

    /// Insert an order record.
    fn save(&self, order: &Order) -> impl Future<Output = Result<()>> + Send;
}
