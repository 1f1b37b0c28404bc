//! Engine services.
//!
//! Each service owns one piece of state from the data model: the stock
//! service owns counter and dirty-mark mutation, the lock manager owns
//! lease lifecycle, the cache service owns detail entries and tombstones,
//! the sync service owns the dirty-to-durable transition, and the order-id
//! generator owns the daily sequence.

pub mod cache;
pub mod flash_sale;
pub mod lock;
pub mod order_creation;
pub mod order_id;
pub mod stock;
pub mod sync;
