//! Flash-sale admission control and inventory consistency engine.
//!
//! This crate decides, under heavy concurrent contention, whether a purchase
//! may proceed against strictly limited stock, guarantees no item is
//! oversold, and keeps the fast in-memory stock view eventually consistent
//! with the durable store.
//!
//! # Architecture
//!
//! ```text
//! purchase ──► FlashSaleService ──► StockService ──► CounterStore (atomic)
//!                   │                    │
//!                   │ publish            │ dirty mark
//!                   ▼                    ▼
//!               OrderBus          StockSyncService ──► ProductStore
//!                   │                    │                (durable)
//!                   ▼                    ▼
//!             OrderConsumer      ProductCacheService
//! ```
//!
//! The only cross-request serialization point is the counter store's
//! scripted decrement, which the store itself executes atomically per key.
//! A publish failure after a successful decrement triggers the stock
//! compensation before the caller sees an error. The reconciliation job
//! flushes dirty counters back to the durable store on a fixed period,
//! bounding its staleness.

pub mod app;
pub mod config;
pub mod keys;
pub mod services;

pub use app::App;
pub use config::Config;
pub use services::cache::{CacheStats, ProductCacheService};
pub use services::flash_sale::{FlashSaleService, PurchaseReceipt, StockGate};
pub use services::lock::LockManager;
pub use services::order_creation::OrderCreationService;
pub use services::order_id::{CounterStatus, OrderIdGenerator};
pub use services::stock::{StockService, StockStats};
pub use services::sync::{StockSyncService, SyncHandle, SyncReport};
