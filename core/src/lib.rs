//! Core traits and types for the flash-sale inventory engine.
//!
//! This crate defines the contracts between the engine and its collaborators:
//!
//! - [`CounterStore`]: the fast store offering scripted atomic
//!   check-and-decrement/check-and-increment operations. This is the
//!   load-bearing abstraction: its per-key atomicity is what prevents
//!   overselling under concurrent purchase attempts.
//! - [`ProductStore`] / [`OrderStore`]: the durable, key-addressable record
//!   stores (backed by `PostgreSQL` in production).
//! - [`OrderBus`] / [`OrderHandler`]: the message broker boundary used to
//!   hand off order creation asynchronously.
//!
//! Implementations live in sibling crates (`flashsale-redis`,
//! `flashsale-postgres`, `flashsale-redpanda`); in-memory mocks for tests
//! live in `flashsale-testing`.

pub mod broker;
pub mod counter_store;
pub mod error;
pub mod store;
pub mod types;

pub use broker::{OrderBus, OrderHandler};
pub use counter_store::{CounterStore, CounterUpdate};
pub use error::{FlashSaleError, Result};
pub use store::{OrderStore, ProductStore};
pub use types::{Order, OrderMessage, OrderStatus, Product, ProductId, UserId};
