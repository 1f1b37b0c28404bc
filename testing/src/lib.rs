//! In-memory mocks for testing the flash-sale inventory engine.
//!
//! Every provider trait from `flashsale-core` has an in-memory double here
//! so the engine's behaviour (oversell prevention, compensation, lease
//! semantics, cache anti-penetration, reconciliation) can be tested
//! without Redis, `PostgreSQL`, or a broker.
//!
//! The [`MemoryCounterStore`] runs the scripted check-and-mutate operations
//! under a single mutex, which gives the same per-key atomicity the Lua
//! scripts give in production.

pub mod mocks;

pub use mocks::{MemoryCounterStore, MemoryOrderBus, MemoryOrderStore, MemoryProductStore};
