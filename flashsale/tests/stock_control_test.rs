//! Stock control tests.
//!
//! Verifies preheat, the oversell-prevention invariant under concurrency,
//! validation fail-fast behaviour, and the administrative override.
//!
//! Run with: `cargo test --test stock_control_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use chrono::Utc;
use flashsale::keys;
use flashsale::StockService;
use flashsale_core::{FlashSaleError, Product, ProductId};
use flashsale_testing::{MemoryCounterStore, MemoryProductStore};

fn product(id: &str, stock: i64) -> Product {
    Product {
        product_id: ProductId::new(id),
        name: format!("Product {id}"),
        stock,
        created_at: Utc::now(),
    }
}

fn service(
    products: Vec<Product>,
) -> (
    StockService<MemoryCounterStore, MemoryProductStore>,
    MemoryCounterStore,
) {
    let counter = MemoryCounterStore::new();
    let store = MemoryProductStore::with_products(products);
    (StockService::new(counter.clone(), store), counter)
}

#[tokio::test]
async fn preheat_copies_every_durable_product() {
    let (stock, counter) = service(vec![product("P1", 5), product("P2", 0)]);

    let preheated = stock.preheat().await.unwrap();

    assert_eq!(preheated, 2);
    assert_eq!(counter.raw_value("product:stock:P1").as_deref(), Some("5"));
    assert_eq!(counter.raw_value("product:stock:P2").as_deref(), Some("0"));
}

#[tokio::test]
async fn decrement_returns_remaining_and_marks_dirty() {
    let (stock, counter) = service(vec![product("P1", 5)]);
    stock.preheat().await.unwrap();

    let remaining = stock.decrement(&ProductId::new("P1"), 2).await.unwrap();

    assert_eq!(remaining, 3);
    assert!(counter.raw_value("stock:sync:P1").is_some());
}

#[tokio::test]
async fn decrement_without_preheat_fails() {
    let (stock, _) = service(vec![]);

    let err = stock.decrement(&ProductId::new("P9"), 1).await.unwrap_err();

    assert!(matches!(err, FlashSaleError::ItemNotPreheated { .. }));
}

#[tokio::test]
async fn non_positive_quantities_fail_fast_without_mutation() {
    let (stock, counter) = service(vec![product("P1", 5)]);
    stock.preheat().await.unwrap();

    let err = stock.decrement(&ProductId::new("P1"), 0).await.unwrap_err();
    assert!(matches!(err, FlashSaleError::Validation(_)));
    let err = stock.increment(&ProductId::new("P1"), -1).await.unwrap_err();
    assert!(matches!(err, FlashSaleError::Validation(_)));
    let err = stock.set_stock(&ProductId::new("P1"), -3).await.unwrap_err();
    assert!(matches!(err, FlashSaleError::Validation(_)));

    assert_eq!(counter.raw_value("product:stock:P1").as_deref(), Some("5"));
    assert!(counter.raw_value("stock:sync:P1").is_none());
}

#[tokio::test]
async fn concurrent_decrements_never_oversell() {
    let (stock, _) = service(vec![product("P1", 50)]);
    stock.preheat().await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..100 {
        let stock = stock.clone();
        tasks.push(tokio::spawn(async move {
            stock.decrement(&ProductId::new("P1"), 1).await
        }));
    }

    let mut successes = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(remaining) => {
                assert!(remaining >= 0);
                successes += 1;
            }
            Err(FlashSaleError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 50);
    assert_eq!(
        stock.current_stock(&ProductId::new("P1")).await.unwrap(),
        Some(0)
    );
}

#[tokio::test]
async fn three_of_four_buyers_win_stock_of_three() {
    let (stock, _) = service(vec![product("P1", 3)]);
    stock.preheat().await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..3 {
        let stock = stock.clone();
        tasks.push(tokio::spawn(async move {
            stock.decrement(&ProductId::new("P1"), 1).await
        }));
    }

    let mut remaining_values = Vec::new();
    for task in tasks {
        remaining_values.push(task.await.unwrap().unwrap());
    }
    remaining_values.sort_unstable();
    assert_eq!(remaining_values, vec![0, 1, 2]);

    let err = stock.decrement(&ProductId::new("P1"), 1).await.unwrap_err();
    assert!(matches!(err, FlashSaleError::InsufficientStock { .. }));
}

#[tokio::test]
async fn advisory_check_is_not_a_guarantee() {
    let (stock, _) = service(vec![product("P1", 1)]);
    stock.preheat().await.unwrap();
    let id = ProductId::new("P1");

    assert!(stock.check_sufficient(&id, 1).await.unwrap());
    assert!(!stock.check_sufficient(&id, 2).await.unwrap());
    assert!(!stock.check_sufficient(&id, 0).await.unwrap());

    // Another purchase lands between the check and the decrement.
    stock.decrement(&id, 1).await.unwrap();
    let err = stock.decrement(&id, 1).await.unwrap_err();
    assert!(matches!(err, FlashSaleError::InsufficientStock { .. }));
}

#[tokio::test]
async fn set_stock_overrides_and_marks_dirty() {
    let (stock, counter) = service(vec![product("P1", 5)]);
    stock.preheat().await.unwrap();
    let id = ProductId::new("P1");

    stock.set_stock(&id, 42).await.unwrap();

    assert_eq!(stock.current_stock(&id).await.unwrap(), Some(42));
    assert!(counter.raw_value("stock:sync:P1").is_some());
}

#[tokio::test]
async fn stats_count_counters_and_pending_syncs() {
    let (stock, _) = service(vec![product("P1", 5), product("P2", 5)]);
    stock.preheat().await.unwrap();
    stock.decrement(&ProductId::new("P1"), 1).await.unwrap();

    let stats = stock.stats().await.unwrap();

    assert_eq!(stats.stock_counters, 2);
    assert_eq!(stats.pending_sync, 1);
}

#[tokio::test]
async fn missing_counter_reads_as_not_preheated() {
    let (stock, counter) = service(vec![product("P1", 5)]);
    stock.preheat().await.unwrap();
    let id = ProductId::new("P1");

    counter.expire_now(&keys::stock(&id));

    assert_eq!(stock.current_stock(&id).await.unwrap(), None);
    let err = stock.increment(&id, 1).await.unwrap_err();
    assert!(matches!(err, FlashSaleError::ItemNotPreheated { .. }));
}
