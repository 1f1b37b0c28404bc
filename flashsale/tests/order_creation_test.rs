//! Order creation handler tests.
//!
//! Verifies that a broker message becomes a durable order in the
//! processing state with a well-formed id, and that poison messages are
//! dropped rather than retried forever.
//!
//! Run with: `cargo test --test order_creation_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use flashsale::services::order_id::validate;
use flashsale::{OrderCreationService, OrderIdGenerator};
use flashsale_core::{OrderHandler, OrderMessage, OrderStatus, ProductId, UserId};
use flashsale_testing::{MemoryCounterStore, MemoryOrderStore};

fn handler() -> (
    OrderCreationService<MemoryCounterStore, MemoryOrderStore>,
    MemoryOrderStore,
) {
    let orders = MemoryOrderStore::new();
    let service = OrderCreationService::new(
        OrderIdGenerator::new(MemoryCounterStore::new()),
        orders.clone(),
    );
    (service, orders)
}

#[tokio::test]
async fn message_becomes_a_processing_order_with_a_valid_id() {
    let (service, orders) = handler();

    service
        .handle(OrderMessage::new(
            UserId::new("u1"),
            ProductId::new("P1"),
            2,
        ))
        .await
        .unwrap();

    let saved = orders.all();
    assert_eq!(saved.len(), 1);
    let order = &saved[0];
    assert!(validate(&order.order_id));
    assert_eq!(order.user_id, UserId::new("u1"));
    assert_eq!(order.product_id, ProductId::new("P1"));
    assert_eq!(order.quantity, 2);
    assert_eq!(order.status, OrderStatus::Processing);
}

#[tokio::test]
async fn each_message_gets_its_own_order() {
    let (service, orders) = handler();

    for i in 1..=3 {
        service
            .handle(OrderMessage::new(
                UserId::new(format!("u{i}")),
                ProductId::new("P1"),
                1,
            ))
            .await
            .unwrap();
    }

    let mut ids: Vec<String> = orders.all().into_iter().map(|o| o.order_id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn non_positive_quantity_is_dropped_without_an_order() {
    let (service, orders) = handler();

    service
        .handle(OrderMessage::new(
            UserId::new("u1"),
            ProductId::new("P1"),
            0,
        ))
        .await
        .unwrap();
    service
        .handle(OrderMessage::new(
            UserId::new("u1"),
            ProductId::new("P1"),
            -5,
        ))
        .await
        .unwrap();

    assert!(orders.all().is_empty());
}
