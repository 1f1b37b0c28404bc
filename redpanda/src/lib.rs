//! Kafka-compatible order hand-off for the flash-sale inventory engine.
//!
//! After a successful stock decrement the purchase flow publishes an
//! [`OrderMessage`] here and returns immediately; a consumer turns the
//! message into a durable order record out of band. Works against Redpanda,
//! Apache Kafka, or any Kafka-protocol broker.
//!
//! # Delivery Semantics
//!
//! - **Producer**: a send that fails or times out is reported to the
//!   purchase flow, which compensates by incrementing stock back before
//!   surfacing an error. A send that succeeds is fire-and-forget.
//! - **Consumer**: at-least-once. Offsets are committed only after the
//!   handler returns `Ok`, so a crash mid-handling redelivers the message;
//!   handlers must be idempotent.

use flashsale_core::broker::{OrderBus, OrderHandler};
use flashsale_core::error::{FlashSaleError, Result};
use flashsale_core::types::OrderMessage;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Kafka/Redpanda-backed [`OrderBus`].
#[derive(Clone)]
pub struct RedpandaOrderBus {
    producer: FutureProducer,
    send_timeout: Duration,
}

impl RedpandaOrderBus {
    /// Default producer send timeout.
    const SEND_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create a producer against `brokers` (comma-separated addresses).
    ///
    /// # Errors
    ///
    /// Returns `FlashSaleError::TransientStore` if the client cannot be
    /// constructed.
    pub fn new(brokers: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .create()
            .map_err(|e| {
                FlashSaleError::TransientStore(format!("kafka producer creation failed: {e}"))
            })?;

        tracing::info!(brokers = %brokers, "RedpandaOrderBus initialized");

        Ok(Self {
            producer,
            send_timeout: Self::SEND_TIMEOUT,
        })
    }
}

impl OrderBus for RedpandaOrderBus {
    async fn publish(&self, topic: &str, routing_key: &str, payload: &[u8]) -> Result<()> {
        let record = FutureRecord::to(topic).key(routing_key).payload(payload);

        self.producer
            .send(record, Timeout::After(self.send_timeout))
            .await
            .map_err(|(e, _)| FlashSaleError::Publish(format!("kafka send failed: {e}")))?;

        tracing::debug!(topic = %topic, routing_key = %routing_key, "Order message published");
        Ok(())
    }
}

/// Streaming consumer that feeds order messages to an [`OrderHandler`].
pub struct OrderConsumer {
    consumer: StreamConsumer,
    topic: String,
    shutdown: Arc<Notify>,
}

impl OrderConsumer {
    /// Create a consumer subscribed to `topic` in `group`.
    ///
    /// # Errors
    ///
    /// Returns `FlashSaleError::TransientStore` if the client cannot be
    /// constructed or the subscription fails.
    pub fn new(brokers: &str, group: &str, topic: &str) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()
            .map_err(|e| {
                FlashSaleError::TransientStore(format!("kafka consumer creation failed: {e}"))
            })?;

        consumer.subscribe(&[topic]).map_err(|e| {
            FlashSaleError::TransientStore(format!("kafka subscribe to {topic} failed: {e}"))
        })?;

        Ok(Self {
            consumer,
            topic: topic.to_string(),
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Handle for stopping the consumer loop from another task.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Run the consume-decode-handle loop until shutdown is signalled.
    ///
    /// A message that fails to decode is committed and dropped (it will
    /// never succeed on redelivery); a message whose handler fails is left
    /// uncommitted for redelivery.
    ///
    /// # Errors
    ///
    /// Returns `FlashSaleError::TransientStore` only on unrecoverable
    /// consumer failures; per-message errors are logged and absorbed.
    pub async fn run<H: OrderHandler>(&self, handler: H) -> Result<()> {
        tracing::info!(topic = %self.topic, "Order consumer started");

        loop {
            tokio::select! {
                () = self.shutdown.notified() => {
                    tracing::info!(topic = %self.topic, "Order consumer shutting down");
                    return Ok(());
                }
                received = self.consumer.recv() => {
                    match received {
                        Ok(message) => {
                            let decoded = message
                                .payload()
                                .map(serde_json::from_slice::<OrderMessage>);

                            match decoded {
                                Some(Ok(order_message)) => {
                                    match handler.handle(order_message).await {
                                        Ok(()) => {
                                            if let Err(e) = self
                                                .consumer
                                                .commit_message(&message, CommitMode::Async)
                                            {
                                                tracing::warn!(error = %e, "Offset commit failed");
                                            }
                                        }
                                        Err(e) => {
                                            // Left uncommitted: redelivered later.
                                            tracing::error!(error = %e, "Order handling failed");
                                        }
                                    }
                                }
                                Some(Err(e)) => {
                                    tracing::error!(error = %e, "Undecodable order payload, dropping");
                                    if let Err(e) =
                                        self.consumer.commit_message(&message, CommitMode::Async)
                                    {
                                        tracing::warn!(error = %e, "Offset commit failed");
                                    }
                                }
                                None => {
                                    tracing::warn!("Order message with empty payload, dropping");
                                    if let Err(e) =
                                        self.consumer.commit_message(&message, CommitMode::Async)
                                    {
                                        tracing::warn!(error = %e, "Offset commit failed");
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Kafka receive error");
                        }
                    }
                }
            }
        }
    }
}
