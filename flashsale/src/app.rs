//! Composition root.
//!
//! Builds every client and service from configuration, preheats the stock
//! counters, and starts the reconciliation loop. All connection state is
//! constructed here and injected explicitly; shutdown stops the sync loop
//! and aborts outstanding lock watchdogs.

use crate::config::Config;
use crate::services::cache::ProductCacheService;
use crate::services::flash_sale::FlashSaleService;
use crate::services::lock::LockManager;
use crate::services::order_creation::OrderCreationService;
use crate::services::order_id::OrderIdGenerator;
use crate::services::stock::StockService;
use crate::services::sync::{StockSyncService, SyncHandle};
use flashsale_core::error::Result;
use flashsale_postgres::{connect_pool, PgOrderStore, PgProductStore};
use flashsale_redis::RedisCounterStore;
use flashsale_redpanda::{OrderConsumer, RedpandaOrderBus};

/// A fully wired engine instance.
pub struct App {
    /// Purchase admission flow.
    pub flash_sale: FlashSaleService<RedisCounterStore, PgProductStore, RedpandaOrderBus>,
    /// Stock control (admin set, advisory reads, stats).
    pub stock: StockService<RedisCounterStore, PgProductStore>,
    /// Product detail reads.
    pub cache: ProductCacheService<RedisCounterStore, PgProductStore>,
    /// Forced reconciliation of single products.
    pub sync: StockSyncService<RedisCounterStore, PgProductStore>,
    locks: LockManager<RedisCounterStore>,
    order_handler: OrderCreationService<RedisCounterStore, PgOrderStore>,
    sync_handle: SyncHandle,
    config: Config,
}

impl App {
    /// Connect to all collaborators, preheat stock, and start the
    /// reconciliation loop.
    ///
    /// # Errors
    ///
    /// Returns `TransientStore` if any collaborator is unreachable or the
    /// preheat scan fails.
    pub async fn connect(config: Config) -> Result<Self> {
        let counter = RedisCounterStore::connect(&config.redis.url).await?;
        let pool = connect_pool(&config.postgres.url, config.postgres.max_connections).await?;
        let products = PgProductStore::new(pool.clone());
        let orders = PgOrderStore::new(pool);
        let bus = RedpandaOrderBus::new(&config.redpanda.brokers)?;

        let stock = StockService::new(counter.clone(), products.clone())
            .with_dirty_ttl(config.dirty_ttl());
        stock.preheat().await?;

        let cache = ProductCacheService::new(counter.clone(), products.clone());
        let sync = StockSyncService::new(counter.clone(), products, cache.clone());
        let sync_handle = sync.clone().spawn(config.sync_interval());

        let locks = LockManager::new(counter.clone());
        let flash_sale = FlashSaleService::new(
            stock.clone(),
            locks.clone(),
            bus,
            config.stock_gate(),
            config.redpanda.order_topic.clone(),
            config.redpanda.order_routing_key.clone(),
        );

        let order_handler =
            OrderCreationService::new(OrderIdGenerator::new(counter.clone()), orders);

        tracing::info!(gate = ?config.stock_gate(), "Flash-sale engine wired");

        Ok(Self {
            flash_sale,
            stock,
            cache,
            sync,
            locks,
            order_handler,
            sync_handle,
            config,
        })
    }

    /// Build the broker consumer that creates durable orders.
    ///
    /// # Errors
    ///
    /// Returns `TransientStore` if the consumer cannot be constructed.
    pub fn order_consumer(&self) -> Result<OrderConsumer> {
        OrderConsumer::new(
            &self.config.redpanda.brokers,
            &self.config.redpanda.consumer_group,
            &self.config.redpanda.order_topic,
        )
    }

    /// The handler the order consumer dispatches to.
    #[must_use]
    pub fn order_handler(&self) -> OrderCreationService<RedisCounterStore, PgOrderStore> {
        self.order_handler.clone()
    }

    /// Stop the reconciliation loop and abort lock watchdogs.
    pub async fn shutdown(self) {
        self.sync_handle.stop().await;
        self.locks.shutdown().await;
        tracing::info!("Flash-sale engine shut down");
    }
}
