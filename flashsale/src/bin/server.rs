//! Flash-sale engine server process.
//!
//! Connects to Redis, `PostgreSQL`, and the broker; preheats stock; runs
//! the reconciliation loop and the order-creation consumer until Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! # Start infrastructure
//! docker compose up -d
//!
//! # Run server
//! cargo run --bin server
//! ```

use flashsale::{App, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,flashsale=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting flash-sale engine...");

    let config = Config::from_env();
    tracing::info!(
        redis = %config.redis.url,
        redpanda = %config.redpanda.brokers,
        "Configuration loaded"
    );

    let app = App::connect(config).await?;
    tracing::info!("Engine wired, stock preheated");

    let consumer = app.order_consumer()?;
    let consumer_shutdown = consumer.shutdown_handle();
    let handler = app.order_handler();
    let consumer_task = tokio::spawn(async move {
        if let Err(e) = consumer.run(handler).await {
            tracing::error!(error = %e, "Order consumer terminated");
        }
    });

    tracing::info!("Flash-sale engine is running, press Ctrl+C to shut down");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down gracefully...");
    consumer_shutdown.notify_one();
    let _ = consumer_task.await;
    app.shutdown().await;

    Ok(())
}
