//! `PostgreSQL` durable stores for the flash-sale inventory engine.
//!
//! The relational database is the durable source of truth for products and
//! orders. The engine touches it sparingly by design: full product scans at
//! preheat, point reads on detail-cache misses, stock writes from the
//! reconciliation loop, and order inserts from the broker consumer. The hot
//! purchase path never blocks on it.
//!
//! Schema lives in `migrations/0001_schema.sql`.

use chrono::{DateTime, Utc};
use flashsale_core::error::{FlashSaleError, Result};
use flashsale_core::store::{OrderStore, ProductStore};
use flashsale_core::types::{Order, OrderStatus, Product, ProductId, UserId};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;

/// Build a connection pool with bounded acquire timeouts.
///
/// # Errors
///
/// Returns `FlashSaleError::TransientStore` if the database is unreachable.
pub async fn connect_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .map_err(|e| FlashSaleError::TransientStore(format!("postgres connect failed: {e}")))?;

    tracing::info!(max_connections, "PostgreSQL pool initialized");
    Ok(pool)
}

fn db_err(operation: &str, e: &sqlx::Error) -> FlashSaleError {
    FlashSaleError::TransientStore(format!("postgres {operation} failed: {e}"))
}

// ============================================================================
// Products
// ============================================================================

#[derive(FromRow)]
struct ProductRow {
    product_id: String,
    name: String,
    stock: i64,
    created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            product_id: ProductId::new(row.product_id),
            name: row.name,
            stock: row.stock,
            created_at: row.created_at,
        }
    }
}

/// `PostgreSQL`-backed [`ProductStore`].
#[derive(Clone)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ProductStore for PgProductStore {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(
            "SELECT product_id, name, stock, created_at FROM product WHERE product_id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("product select", &e))?;

        Ok(row.map(Product::from))
    }

    async fn save(&self, product: &Product) -> Result<()> {
        sqlx::query(
            "INSERT INTO product (product_id, name, stock, created_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (product_id) DO UPDATE SET name = $2, stock = $3",
        )
        .bind(product.product_id.as_str())
        .bind(&product.name)
        .bind(product.stock)
        .bind(product.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("product upsert", &e))?;

        Ok(())
    }

    async fn delete_by_id(&self, id: &ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM product WHERE product_id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("product delete", &e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_all(&self) -> Result<Vec<Product>> {
        let rows: Vec<ProductRow> =
            sqlx::query_as("SELECT product_id, name, stock, created_at FROM product")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_err("product scan", &e))?;

        Ok(rows.into_iter().map(Product::from).collect())
    }
}

// ============================================================================
// Orders
// ============================================================================

#[derive(FromRow)]
struct OrderRow {
    order_id: String,
    user_id: String,
    product_id: String,
    quantity: i64,
    order_time: DateTime<Utc>,
    status: String,
}

impl TryFrom<OrderRow> for Order {
    type Error = FlashSaleError;

    fn try_from(row: OrderRow) -> Result<Self> {
        let status = match row.status.as_str() {
            "PROCESSING" => OrderStatus::Processing,
            "SUCCESS" => OrderStatus::Success,
            "FAILED" => OrderStatus::Failed,
            other => {
                return Err(FlashSaleError::Serialization(format!(
                    "unknown order status '{other}' for order {}",
                    row.order_id
                )));
            }
        };

        Ok(Self {
            order_id: row.order_id,
            user_id: UserId::new(row.user_id),
            product_id: ProductId::new(row.product_id),
            quantity: row.quantity,
            order_time: row.order_time,
            status,
        })
    }
}

/// `PostgreSQL`-backed [`OrderStore`].
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl OrderStore for PgOrderStore {
    async fn find_by_id(&self, order_id: &str) -> Result<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT order_id, user_id, product_id, quantity, order_time, status \
             FROM orders WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("order select", &e))?;

        row.map(Order::try_from).transpose()
    }

    async fn save(&self, order: &Order) -> Result<()> {
        // Insert-only: an existing order record is never overwritten.
        sqlx::query(
            "INSERT INTO orders (order_id, user_id, product_id, quantity, order_time, status) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (order_id) DO NOTHING",
        )
        .bind(&order.order_id)
        .bind(order.user_id.as_str())
        .bind(order.product_id.as_str())
        .bind(order.quantity)
        .bind(order.order_time)
        .bind(order.status.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("order insert", &e))?;

        Ok(())
    }
}
