//! Order store access
//!
//! The order-sync transport owns the `orders` table; the alert service reads
//! orders to pick the representative of a batch and flips the read/printed
//! flags.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orderbell_common::{Order, OrderId};
use sqlx::{sqlite::SqliteRow, Pool, Row, Sqlite};

/// Status of orders that are still being worked on
pub const STATUS_PROCESSING: &str = "processing";

/// Order lookup and flag updates used by the arrival coordinator
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    async fn order_ids_with_status(&self, status: &str) -> Result<Vec<OrderId>>;

    /// Returns `false` if no such order exists
    async fn mark_read(&self, id: OrderId) -> Result<bool>;

    /// Returns `false` if no such order exists
    async fn mark_printed(&self, id: OrderId) -> Result<bool>;
}

/// [`OrderRepository`] over the SQLite `orders` table
#[derive(Clone)]
pub struct SqliteOrderRepository {
    db: Pool<Sqlite>,
}

impl SqliteOrderRepository {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// Insert or replace an order record
    pub async fn upsert_order(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, number, status, created_at, is_read, is_printed)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                number = excluded.number,
                status = excluded.status,
                created_at = excluded.created_at
            "#,
        )
        .bind(order.id.0)
        .bind(&order.number)
        .bind(&order.status)
        .bind(order.created_at)
        .bind(order.is_read)
        .bind(order.is_printed)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

fn order_from_row(row: &SqliteRow) -> Result<Order> {
    Ok(Order {
        id: OrderId(row.try_get("id")?),
        number: row.try_get("number")?,
        status: row.try_get("status")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        is_read: row.try_get("is_read")?,
        is_printed: row.try_get("is_printed")?,
    })
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            "SELECT id, number, status, created_at, is_read, is_printed FROM orders WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn order_ids_with_status(&self, status: &str) -> Result<Vec<OrderId>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM orders WHERE status = ? ORDER BY created_at")
                .bind(status)
                .fetch_all(&self.db)
                .await?;

        Ok(ids.into_iter().map(OrderId).collect())
    }

    async fn mark_read(&self, id: OrderId) -> Result<bool> {
        let result = sqlx::query("UPDATE orders SET is_read = 1 WHERE id = ?")
            .bind(id.0)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_printed(&self, id: OrderId) -> Result<bool> {
        let result = sqlx::query("UPDATE orders SET is_printed = 1 WHERE id = ?")
            .bind(id.0)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
