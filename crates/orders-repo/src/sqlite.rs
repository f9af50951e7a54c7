use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orders_types::domain::order::{LineItem, Order, OrderStatus};
use orders_types::ports::order_store::{OrderIntake, OrderStore, StoreError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

const SELECT_ORDER: &str = "SELECT id, customer_id, total_cents, items_json, status, shipped_date, finalized_date, created_at FROM orders WHERE id = ?";

/// SQLite-backed store. A conditional write is one `UPDATE` guarded by the
/// expected status, which SQLite applies atomically.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct DbOrder {
    id: String,
    customer_id: String,
    total_cents: i64,
    items_json: String,
    status: String,
    shipped_date: Option<String>,
    finalized_date: Option<String>,
    created_at: String,
}

fn storage(e: impl Into<anyhow::Error>) -> StoreError {
    StoreError::Storage(e.into())
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(storage)?
        .with_timezone(&Utc))
}

impl DbOrder {
    fn into_order(self) -> Result<Order, StoreError> {
        let status = OrderStatus::from_str(&self.status).map_err(storage)?;
        let items: Vec<LineItem> = serde_json::from_str(&self.items_json).map_err(storage)?;
        let id = Uuid::parse_str(&self.id).map_err(storage)?;
        Ok(Order {
            id,
            customer_id: self.customer_id,
            items,
            total_cents: self.total_cents,
            status,
            shipped_date: self.shipped_date.as_deref().map(parse_time).transpose()?,
            finalized_date: self.finalized_date.as_deref().map(parse_time).transpose()?,
            created_at: parse_time(&self.created_at)?,
        })
    }
}

impl SqliteStore {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let in_memory = database_url.contains(":memory:");

        // Ensure on-disk SQLite target directory exists.
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            if !in_memory {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every connection to `:memory:` opens its own database, so keep one.
        let mut pool_options = SqlitePoolOptions::new();
        if in_memory {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        }
        let pool = pool_options.connect_with(options).await?;

        let ddl = include_str!("../migrations/0001_create_orders.sql");
        sqlx::query(ddl).execute(&pool).await?;

        tracing::debug!(database_url, "sqlite order store ready");
        Ok(Self { pool })
    }

    async fn stored_status(&self, id: Uuid) -> Result<Option<OrderStatus>, StoreError> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        status
            .map(|s| OrderStatus::from_str(&s).map_err(storage))
            .transpose()
    }
}

#[async_trait]
impl OrderStore for SqliteStore {
    async fn read(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row: Option<DbOrder> = sqlx::query_as(SELECT_ORDER)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.map(|r| r.into_order()).transpose()
    }

    async fn conditional_write(&self, next: &Order, expected: &Order) -> Result<(), StoreError> {
        if next.id != expected.id {
            return Err(storage(anyhow::anyhow!(
                "conditional write for {} against snapshot of {}",
                next.id,
                expected.id
            )));
        }
        // Items and totals are immutable, so only the lifecycle columns move.
        let updated = sqlx::query(
            "UPDATE orders SET status = ?, shipped_date = ?, finalized_date = ?
             WHERE id = ? AND status = ?",
        )
        .bind(next.status.as_str())
        .bind(next.shipped_date.map(|d| d.to_rfc3339()))
        .bind(next.finalized_date.map(|d| d.to_rfc3339()))
        .bind(next.id.to_string())
        .bind(expected.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if updated.rows_affected() == 1 {
            return Ok(());
        }
        match self.stored_status(next.id).await? {
            None => Err(StoreError::NotFound(next.id)),
            Some(current) => Err(StoreError::Conflict {
                id: next.id,
                current,
            }),
        }
    }
}

#[async_trait]
impl OrderIntake for SqliteStore {
    async fn insert(&self, order: Order) -> Result<(), StoreError> {
        let items_json = serde_json::to_string(&order.items).map_err(storage)?;
        sqlx::query(
            "INSERT INTO orders (id, customer_id, total_cents, items_json, status, shipped_date, finalized_date, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(order.id.to_string())
        .bind(&order.customer_id)
        .bind(order.total_cents)
        .bind(items_json)
        .bind(order.status.as_str())
        .bind(order.shipped_date.map(|d| d.to_rfc3339()))
        .bind(order.finalized_date.map(|d| d.to_rfc3339()))
        .bind(order.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }
}
