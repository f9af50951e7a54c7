#[cfg(not(any(feature = "memory", feature = "sqlite")))]
compile_error!("Enable a store feature: `memory` or `sqlite`.");

use async_trait::async_trait;
use orders_types::domain::order::Order;
use orders_types::ports::order_store::{OrderIntake, OrderStore, StoreError};
use uuid::Uuid;

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub const DEFAULT_DATABASE_URL: &str = "sqlite://orders.db";

/// Store selected by the enabled cargo features.
#[derive(Clone)]
pub enum Store {
    #[cfg(feature = "memory")]
    Memory(memory::InMemoryStore),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite::SqliteStore),
}

pub async fn build_store(url: Option<&str>) -> anyhow::Result<Store> {
    Store::build(url).await
}

impl Store {
    #[cfg(all(feature = "memory", not(feature = "sqlite")))]
    pub async fn build(_: Option<&str>) -> anyhow::Result<Self> {
        tracing::info!("using in-memory order store");
        Ok(Self::Memory(memory::InMemoryStore::new()))
    }

    #[cfg(all(feature = "sqlite", not(feature = "memory")))]
    pub async fn build(database_url: Option<&str>) -> anyhow::Result<Self> {
        let url = database_url.unwrap_or(DEFAULT_DATABASE_URL);
        tracing::info!(url, "using sqlite order store");
        Ok(Self::Sqlite(sqlite::SqliteStore::new(url).await?))
    }

    // With both backends compiled in, a database url picks sqlite.
    #[cfg(all(feature = "sqlite", feature = "memory"))]
    pub async fn build(database_url: Option<&str>) -> anyhow::Result<Self> {
        match database_url {
            Some(url) => {
                tracing::info!(url, "using sqlite order store");
                Ok(Self::Sqlite(sqlite::SqliteStore::new(url).await?))
            }
            None => {
                tracing::info!("using in-memory order store");
                Ok(Self::Memory(memory::InMemoryStore::new()))
            }
        }
    }
}

#[async_trait]
impl OrderStore for Store {
    async fn read(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        match self {
            #[cfg(feature = "memory")]
            Self::Memory(s) => s.read(id).await,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(s) => s.read(id).await,
        }
    }

    async fn conditional_write(&self, next: &Order, expected: &Order) -> Result<(), StoreError> {
        match self {
            #[cfg(feature = "memory")]
            Self::Memory(s) => s.conditional_write(next, expected).await,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(s) => s.conditional_write(next, expected).await,
        }
    }
}

#[async_trait]
impl OrderIntake for Store {
    async fn insert(&self, order: Order) -> Result<(), StoreError> {
        match self {
            #[cfg(feature = "memory")]
            Self::Memory(s) => s.insert(order).await,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(s) => s.insert(order).await,
        }
    }
}
