use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::order::{Order, OrderStatus};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("order {0} not found")]
    NotFound(Uuid),

    #[error("order {id} was changed concurrently; stored status is {current}")]
    Conflict { id: Uuid, current: OrderStatus },

    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Point read plus an atomic conditional write over one record per order id.
///
/// `conditional_write` commits `next` only if the stored record still matches
/// `expected`, at least in `status`. Otherwise it returns
/// [`StoreError::Conflict`] and leaves the record untouched. Concurrent
/// conditional writes against the same id must be serialized so that at most
/// one of them succeeds for a given prior snapshot.
#[async_trait]
pub trait OrderStore: Send + Sync + 'static {
    async fn read(&self, id: Uuid) -> Result<Option<Order>, StoreError>;
    async fn conditional_write(&self, next: &Order, expected: &Order) -> Result<(), StoreError>;
}

/// Order placement. Kept apart from [`OrderStore`] so the transition path
/// never depends on it.
#[async_trait]
pub trait OrderIntake: Send + Sync + 'static {
    async fn insert(&self, order: Order) -> Result<(), StoreError>;
}
