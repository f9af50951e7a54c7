use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use orders_types::domain::order::Order;
use orders_types::ports::order_store::{OrderIntake, OrderStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Process-local store. The compare and the swap of a conditional write both
/// happen under the shard write guard, so writers to one id are serialized.
#[derive(Clone)]
pub struct InMemoryStore {
    map: Arc<DashMap<Uuid, Order>>,
    latency: Option<Duration>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            map: Arc::new(DashMap::new()),
            latency: None,
        }
    }

    /// Sleeps for `latency` before every read and write, widening the window
    /// between a caller's read and its write. Clones share the same map.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn read(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        self.delay().await;
        Ok(self.map.get(&id).map(|r| r.clone()))
    }

    async fn conditional_write(&self, next: &Order, expected: &Order) -> Result<(), StoreError> {
        if next.id != expected.id {
            return Err(anyhow::anyhow!(
                "conditional write for {} against snapshot of {}",
                next.id,
                expected.id
            )
            .into());
        }
        self.delay().await;
        // The guard must not live across an await.
        let mut stored = self
            .map
            .get_mut(&next.id)
            .ok_or(StoreError::NotFound(next.id))?;
        if *stored != *expected {
            return Err(StoreError::Conflict {
                id: next.id,
                current: stored.status,
            });
        }
        *stored = next.clone();
        Ok(())
    }
}

#[async_trait]
impl OrderIntake for InMemoryStore {
    async fn insert(&self, order: Order) -> Result<(), StoreError> {
        match self.map.entry(order.id) {
            Entry::Occupied(_) => Err(anyhow::anyhow!("order {} already exists", order.id).into()),
            Entry::Vacant(slot) => {
                slot.insert(order);
                Ok(())
            }
        }
    }
}
