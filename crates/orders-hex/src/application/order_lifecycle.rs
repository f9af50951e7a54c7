use crate::errors::AppError;
use chrono::Utc;
use orders_types::domain::order::{LineItem, Order, Transition};
use orders_types::ports::order_store::{OrderIntake, OrderStore, StoreError};
use uuid::Uuid;

/// Validates and executes status transitions against an [`OrderStore`].
///
/// Every call re-reads the record. The status check made against that read
/// only spares the store an obviously illegal write; the store's conditional
/// write is what keeps two racing transitions from both committing. A lost
/// race is reported as [`AppError::InvalidTransition`] and never retried here.
pub struct OrderLifecycle<S: OrderStore> {
    store: S,
}

impl<S: OrderStore> OrderLifecycle<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Order, AppError> {
        match self.store.read(id).await {
            Ok(Some(o)) => Ok(o),
            Ok(None) => Err(AppError::NotFound(format!("order {}", id))),
            Err(e) => Err(store_failure(e)),
        }
    }

    /// Processing → Shipped, stamping `shipped_date`.
    pub async fn ship_order(&self, id: Uuid) -> Result<Order, AppError> {
        self.transition(id, Transition::Ship).await
    }

    /// Pending, Processing or Shipped → Cancelled, stamping `finalized_date`.
    pub async fn cancel_order(&self, id: Uuid) -> Result<Order, AppError> {
        self.transition(id, Transition::Cancel).await
    }

    pub async fn process_order(&self, id: Uuid) -> Result<Order, AppError> {
        self.transition(id, Transition::Process).await
    }

    pub async fn deliver_order(&self, id: Uuid) -> Result<Order, AppError> {
        self.transition(id, Transition::Deliver).await
    }

    async fn transition(&self, id: Uuid, transition: Transition) -> Result<Order, AppError> {
        let snapshot = self.get_order(id).await?;

        let next = snapshot.apply(transition, Utc::now()).map_err(|e| {
            tracing::debug!(order_id = %id, %transition, status = %e.status, "transition rejected");
            AppError::from(e)
        })?;

        match self.store.conditional_write(&next, &snapshot).await {
            Ok(()) => {
                tracing::info!(order_id = %id, %transition, from = %snapshot.status, to = %next.status, "order transitioned");
                Ok(next)
            }
            Err(StoreError::Conflict { current, .. }) => {
                tracing::warn!(
                    order_id = %id,
                    %transition,
                    read = %snapshot.status,
                    status = %current,
                    "lost race: order changed between read and write"
                );
                Err(AppError::InvalidTransition {
                    id,
                    transition,
                    status: current,
                })
            }
            Err(e) => Err(store_failure(e)),
        }
    }
}

impl<S: OrderStore + OrderIntake> OrderLifecycle<S> {
    /// Validates and stores a new Pending order.
    pub async fn place_order(
        &self,
        customer_id: String,
        items: Vec<LineItem>,
    ) -> Result<Order, AppError> {
        let order =
            Order::new(customer_id, items).map_err(|e| AppError::BadRequest(e.to_string()))?;
        self.store
            .insert(order.clone())
            .await
            .map_err(store_failure)?;
        tracing::info!(order_id = %order.id, total_cents = order.total_cents, "order placed");
        Ok(order)
    }
}

fn store_failure(e: StoreError) -> AppError {
    match e {
        StoreError::NotFound(id) => AppError::NotFound(format!("order {}", id)),
        StoreError::Storage(cause) => {
            tracing::error!(error = ?cause, "order store failure");
            AppError::StorageFailure(cause)
        }
        // Only a conditional write reports conflicts; `transition` maps those.
        StoreError::Conflict { id, current } => AppError::StorageFailure(anyhow::anyhow!(
            "unexpected conflict on order {id} (status {current})"
        )),
    }
}
