use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Position along the forward-only lifecycle. Cancelled is terminal and
    /// ranks above everything it can be reached from.
    pub fn rank(self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Processing => 1,
            OrderStatus::Shipped => 2,
            OrderStatus::Delivered => 3,
            OrderStatus::Cancelled => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(OrderStatus::Pending),
            "Processing" => Ok(OrderStatus::Processing),
            "Shipped" => Ok(OrderStatus::Shipped),
            "Delivered" => Ok(OrderStatus::Delivered),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A status change requested against a stored order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Transition {
    Process,
    Ship,
    Deliver,
    Cancel,
}

impl Transition {
    pub fn target(self) -> OrderStatus {
        match self {
            Transition::Process => OrderStatus::Processing,
            Transition::Ship => OrderStatus::Shipped,
            Transition::Deliver => OrderStatus::Delivered,
            Transition::Cancel => OrderStatus::Cancelled,
        }
    }

    pub fn permits(self, from: OrderStatus) -> bool {
        use OrderStatus::*;
        match self {
            Transition::Process => from == Pending,
            Transition::Ship => from == Processing,
            Transition::Deliver => from == Shipped,
            Transition::Cancel => matches!(from, Pending | Processing | Shipped),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Transition::Process => "process",
            Transition::Ship => "ship",
            Transition::Deliver => "deliver",
            Transition::Cancel => "cancel",
        })
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot {transition} order {id}: status is {status}")]
pub struct TransitionError {
    pub id: Uuid,
    pub transition: Transition,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItem {
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: String,
    pub items: Vec<LineItem>,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub shipped_date: Option<DateTime<Utc>>,
    pub finalized_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(customer_id: String, items: Vec<LineItem>) -> anyhow::Result<Self> {
        if customer_id.trim().is_empty() {
            anyhow::bail!("customer_id empty");
        }
        if items.is_empty() {
            anyhow::bail!("items empty");
        }
        for it in &items {
            if it.sku.trim().is_empty() {
                anyhow::bail!("item sku empty");
            }
            if it.quantity == 0 {
                anyhow::bail!("item quantity must be > 0");
            }
            if it.price_cents < 0 {
                anyhow::bail!("item price must not be negative");
            }
        }
        let total = items
            .iter()
            .try_fold(0i64, |acc, it| {
                it.price_cents
                    .checked_mul(i64::from(it.quantity))
                    .and_then(|line| acc.checked_add(line))
            })
            .ok_or_else(|| anyhow::anyhow!("order total overflows"))?;
        Ok(Self {
            id: Uuid::new_v4(),
            customer_id,
            items,
            total_cents: total,
            status: OrderStatus::Pending,
            shipped_date: None,
            finalized_date: None,
            created_at: Utc::now(),
        })
    }

    /// Builds the record that results from applying `transition` at `at`.
    /// `self` is left as is, so it can serve as the expected prior snapshot
    /// of a conditional write.
    pub fn apply(&self, transition: Transition, at: DateTime<Utc>) -> Result<Order, TransitionError> {
        if !transition.permits(self.status) {
            return Err(TransitionError {
                id: self.id,
                transition,
                status: self.status,
            });
        }
        let mut next = self.clone();
        next.status = transition.target();
        match transition {
            Transition::Ship => next.shipped_date = Some(at),
            Transition::Cancel => {
                next.finalized_date = Some(at);
                next.shipped_date = None;
            }
            Transition::Process | Transition::Deliver => {}
        }
        Ok(next)
    }

    /// Checks that the date fields agree with the status.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            OrderStatus::Pending | OrderStatus::Processing => {
                self.shipped_date.is_none() && self.finalized_date.is_none()
            }
            OrderStatus::Shipped | OrderStatus::Delivered => {
                self.shipped_date.is_some() && self.finalized_date.is_none()
            }
            OrderStatus::Cancelled => self.finalized_date.is_some() && self.shipped_date.is_none(),
        }
    }
}
