//! Forces every interleaving of two competing transitions' store calls.
//!
//! Each caller gets its own `GatedStore` around a shared backend. A gated
//! call waits for a permit from the test driver, runs against the backend and
//! acknowledges, so the driver decides the exact order of the four steps
//! (read A, write A, read B, write B).

use async_trait::async_trait;
use orders_hex::application::order_lifecycle::OrderLifecycle;
use orders_hex::errors::AppError;
use orders_repo::memory::InMemoryStore;
use orders_repo::sqlite::SqliteStore;
use orders_types::domain::order::{LineItem, Order, OrderStatus};
use orders_types::ports::order_store::{OrderIntake, OrderStore, StoreError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

struct Gate {
    permits: Mutex<mpsc::Receiver<()>>,
    acks: mpsc::Sender<()>,
    writes: Arc<AtomicUsize>,
}

impl Gate {
    async fn enter(&self) {
        // A closed channel means the driver is done scheduling; run freely.
        let _ = self.permits.lock().await.recv().await;
    }

    async fn leave(&self) {
        let _ = self.acks.send(()).await;
    }
}

struct GatedStore<S> {
    inner: S,
    gate: Gate,
}

#[async_trait]
impl<S: OrderStore> OrderStore for GatedStore<S> {
    async fn read(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        self.gate.enter().await;
        let res = self.inner.read(id).await;
        self.gate.leave().await;
        res
    }

    async fn conditional_write(&self, next: &Order, expected: &Order) -> Result<(), StoreError> {
        self.gate.enter().await;
        self.gate.writes.fetch_add(1, Ordering::SeqCst);
        let res = self.inner.conditional_write(next, expected).await;
        self.gate.leave().await;
        res
    }
}

/// Driver side of one caller's gate.
struct Stepper {
    permits: mpsc::Sender<()>,
    acks: mpsc::Receiver<()>,
}

impl Stepper {
    /// Lets the caller run exactly one store call. Returns immediately if the
    /// caller has already finished and needs no further calls.
    async fn step(&mut self) {
        if self.permits.send(()).await.is_err() {
            return;
        }
        let _ = self.acks.recv().await;
    }
}

fn gated<S: OrderStore>(inner: S, writes: Arc<AtomicUsize>) -> (GatedStore<S>, Stepper) {
    let (permit_tx, permit_rx) = mpsc::channel(1);
    let (ack_tx, ack_rx) = mpsc::channel(1);
    let store = GatedStore {
        inner,
        gate: Gate {
            permits: Mutex::new(permit_rx),
            acks: ack_tx,
            writes,
        },
    };
    (
        store,
        Stepper {
            permits: permit_tx,
            acks: ack_rx,
        },
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Ship,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Caller {
    A,
    B,
}

/// All orderings of two steps for A and two for B.
const SCHEDULES: [[Caller; 4]; 6] = {
    use Caller::*;
    [
        [A, A, B, B],
        [A, B, A, B],
        [A, B, B, A],
        [B, A, A, B],
        [B, A, B, A],
        [B, B, A, A],
    ]
};

/// Both reads happen before either write.
fn overlapping(schedule: &[Caller; 4]) -> bool {
    schedule[0] != schedule[1]
}

struct RaceOutcome {
    a: Result<Order, AppError>,
    b: Result<Order, AppError>,
    stored: Order,
    writes: usize,
}

async fn race<S>(backend: S, id: Uuid, ops: (Op, Op), schedule: [Caller; 4]) -> RaceOutcome
where
    S: OrderStore + Clone,
{
    let writes = Arc::new(AtomicUsize::new(0));
    let (store_a, mut step_a) = gated(backend.clone(), writes.clone());
    let (store_b, mut step_b) = gated(backend.clone(), writes.clone());

    let task_a = tokio::spawn(run(OrderLifecycle::new(store_a), id, ops.0));
    let task_b = tokio::spawn(run(OrderLifecycle::new(store_b), id, ops.1));

    for caller in schedule {
        match caller {
            Caller::A => step_a.step().await,
            Caller::B => step_b.step().await,
        }
    }
    drop(step_a);
    drop(step_b);

    let a = task_a.await.expect("task a");
    let b = task_b.await.expect("task b");
    let stored = backend.read(id).await.unwrap().expect("order still stored");
    RaceOutcome {
        a,
        b,
        stored,
        writes: writes.load(Ordering::SeqCst),
    }
}

async fn run<S: OrderStore>(
    lifecycle: OrderLifecycle<S>,
    id: Uuid,
    op: Op,
) -> Result<Order, AppError> {
    match op {
        Op::Ship => lifecycle.ship_order(id).await,
        Op::Cancel => lifecycle.cancel_order(id).await,
    }
}

async fn seed<S: OrderIntake>(store: &S, status: OrderStatus) -> Order {
    let mut order = Order::new(
        "c1".into(),
        vec![LineItem {
            sku: "i1".into(),
            name: "Item 1".into(),
            price_cents: 100,
            quantity: 1,
        }],
    )
    .unwrap();
    order.status = status;
    if status == OrderStatus::Shipped || status == OrderStatus::Delivered {
        order.shipped_date = Some(chrono::Utc::now());
    }
    if status == OrderStatus::Cancelled {
        order.finalized_date = Some(chrono::Utc::now());
    }
    store.insert(order.clone()).await.unwrap();
    order
}

fn is_lost(res: &Result<Order, AppError>) -> bool {
    matches!(res, Err(AppError::InvalidTransition { .. }))
}

fn assert_consistent(stored: &Order) {
    assert!(stored.is_consistent(), "inconsistent record: {stored:?}");
    assert!(
        !(stored.shipped_date.is_some() && stored.finalized_date.is_some()),
        "both dates set: {stored:?}"
    );
}

async fn ship_vs_cancel<S>(backend: S)
where
    S: OrderStore + OrderIntake + Clone,
{
    for schedule in SCHEDULES {
        let order = seed(&backend, OrderStatus::Processing).await;
        let out = race(backend.clone(), order.id, (Op::Ship, Op::Cancel), schedule).await;
        assert_consistent(&out.stored);

        let winners = [&out.a, &out.b].iter().filter(|r| r.is_ok()).count();
        if overlapping(&schedule) {
            // Same pre-race snapshot: exactly one commit.
            assert_eq!(winners, 1, "{schedule:?}");
            assert_eq!(out.writes, 2, "{schedule:?}");
            let first_writer = schedule[2];
            match first_writer {
                Caller::A => {
                    assert!(is_lost(&out.b), "{schedule:?}");
                    assert_eq!(out.stored.status, OrderStatus::Shipped);
                    assert_eq!(out.stored, *out.a.as_ref().unwrap());
                }
                Caller::B => {
                    assert!(is_lost(&out.a), "{schedule:?}");
                    assert_eq!(out.stored.status, OrderStatus::Cancelled);
                    assert_eq!(out.stored, *out.b.as_ref().unwrap());
                }
            }
        } else if schedule[0] == Caller::A {
            // Ship commits, then cancel legitimately cancels the shipped order.
            assert_eq!(winners, 2, "{schedule:?}");
            assert_eq!(out.stored.status, OrderStatus::Cancelled);
            assert!(out.stored.shipped_date.is_none());
        } else {
            // Cancel commits; ship then reads Cancelled and never writes.
            assert_eq!(winners, 1, "{schedule:?}");
            assert!(is_lost(&out.a));
            assert_eq!(out.writes, 1, "{schedule:?}");
            assert_eq!(out.stored.status, OrderStatus::Cancelled);
        }
    }
}

async fn cancel_vs_cancel<S>(backend: S)
where
    S: OrderStore + OrderIntake + Clone,
{
    for start in [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
    ] {
        for schedule in SCHEDULES {
            let order = seed(&backend, start).await;
            let out = race(backend.clone(), order.id, (Op::Cancel, Op::Cancel), schedule).await;
            assert_consistent(&out.stored);
            assert_eq!(out.stored.status, OrderStatus::Cancelled);

            let winners = [&out.a, &out.b].iter().filter(|r| r.is_ok()).count();
            assert_eq!(winners, 1, "{start} {schedule:?}");
            assert!(is_lost(&out.a) || is_lost(&out.b));
            let winner = out.a.as_ref().or(out.b.as_ref()).unwrap();
            assert_eq!(out.stored, *winner);
        }
    }
}

async fn neither_legal<S>(backend: S)
where
    S: OrderStore + OrderIntake + Clone,
{
    for start in [OrderStatus::Delivered, OrderStatus::Cancelled] {
        for schedule in SCHEDULES {
            let order = seed(&backend, start).await;
            let out = race(backend.clone(), order.id, (Op::Ship, Op::Cancel), schedule).await;
            assert!(is_lost(&out.a) && is_lost(&out.b), "{start} {schedule:?}");
            assert_eq!(out.writes, 0);
            assert_eq!(out.stored, order);
        }
    }
}

async fn sqlite_backend() -> (tempfile::TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("race.db").display());
    let store = SqliteStore::new(&url).await.unwrap();
    (dir, store)
}

#[tokio::test]
async fn ship_vs_cancel_every_interleaving_in_memory() {
    ship_vs_cancel(InMemoryStore::new()).await;
}

#[tokio::test]
async fn ship_vs_cancel_every_interleaving_on_sqlite() {
    let (_dir, store) = sqlite_backend().await;
    ship_vs_cancel(store).await;
}

#[tokio::test]
async fn ship_vs_cancel_every_interleaving_on_sqlite_memory() {
    ship_vs_cancel(SqliteStore::new("sqlite::memory:").await.unwrap()).await;
}

#[tokio::test]
async fn cancel_vs_cancel_every_interleaving_in_memory() {
    cancel_vs_cancel(InMemoryStore::new()).await;
}

#[tokio::test]
async fn cancel_vs_cancel_every_interleaving_on_sqlite() {
    let (_dir, store) = sqlite_backend().await;
    cancel_vs_cancel(store).await;
}

#[tokio::test]
async fn finished_order_rejects_both_without_writing() {
    neither_legal(InMemoryStore::new()).await;
    let (_dir, store) = sqlite_backend().await;
    neither_legal(store).await;
}
