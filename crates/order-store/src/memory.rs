use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, UserId};
use tokio::sync::RwLock;

use crate::{
    NewOrder, Order, OrderStatus, ReconciliationLog, ReconciliationRecord, Result, StoreError,
    store::OrderStore,
};

#[derive(Default)]
struct InMemoryState {
    orders: Vec<Order>,
    unavailable: bool,
}

/// In-memory order store for tests and local development.
///
/// Provides the same interface as the PostgreSQL implementation, plus an
/// unavailability toggle to exercise the saga's store-failure paths.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates connectivity loss: every operation fails with
    /// `StoreError::Unavailable` while set.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

fn check_available(state: &InMemoryState) -> Result<()> {
    if state.unavailable {
        return Err(StoreError::Unavailable("simulated outage".to_string()));
    }
    Ok(())
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: NewOrder) -> Result<Order> {
        let mut state = self.state.write().await;
        check_available(&state)?;

        let now = Utc::now();
        let persisted = Order {
            id: OrderId::new(),
            user_id: order.user_id,
            event_id: order.event_id,
            quantity: order.quantity,
            total: order.total,
            status: OrderStatus::Pending,
            needs_reconciliation: false,
            created_at: now,
            updated_at: now,
        };
        state.orders.push(persisted.clone());
        Ok(persisted)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        check_available(&state)?;
        Ok(state.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn update(&self, order: &Order) -> Result<Order> {
        let mut state = self.state.write().await;
        check_available(&state)?;

        let existing = state
            .orders
            .iter_mut()
            .find(|o| o.id == order.id)
            .ok_or(StoreError::NotFound(order.id))?;

        let mut updated = order.clone();
        updated.updated_at = Utc::now();
        *existing = updated.clone();
        Ok(updated)
    }

    async fn list_all(&self) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        check_available(&state)?;
        Ok(state.orders.clone())
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        check_available(&state)?;

        // Orders are held in insertion order, so reverse iteration yields
        // newest-first without relying on timestamp resolution.
        Ok(state
            .orders
            .iter()
            .rev()
            .filter(|o| &o.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// In-memory reconciliation log for tests.
#[derive(Clone, Default)]
pub struct InMemoryReconciliationLog {
    records: Arc<RwLock<Vec<ReconciliationRecord>>>,
}

impl InMemoryReconciliationLog {
    /// Creates a new empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all records written so far.
    pub async fn records(&self) -> Vec<ReconciliationRecord> {
        self.records.read().await.clone()
    }

    /// Returns the number of records written so far.
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl ReconciliationLog for InMemoryReconciliationLog {
    async fn record(&self, record: ReconciliationRecord) -> Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }
}
