use async_trait::async_trait;
use common::{OrderId, UserId};

use crate::{NewOrder, Order, Result};

/// Core trait for order ledger implementations.
///
/// Single-row insert and update are atomic; no transaction ever spans an
/// order row and a remote collaborator call. All implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order with status `Pending`.
    ///
    /// The store assigns the id and both timestamps and returns the
    /// persisted row.
    async fn insert(&self, order: NewOrder) -> Result<Order>;

    /// Retrieves an order by id. Returns None if it does not exist.
    async fn get(&self, id: OrderId) -> Result<Option<Order>>;

    /// Persists an updated order, refreshing `updated_at`.
    ///
    /// Fails with `StoreError::NotFound` if the id does not exist.
    async fn update(&self, order: &Order) -> Result<Order>;

    /// Lists every order, oldest first.
    async fn list_all(&self) -> Result<Vec<Order>>;

    /// Lists orders for one user, newest first.
    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Order>>;
}
