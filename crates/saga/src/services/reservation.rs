//! Reservation service trait, HTTP client and in-memory implementation.
//!
//! The reservation service is the sole arbiter of per-event stock
//! contention: `reserve` is an atomic check-and-decrement on an ephemeral
//! counter, so a race for the last unit yields exactly one winner.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{EventId, UserId};

use crate::error::SagaError;

/// Path segment order for the reservation service URLs.
///
/// Two revisions of the upstream disagree on whether the quantity or the
/// user comes first in `/reserve/{event}/…/…`. Which revision is deployed is
/// configuration, not something this client guesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReservationPathOrder {
    /// `/reserve/{event}/{quantity}/{user}` (current upstream revision).
    #[default]
    QuantityThenUser,
    /// `/reserve/{event}/{user}/{quantity}` (older upstream revision).
    UserThenQuantity,
}

impl ReservationPathOrder {
    /// Parses the configuration value (`"qty-user"` or `"user-qty"`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "qty-user" => Some(ReservationPathOrder::QuantityThenUser),
            "user-qty" => Some(ReservationPathOrder::UserThenQuantity),
            _ => None,
        }
    }
}

/// Trait for reservation lock operations.
#[async_trait]
pub trait ReservationService: Send + Sync {
    /// Places a short-lived stock lock for `(event, user, quantity)`.
    ///
    /// Fails with `Conflict` when stock is insufficient or the user already
    /// holds a lock for this event.
    async fn reserve(
        &self,
        event_id: EventId,
        user_id: &UserId,
        quantity: u32,
    ) -> Result<(), SagaError>;

    /// Converts a held lock into a permanent release after payment.
    /// Idempotent: confirming an absent lock succeeds.
    async fn confirm(
        &self,
        event_id: EventId,
        user_id: &UserId,
        quantity: u32,
    ) -> Result<(), SagaError>;

    /// Compensating action: frees a held lock and returns its quantity to
    /// the ephemeral counter.
    async fn release(&self, event_id: EventId, user_id: &UserId) -> Result<(), SagaError>;
}

/// HTTP client for the reservation service.
#[derive(Clone)]
pub struct HttpReservationClient {
    client: reqwest::Client,
    base_url: String,
    path_order: ReservationPathOrder,
}

impl HttpReservationClient {
    /// Creates a new reservation client against the given base URL.
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        path_order: ReservationPathOrder,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            path_order,
        }
    }

    fn locked_path(&self, action: &str, event_id: EventId, user_id: &UserId, quantity: u32) -> String {
        match self.path_order {
            ReservationPathOrder::QuantityThenUser => {
                format!("{}/{action}/{event_id}/{quantity}/{user_id}", self.base_url)
            }
            ReservationPathOrder::UserThenQuantity => {
                format!("{}/{action}/{event_id}/{user_id}/{quantity}", self.base_url)
            }
        }
    }

    async fn post(&self, url: String) -> Result<reqwest::Response, SagaError> {
        self.client
            .post(&url)
            .send()
            .await
            .map_err(|e| SagaError::ReservationUnavailable(e.to_string()))
    }
}

#[async_trait]
impl ReservationService for HttpReservationClient {
    async fn reserve(
        &self,
        event_id: EventId,
        user_id: &UserId,
        quantity: u32,
    ) -> Result<(), SagaError> {
        let url = self.locked_path("reserve", event_id, user_id, quantity);
        let response = self.post(url).await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status.is_client_error() {
            // Upstream body text stays out of the error; it is not ours to
            // forward to callers.
            Err(SagaError::Conflict {
                reason: "stock exhausted or lock already held".to_string(),
            })
        } else {
            Err(SagaError::ReservationUnavailable(format!(
                "reserve returned {status}"
            )))
        }
    }

    async fn confirm(
        &self,
        event_id: EventId,
        user_id: &UserId,
        quantity: u32,
    ) -> Result<(), SagaError> {
        let url = self.locked_path("confirm-payment", event_id, user_id, quantity);
        let response = self.post(url).await?;

        let status = response.status();
        // 404 means the lock is already gone; confirm is idempotent.
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(SagaError::ReservationUnavailable(format!(
                "confirm returned {status}"
            )))
        }
    }

    async fn release(&self, event_id: EventId, user_id: &UserId) -> Result<(), SagaError> {
        let url = format!("{}/release/{event_id}/{user_id}", self.base_url);
        let response = self.post(url).await?;

        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(SagaError::ReservationUnavailable(format!(
                "release returned {status}"
            )))
        }
    }
}

#[derive(Debug, Default)]
struct InMemoryReservationState {
    stock: HashMap<EventId, u32>,
    locks: HashMap<(EventId, UserId), u32>,
    fail_on_confirm: bool,
    fail_on_release: bool,
    unavailable: bool,
}

/// In-memory reservation service for testing.
///
/// All state lives behind one lock, which gives `reserve` the same
/// atomic check-and-decrement the real service provides.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReservationService {
    state: Arc<RwLock<InMemoryReservationState>>,
}

impl InMemoryReservationService {
    /// Creates a new empty in-memory reservation service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the ephemeral stock counter for an event.
    pub fn set_stock(&self, event_id: EventId, stock: u32) {
        self.state.write().unwrap().stock.insert(event_id, stock);
    }

    /// Returns the remaining ephemeral stock for an event.
    pub fn stock_of(&self, event_id: EventId) -> Option<u32> {
        self.state.read().unwrap().stock.get(&event_id).copied()
    }

    /// Returns the number of currently held locks.
    pub fn lock_count(&self) -> usize {
        self.state.read().unwrap().locks.len()
    }

    /// Returns true if the user holds a lock for the event.
    pub fn has_lock(&self, event_id: EventId, user_id: &UserId) -> bool {
        self.state
            .read()
            .unwrap()
            .locks
            .contains_key(&(event_id, user_id.clone()))
    }

    /// Configures the service to fail confirm calls.
    pub fn set_fail_on_confirm(&self, fail: bool) {
        self.state.write().unwrap().fail_on_confirm = fail;
    }

    /// Configures the service to fail release calls.
    pub fn set_fail_on_release(&self, fail: bool) {
        self.state.write().unwrap().fail_on_release = fail;
    }

    /// Simulates the reservation service being unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }
}

#[async_trait]
impl ReservationService for InMemoryReservationService {
    async fn reserve(
        &self,
        event_id: EventId,
        user_id: &UserId,
        quantity: u32,
    ) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap();
        if state.unavailable {
            return Err(SagaError::ReservationUnavailable(
                "simulated outage".to_string(),
            ));
        }

        let key = (event_id, user_id.clone());
        if state.locks.contains_key(&key) {
            return Err(SagaError::Conflict {
                reason: format!("user {user_id} already holds a lock for event {event_id}"),
            });
        }

        let stock = state.stock.get(&event_id).copied().unwrap_or(0);
        if stock < quantity {
            return Err(SagaError::Conflict {
                reason: format!("insufficient stock for event {event_id}"),
            });
        }

        state.stock.insert(event_id, stock - quantity);
        state.locks.insert(key, quantity);
        Ok(())
    }

    async fn confirm(
        &self,
        event_id: EventId,
        user_id: &UserId,
        _quantity: u32,
    ) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap();
        if state.unavailable || state.fail_on_confirm {
            return Err(SagaError::ReservationUnavailable(
                "simulated confirm failure".to_string(),
            ));
        }

        // Removing an absent lock is fine; confirm is idempotent.
        state.locks.remove(&(event_id, user_id.clone()));
        Ok(())
    }

    async fn release(&self, event_id: EventId, user_id: &UserId) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap();
        if state.unavailable || state.fail_on_release {
            return Err(SagaError::ReservationUnavailable(
                "simulated release failure".to_string(),
            ));
        }

        if let Some(quantity) = state.locks.remove(&(event_id, user_id.clone())) {
            let stock = state.stock.entry(event_id).or_insert(0);
            *stock += quantity;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with(order: ReservationPathOrder) -> HttpReservationClient {
        HttpReservationClient::new(reqwest::Client::new(), "http://reservation:5002", order)
    }

    #[test]
    fn test_reserve_path_quantity_then_user() {
        let client = client_with(ReservationPathOrder::QuantityThenUser);
        let path = client.locked_path("reserve", EventId::new(7), &UserId::new("u1"), 2);
        assert_eq!(path, "http://reservation:5002/reserve/7/2/u1");
    }

    #[test]
    fn test_reserve_path_user_then_quantity() {
        let client = client_with(ReservationPathOrder::UserThenQuantity);
        let path = client.locked_path("confirm-payment", EventId::new(7), &UserId::new("u1"), 2);
        assert_eq!(path, "http://reservation:5002/confirm-payment/7/u1/2");
    }

    #[test]
    fn test_path_order_parse() {
        assert_eq!(
            ReservationPathOrder::parse("qty-user"),
            Some(ReservationPathOrder::QuantityThenUser)
        );
        assert_eq!(
            ReservationPathOrder::parse("user-qty"),
            Some(ReservationPathOrder::UserThenQuantity)
        );
        assert_eq!(ReservationPathOrder::parse("other"), None);
    }

    #[tokio::test]
    async fn test_reserve_decrements_stock_and_holds_lock() {
        let service = InMemoryReservationService::new();
        service.set_stock(EventId::new(7), 3);
        let user = UserId::new("u1");

        service.reserve(EventId::new(7), &user, 2).await.unwrap();
        assert_eq!(service.stock_of(EventId::new(7)), Some(1));
        assert!(service.has_lock(EventId::new(7), &user));
    }

    #[tokio::test]
    async fn test_reserve_insufficient_stock() {
        let service = InMemoryReservationService::new();
        service.set_stock(EventId::new(7), 1);

        let result = service.reserve(EventId::new(7), &UserId::new("u1"), 2).await;
        assert!(matches!(result, Err(SagaError::Conflict { .. })));
        assert_eq!(service.stock_of(EventId::new(7)), Some(1));
    }

    #[tokio::test]
    async fn test_duplicate_lock_rejected() {
        let service = InMemoryReservationService::new();
        service.set_stock(EventId::new(7), 5);
        let user = UserId::new("u1");

        service.reserve(EventId::new(7), &user, 1).await.unwrap();
        let result = service.reserve(EventId::new(7), &user, 1).await;
        assert!(matches!(result, Err(SagaError::Conflict { .. })));
        assert_eq!(service.lock_count(), 1);
    }

    #[tokio::test]
    async fn test_confirm_is_idempotent() {
        let service = InMemoryReservationService::new();
        service.set_stock(EventId::new(7), 3);
        let user = UserId::new("u1");

        service.reserve(EventId::new(7), &user, 2).await.unwrap();
        service.confirm(EventId::new(7), &user, 2).await.unwrap();
        assert!(!service.has_lock(EventId::new(7), &user));

        // Second confirm must not error and must not change stock.
        service.confirm(EventId::new(7), &user, 2).await.unwrap();
        assert_eq!(service.stock_of(EventId::new(7)), Some(1));
    }

    #[tokio::test]
    async fn test_release_returns_stock() {
        let service = InMemoryReservationService::new();
        service.set_stock(EventId::new(7), 3);
        let user = UserId::new("u1");

        service.reserve(EventId::new(7), &user, 2).await.unwrap();
        service.release(EventId::new(7), &user).await.unwrap();

        assert_eq!(service.stock_of(EventId::new(7)), Some(3));
        assert_eq!(service.lock_count(), 0);
    }

    #[tokio::test]
    async fn test_release_without_lock_is_noop() {
        let service = InMemoryReservationService::new();
        service.set_stock(EventId::new(7), 3);

        service.release(EventId::new(7), &UserId::new("u1")).await.unwrap();
        assert_eq!(service.stock_of(EventId::new(7)), Some(3));
    }
}
