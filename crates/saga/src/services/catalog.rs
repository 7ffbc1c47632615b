//! Catalog service trait, HTTP client and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{EventId, Money, OrderId};
use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// A price quote for one catalog event.
#[derive(Debug, Clone, Copy)]
pub struct PriceQuote {
    /// Current unit price.
    pub unit_price: Money,
    /// Remaining permanent stock at quote time. Informational only; the
    /// reservation service arbitrates contention.
    pub available_stock: u32,
}

/// Trait for catalog operations.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Fetches the current unit price and remaining stock for an event.
    async fn get_price(&self, event_id: EventId) -> Result<PriceQuote, SagaError>;

    /// Permanently decrements stock after a confirmed payment.
    ///
    /// At-least-once: the call may be retried, so the order id travels with
    /// it and the catalog de-duplicates on it.
    async fn commit_stock_reduction(
        &self,
        event_id: EventId,
        quantity: u32,
        order_id: OrderId,
    ) -> Result<(), SagaError>;
}

#[derive(Deserialize)]
struct ConcertResponse {
    price: f64,
    stock: u32,
}

#[derive(Serialize)]
struct StockCommitRequest {
    reduce_by: u32,
    order_id: String,
}

/// HTTP client for the catalog service.
///
/// Consumes `GET {base}/api/concerts/{id}` and
/// `PATCH {base}/api/concerts/{id}/stock`. The `reqwest::Client` is built by
/// the caller with a bounded timeout; a timeout counts as unavailability.
#[derive(Clone)]
pub struct HttpCatalogClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalogClient {
    /// Creates a new catalog client against the given base URL.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CatalogService for HttpCatalogClient {
    async fn get_price(&self, event_id: EventId) -> Result<PriceQuote, SagaError> {
        let url = format!("{}/api/concerts/{}", self.base_url, event_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SagaError::CatalogUnavailable(e.to_string()))?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Err(SagaError::EventNotFound(event_id)),
            status if status.is_success() => {
                let concert: ConcertResponse = response
                    .json()
                    .await
                    .map_err(|e| SagaError::CatalogUnavailable(e.to_string()))?;
                Ok(PriceQuote {
                    unit_price: Money::from_major_units(concert.price),
                    available_stock: concert.stock,
                })
            }
            status => Err(SagaError::CatalogUnavailable(format!(
                "price lookup returned {status}"
            ))),
        }
    }

    async fn commit_stock_reduction(
        &self,
        event_id: EventId,
        quantity: u32,
        order_id: OrderId,
    ) -> Result<(), SagaError> {
        let url = format!("{}/api/concerts/{}/stock", self.base_url, event_id);
        let response = self
            .client
            .patch(&url)
            .json(&StockCommitRequest {
                reduce_by: quantity,
                order_id: order_id.to_string(),
            })
            .send()
            .await
            .map_err(|e| SagaError::CatalogUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SagaError::CatalogUnavailable(format!(
                "stock commit returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    events: HashMap<EventId, (Money, u32)>,
    committed: HashSet<OrderId>,
    commit_calls: usize,
    fail_on_commit: bool,
    unavailable: bool,
}

/// In-memory catalog service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogService {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryCatalogService {
    /// Creates a new empty in-memory catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an event with a unit price and permanent stock.
    pub fn add_event(&self, event_id: EventId, unit_price: Money, stock: u32) {
        self.state
            .write()
            .unwrap()
            .events
            .insert(event_id, (unit_price, stock));
    }

    /// Returns the remaining permanent stock for an event.
    pub fn stock_of(&self, event_id: EventId) -> Option<u32> {
        self.state
            .read()
            .unwrap()
            .events
            .get(&event_id)
            .map(|(_, stock)| *stock)
    }

    /// Returns how many commit calls were attempted (including duplicates).
    pub fn commit_calls(&self) -> usize {
        self.state.read().unwrap().commit_calls
    }

    /// Configures the service to fail commit calls.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.state.write().unwrap().fail_on_commit = fail;
    }

    /// Simulates the catalog being unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalogService {
    async fn get_price(&self, event_id: EventId) -> Result<PriceQuote, SagaError> {
        let state = self.state.read().unwrap();
        if state.unavailable {
            return Err(SagaError::CatalogUnavailable("simulated outage".to_string()));
        }
        state
            .events
            .get(&event_id)
            .map(|(price, stock)| PriceQuote {
                unit_price: *price,
                available_stock: *stock,
            })
            .ok_or(SagaError::EventNotFound(event_id))
    }

    async fn commit_stock_reduction(
        &self,
        event_id: EventId,
        quantity: u32,
        order_id: OrderId,
    ) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap();
        state.commit_calls += 1;

        if state.unavailable {
            return Err(SagaError::CatalogUnavailable("simulated outage".to_string()));
        }
        if state.fail_on_commit {
            return Err(SagaError::CatalogUnavailable(
                "simulated commit failure".to_string(),
            ));
        }

        // De-duplicate by order id: a retried commit must not decrement twice.
        if !state.committed.insert(order_id) {
            return Ok(());
        }

        let (_, stock) = state
            .events
            .get_mut(&event_id)
            .ok_or(SagaError::EventNotFound(event_id))?;
        *stock = stock.saturating_sub(quantity);
        Ok(())
    }
}
