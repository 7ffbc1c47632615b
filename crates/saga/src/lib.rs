//! Saga coordination for ticket purchases.
//!
//! The purchase of a ticket crosses three independently failing services:
//! the catalog (price and permanent stock), the reservation service
//! (short-lived stock locks) and the local order ledger. This crate
//! implements the two workflows that tie them together:
//!
//! 1. create-order: quote price → reserve stock → persist a PENDING order,
//!    releasing the reservation lock if the persist step fails.
//! 2. confirm-payment: flip the order to SUCCESS locally, then confirm the
//!    lock and commit the stock decrement, recording a durable
//!    reconciliation task if either downstream commit fails.
//!
//! There is no two-phase-commit coordinator; consistency comes from
//! compensating actions and reconciliation records.

pub mod coordinator;
pub mod error;
pub mod retry;
pub mod services;
pub mod state;

pub use coordinator::{ConfirmOutcome, CreateOrderRequest, OrderSagaCoordinator};
pub use error::SagaError;
pub use retry::{RetryPolicy, retry_with_backoff};
pub use services::{
    CatalogService, HttpCatalogClient, HttpReservationClient, InMemoryCatalogService,
    InMemoryReservationService, PriceQuote, ReservationPathOrder, ReservationService,
};
pub use state::{ConfirmPhase, PurchasePhase};
