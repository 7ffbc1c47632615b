//! Order ledger for the ticket order system.
//!
//! Provides the [`Order`] model with its status state machine, the
//! [`OrderStore`] trait with in-memory and PostgreSQL implementations, and
//! the [`ReconciliationLog`] used to durably record saga steps whose
//! compensation or forward-commit failed.

pub mod error;
pub mod memory;
pub mod order;
pub mod postgres;
pub mod reconciliation;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryOrderStore, InMemoryReconciliationLog};
pub use order::{NewOrder, Order, OrderStatus};
pub use postgres::{PostgresOrderStore, PostgresReconciliationLog};
pub use reconciliation::{ReconciliationKind, ReconciliationLog, ReconciliationRecord};
pub use store::OrderStore;
