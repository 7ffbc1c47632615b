//! Saga error taxonomy.

use common::{EventId, OrderId};
use order_store::{OrderStatus, StoreError};
use thiserror::Error;

/// Errors that can occur during saga execution.
///
/// Every variant carries a stable reason code (see [`SagaError::reason_code`])
/// that the API layer exposes to callers; collaborator error text stays in
/// the variant for logging and never leaks unfiltered into responses.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The request failed validation before any remote call was made.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The catalog has no such event.
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    /// The order does not exist in the ledger.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Stock is exhausted or the user already holds a lock for this event.
    #[error("Reservation conflict: {reason}")]
    Conflict { reason: String },

    /// The catalog service cannot be reached or returned a non-success status.
    #[error("Catalog service unavailable: {0}")]
    CatalogUnavailable(String),

    /// The reservation service cannot be reached or returned a server error.
    #[error("Reservation service unavailable: {0}")]
    ReservationUnavailable(String),

    /// The order is in a status that does not allow the requested operation.
    #[error("Invalid order state: expected {expected}, actual {actual}")]
    InvalidState {
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// Order store error.
    #[error("Order store error: {0}")]
    Store(#[from] StoreError),
}

impl SagaError {
    /// Returns the stable reason code for this error.
    pub fn reason_code(&self) -> &'static str {
        match self {
            SagaError::InvalidInput { .. } => "invalid_input",
            SagaError::EventNotFound(_) => "event_not_found",
            SagaError::OrderNotFound(_) | SagaError::Store(StoreError::NotFound(_)) => {
                "order_not_found"
            }
            SagaError::Conflict { .. } => "conflict",
            SagaError::CatalogUnavailable(_) => "catalog_unavailable",
            SagaError::ReservationUnavailable(_) => "reservation_unavailable",
            SagaError::InvalidState { .. } => "invalid_state",
            SagaError::Store(_) => "store_error",
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_are_stable() {
        assert_eq!(
            SagaError::InvalidInput {
                reason: "quantity must be positive".to_string()
            }
            .reason_code(),
            "invalid_input"
        );
        assert_eq!(
            SagaError::EventNotFound(EventId::new(7)).reason_code(),
            "event_not_found"
        );
        assert_eq!(
            SagaError::Conflict {
                reason: "stock exhausted".to_string()
            }
            .reason_code(),
            "conflict"
        );
        assert_eq!(
            SagaError::Store(StoreError::Unavailable("down".to_string())).reason_code(),
            "store_error"
        );
        assert_eq!(
            SagaError::Store(StoreError::NotFound(OrderId::new())).reason_code(),
            "order_not_found"
        );
    }
}
