use common::OrderId;
use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The order was not found.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The store cannot be reached.
    #[error("Order store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
