//! Shared types used across the ticket order system.

pub mod types;

pub use types::{EventId, Money, OrderId, UserId};
