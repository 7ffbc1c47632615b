//! Order model and status state machine.

use chrono::{DateTime, Utc};
use common::{EventId, Money, OrderId, UserId};
use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──┬──► Success
///           └──► Failed
/// ```
///
/// Both `Success` and `Failed` are terminal; nothing transitions out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order persisted, reservation lock held, payment not yet confirmed.
    #[default]
    Pending,

    /// Payment confirmed (terminal state).
    Success,

    /// Order failed and will never settle (terminal state).
    Failed,
}

impl OrderStatus {
    /// Returns true if payment can be confirmed in this status.
    pub fn can_confirm(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Success | OrderStatus::Failed)
    }

    /// Returns true if the status may move to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Success) | (OrderStatus::Pending, OrderStatus::Failed)
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Success => "SUCCESS",
            OrderStatus::Failed => "FAILED",
        }
    }

    /// Parses a status from its stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "SUCCESS" => Some(OrderStatus::Success),
            "FAILED" => Some(OrderStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted order.
///
/// `total` is always `quantity * unit price as quoted by the catalog at
/// creation time`; it is computed by the saga coordinator and never taken
/// from client input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Store-assigned identifier, immutable after insert.
    pub id: OrderId,
    /// Purchasing user, opaque string.
    pub user_id: UserId,
    /// Catalog item being purchased.
    pub event_id: EventId,
    /// Number of tickets, always positive.
    pub quantity: u32,
    /// Server-computed total amount.
    pub total: Money,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Set when a downstream commit failed after the local SUCCESS flip and
    /// the order awaits out-of-band reconciliation.
    pub needs_reconciliation: bool,
    /// Set by the store on insert.
    pub created_at: DateTime<Utc>,
    /// Refreshed by the store on every update.
    pub updated_at: DateTime<Utc>,
}

/// Input to [`crate::OrderStore::insert`]. The store assigns the id, the
/// `Pending` status and both timestamps.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub event_id: EventId,
    pub quantity: u32,
    pub total: Money,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_only_pending_can_confirm() {
        assert!(OrderStatus::Pending.can_confirm());
        assert!(!OrderStatus::Success.can_confirm());
        assert!(!OrderStatus::Failed.can_confirm());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Success.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_only_moves_forward() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Success));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Failed));
        assert!(!OrderStatus::Success.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Success.can_transition_to(OrderStatus::Failed));
        assert!(!OrderStatus::Failed.can_transition_to(OrderStatus::Success));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [OrderStatus::Pending, OrderStatus::Success, OrderStatus::Failed] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("CANCELLED"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(OrderStatus::Pending.to_string(), "PENDING");
        assert_eq!(OrderStatus::Success.to_string(), "SUCCESS");
        assert_eq!(OrderStatus::Failed.to_string(), "FAILED");
    }
}
