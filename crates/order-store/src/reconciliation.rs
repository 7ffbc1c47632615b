//! Durable records for saga steps that need out-of-band correction.
//!
//! When a compensation or a downstream commit fails, the divergence between
//! local and remote state must survive a process restart. Writing a record
//! here is the last step of every such failure path; console logging alone
//! is never enough.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{EventId, OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Why a reconciliation record exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationKind {
    /// A reservation lock was acquired but the order insert failed and the
    /// compensating release failed too. The lock is stranded until its TTL
    /// or manual intervention.
    OrphanedLock,

    /// The order is SUCCESS locally but the reservation confirm never went
    /// through; the lock may still be held upstream.
    LockConfirmFailed,

    /// The order is SUCCESS locally but the permanent stock decrement never
    /// reached the catalog.
    StockCommitFailed,
}

impl ReconciliationKind {
    /// Returns the kind name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationKind::OrphanedLock => "orphaned_lock",
            ReconciliationKind::LockConfirmFailed => "lock_confirm_failed",
            ReconciliationKind::StockCommitFailed => "stock_commit_failed",
        }
    }
}

impl std::fmt::Display for ReconciliationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One divergence between local and remote state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationRecord {
    /// The affected order, if one was persisted. Orphaned locks have no
    /// order row.
    pub order_id: Option<OrderId>,
    pub event_id: EventId,
    pub user_id: UserId,
    pub kind: ReconciliationKind,
    /// Human-readable failure summary for the operator.
    pub detail: String,
    pub recorded_at: DateTime<Utc>,
}

impl ReconciliationRecord {
    /// Creates a record timestamped now.
    pub fn new(
        order_id: Option<OrderId>,
        event_id: EventId,
        user_id: UserId,
        kind: ReconciliationKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            event_id,
            user_id,
            kind,
            detail: detail.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Durable sink for reconciliation records.
#[async_trait]
pub trait ReconciliationLog: Send + Sync {
    /// Appends a record. Implementations must persist it before returning.
    async fn record(&self, record: ReconciliationRecord) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(ReconciliationKind::OrphanedLock.as_str(), "orphaned_lock");
        assert_eq!(
            ReconciliationKind::LockConfirmFailed.to_string(),
            "lock_confirm_failed"
        );
        assert_eq!(
            ReconciliationKind::StockCommitFailed.to_string(),
            "stock_commit_failed"
        );
    }

    #[test]
    fn test_record_carries_optional_order_id() {
        let record = ReconciliationRecord::new(
            None,
            EventId::new(7),
            UserId::new("u1"),
            ReconciliationKind::OrphanedLock,
            "release failed after insert error",
        );
        assert!(record.order_id.is_none());
        assert_eq!(record.kind, ReconciliationKind::OrphanedLock);
    }
}
