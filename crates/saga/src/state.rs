//! Phase machines for the two saga workflows.

use serde::{Deserialize, Serialize};

/// The phase of an in-flight create-order request.
///
/// Phase transitions:
/// ```text
/// Started ──► Priced ──► Reserved ──► Persisted
///    │           │           │
///    └───────────┴───────────┴──► Aborted
/// ```
///
/// An abort before `Reserved` has nothing to compensate; an abort after it
/// must release the reservation lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PurchasePhase {
    /// Request validated, no remote call made yet.
    #[default]
    Started,

    /// Catalog quote obtained, total computed.
    Priced,

    /// Reservation lock held.
    Reserved,

    /// Order row persisted as PENDING (terminal phase).
    Persisted,

    /// A step failed; completed steps were compensated (terminal phase).
    Aborted,
}

impl PurchasePhase {
    /// Returns true if the phase may move to `next`.
    pub fn can_advance_to(&self, next: PurchasePhase) -> bool {
        matches!(
            (self, next),
            (PurchasePhase::Started, PurchasePhase::Priced)
                | (PurchasePhase::Priced, PurchasePhase::Reserved)
                | (PurchasePhase::Reserved, PurchasePhase::Persisted)
                | (PurchasePhase::Started, PurchasePhase::Aborted)
                | (PurchasePhase::Priced, PurchasePhase::Aborted)
                | (PurchasePhase::Reserved, PurchasePhase::Aborted)
        )
    }

    /// Returns true if a failure in this phase leaves a reservation lock to
    /// compensate.
    pub fn holds_reservation(&self) -> bool {
        matches!(self, PurchasePhase::Reserved)
    }

    /// Returns true if this is a terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PurchasePhase::Persisted | PurchasePhase::Aborted)
    }

    /// Returns the phase name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchasePhase::Started => "Started",
            PurchasePhase::Priced => "Priced",
            PurchasePhase::Reserved => "Reserved",
            PurchasePhase::Persisted => "Persisted",
            PurchasePhase::Aborted => "Aborted",
        }
    }
}

impl std::fmt::Display for PurchasePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The phase of an in-flight confirm-payment request.
///
/// Phase transitions:
/// ```text
/// Pending ──► Confirming ──┬──► Settled
///                          └──► ConfirmFailed
/// ```
///
/// `ConfirmFailed` means the order is SUCCESS locally but at least one
/// downstream commit did not complete; the order is flagged for
/// reconciliation and the caller still sees a settled payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConfirmPhase {
    /// Order loaded, still PENDING.
    #[default]
    Pending,

    /// Local SUCCESS flip persisted, downstream commits in flight.
    Confirming,

    /// Lock confirmed and stock committed (terminal phase).
    Settled,

    /// One or more downstream commits failed after the local flip
    /// (terminal phase, reconciliation required).
    ConfirmFailed,
}

impl ConfirmPhase {
    /// Returns true if the phase may move to `next`.
    pub fn can_advance_to(&self, next: ConfirmPhase) -> bool {
        matches!(
            (self, next),
            (ConfirmPhase::Pending, ConfirmPhase::Confirming)
                | (ConfirmPhase::Confirming, ConfirmPhase::Settled)
                | (ConfirmPhase::Confirming, ConfirmPhase::ConfirmFailed)
        )
    }

    /// Returns true if this is a terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConfirmPhase::Settled | ConfirmPhase::ConfirmFailed)
    }

    /// Returns the phase name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmPhase::Pending => "Pending",
            ConfirmPhase::Confirming => "Confirming",
            ConfirmPhase::Settled => "Settled",
            ConfirmPhase::ConfirmFailed => "ConfirmFailed",
        }
    }
}

impl std::fmt::Display for ConfirmPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
