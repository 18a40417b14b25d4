//! Pay-run workflow states and the single shared transition validator.
//!
//! Every mutator in the engine calls [`ensure_transition`] instead of
//! re-checking legality ad hoc, so an illegal move fails in exactly one place.

use serde::{Deserialize, Serialize};

/// All persisted workflow states of a pay run.
///
/// `EXCEPTIONS_OPEN` is deliberately *not* here - it is display-derived from
/// `Reconciled` plus the open-exception count (see [`display_status`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayRunStatus {
    Draft,
    Imported,
    Mapped,
    Reconciling,
    Reconciled,
    ReadyForReview,
    Approved,
    Packed,
    Locked,
    Archived,
}

impl PayRunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PayRunStatus::Draft => "DRAFT",
            PayRunStatus::Imported => "IMPORTED",
            PayRunStatus::Mapped => "MAPPED",
            PayRunStatus::Reconciling => "RECONCILING",
            PayRunStatus::Reconciled => "RECONCILED",
            PayRunStatus::ReadyForReview => "READY_FOR_REVIEW",
            PayRunStatus::Approved => "APPROVED",
            PayRunStatus::Packed => "PACKED",
            PayRunStatus::Locked => "LOCKED",
            PayRunStatus::Archived => "ARCHIVED",
        }
    }

    /// No further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, PayRunStatus::Locked | PayRunStatus::Archived)
    }
}

/// The legal transition table.
///
/// ```text
/// Draft → Imported → Mapped → Reconciling → Reconciled → ReadyForReview
///        → Approved → Packed → Locked
/// ReadyForReview → Reconciled     (reject)
/// Reconciled → Reconciling        (re-run)
/// Packed → Approved               (reopen for pack regeneration)
/// any non-terminal → Archived
/// ```
pub fn can_transition(from: PayRunStatus, to: PayRunStatus) -> bool {
    use PayRunStatus::*;
    matches!(
        (from, to),
        (Draft, Imported)
            | (Imported, Mapped)
            | (Mapped, Reconciling)
            | (Reconciling, Reconciled)
            | (Reconciled, Reconciling)
            | (Reconciled, ReadyForReview)
            | (ReadyForReview, Reconciled)
            | (ReadyForReview, Approved)
            | (Approved, Packed)
            | (Packed, Approved)
            | (Packed, Locked)
    ) || (to == Archived && !from.is_terminal())
}

/// Returned when a workflow move is not in the transition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: PayRunStatus,
    pub to: PayRunStatus,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "illegal pay-run transition: {} -> {}",
            self.from.as_str(),
            self.to.as_str()
        )
    }
}

impl std::error::Error for TransitionError {}

/// The one transition gate shared by every mutator.
pub fn ensure_transition(from: PayRunStatus, to: PayRunStatus) -> Result<(), TransitionError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

/// What a listing surface shows for a pay run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayStatus {
    Status(PayRunStatus),
    /// Reconciled with at least one open exception.
    ExceptionsOpen,
}

/// Derive the display state. Never persisted.
pub fn display_status(status: PayRunStatus, open_exceptions: usize) -> DisplayStatus {
    if status == PayRunStatus::Reconciled && open_exceptions > 0 {
        DisplayStatus::ExceptionsOpen
    } else {
        DisplayStatus::Status(status)
    }
}
