//! Shared domain model for the Tally payroll reconciliation core.
//!
//! Everything in this crate is plain data: closed status enums with one
//! shared transition validator, the check/evaluation/evidence shapes produced
//! by the comparison engine, the persisted entities, and the typed error
//! taxonomy surfaced at the service boundary. No IO lives here.

pub mod actor;
pub mod check;
pub mod entities;
pub mod error;
pub mod imports;
pub mod status;

pub use actor::{Action, ActorContext, Role};
pub use check::{
    AppliedTolerance, CheckDetails, CheckEvaluation, CheckResult, CheckStatus, CheckType,
    EvidencePointer, ExceptionCategory, ExceptionDraft, Severity, VarianceStamp,
};
pub use entities::{
    Approval, ApprovalStatus, Client, Exception, ExceptionStatus, ExpectedVariance, Firm, Pack,
    PayRun, ReconciliationRun, Region,
};
pub use error::{DomainError, DomainResult, ErrorKind};
pub use imports::{ImportRow, NormalizedImport, SourceType, TotalCategory, REQUIRED_SOURCES};
pub use status::{
    can_transition, display_status, ensure_transition, DisplayStatus, PayRunStatus,
    TransitionError,
};
