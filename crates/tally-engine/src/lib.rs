//! Reconciliation core services.
//!
//! [`Tally`] is the single entry point: every operation takes an
//! [`tally_domain::ActorContext`], enforces role capability and firm scope,
//! runs its writes inside one store transaction, and emits an audit event
//! only after the transaction has committed. The pure check engine lives in
//! `tally-checks`; this crate owns sequencing, state transitions and the
//! persistence/artifact/audit edges.

pub mod exceptions;
pub mod pack;
pub mod review;
pub mod run;
pub mod service;
pub mod variances;

pub use pack::{UPLOAD_ATTEMPTS, UPLOAD_RETRY_DELAY};
pub use service::Tally;
