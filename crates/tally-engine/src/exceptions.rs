//! Exception disposition: resolve, dismiss, override, assign.
//!
//! Resolve/dismiss/override are one-way moves out of OPEN, each requiring a
//! non-blank note. Assignment mutates only `assigned_to` and is idempotent.
//! Every mutation is rejected while the owning pay run is LOCKED or ARCHIVED,
//! and once a newer run has superseded the exception.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use tally_domain::{
    Action, ActorContext, DomainError, DomainResult, Exception, ExceptionStatus, PayRunStatus,
};
use tally_store::ArtifactStore;

use crate::service::Tally;

impl<A: ArtifactStore> Tally<A> {
    pub fn resolve_exception(
        &self,
        actor: &ActorContext,
        exception_id: Uuid,
        note: &str,
    ) -> DomainResult<Exception> {
        self.disposition(
            actor,
            exception_id,
            note,
            ExceptionStatus::Resolved,
            Action::ResolveException,
        )
    }

    pub fn dismiss_exception(
        &self,
        actor: &ActorContext,
        exception_id: Uuid,
        note: &str,
    ) -> DomainResult<Exception> {
        self.disposition(
            actor,
            exception_id,
            note,
            ExceptionStatus::Dismissed,
            Action::DismissException,
        )
    }

    /// Reviewer/Admin only: mark the exception as accepted despite the
    /// underlying mismatch.
    pub fn override_exception(
        &self,
        actor: &ActorContext,
        exception_id: Uuid,
        note: &str,
    ) -> DomainResult<Exception> {
        self.disposition(
            actor,
            exception_id,
            note,
            ExceptionStatus::Overridden,
            Action::OverrideException,
        )
    }

    /// Assign or unassign. Not a status change; allowed in any exception
    /// status as long as the exception is current and the owning pay run is
    /// still mutable.
    pub fn assign_exception(
        &self,
        actor: &ActorContext,
        exception_id: Uuid,
        assignee: Option<Uuid>,
    ) -> DomainResult<Exception> {
        self.require(actor, Action::AssignException)?;
        let exception = self.store.in_transaction(|st| {
            let current = st.exception(actor.firm_id, exception_id)?.clone();
            ensure_pay_run_mutable(st, actor.firm_id, current.pay_run_id)?;
            if current.superseded_at.is_some() {
                return Err(DomainError::validation(
                    "exception has been superseded by a newer run",
                ));
            }

            let exception = st.exception_mut(actor.firm_id, exception_id)?;
            if exception.assigned_to != assignee {
                exception.assigned_to = assignee;
                exception.updated_at = Utc::now();
            }
            Ok(exception.clone())
        })?;
        self.emit(
            actor,
            "exception.assign",
            "exception",
            exception_id,
            json!({ "assigned_to": assignee }),
        );
        Ok(exception)
    }

    fn disposition(
        &self,
        actor: &ActorContext,
        exception_id: Uuid,
        note: &str,
        target: ExceptionStatus,
        action: Action,
    ) -> DomainResult<Exception> {
        self.require(actor, action)?;
        if note.trim().is_empty() {
            return Err(DomainError::validation("a disposition note is required"));
        }
        let exception = self.store.in_transaction(|st| {
            let current = st.exception(actor.firm_id, exception_id)?.clone();
            ensure_pay_run_mutable(st, actor.firm_id, current.pay_run_id)?;
            if current.superseded_at.is_some() {
                return Err(DomainError::validation(
                    "exception has been superseded by a newer run",
                ));
            }
            if current.status != ExceptionStatus::Open {
                return Err(DomainError::validation(format!(
                    "exception is already {}",
                    current.status.as_str()
                )));
            }

            let exception = st.exception_mut(actor.firm_id, exception_id)?;
            exception.status = target;
            exception.resolution_note = Some(note.to_string());
            exception.updated_at = Utc::now();
            Ok(exception.clone())
        })?;
        self.emit(
            actor,
            action.as_str(),
            "exception",
            exception_id,
            json!({ "status": exception.status.as_str(), "note": note }),
        );
        Ok(exception)
    }
}

/// Exceptions of a LOCKED or ARCHIVED pay run are immutable.
fn ensure_pay_run_mutable(
    st: &tally_store::StoreState,
    firm_id: Uuid,
    pay_run_id: Uuid,
) -> DomainResult<()> {
    let pay_run = st.pay_run(firm_id, pay_run_id)?;
    if matches!(
        pay_run.status,
        PayRunStatus::Locked | PayRunStatus::Archived
    ) {
        Err(DomainError::validation(format!(
            "exceptions of a {} pay run cannot be modified",
            pay_run.status.as_str()
        )))
    } else {
        Ok(())
    }
}
