//! Review gate: submission for review, approval and rejection.

use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use tally_domain::{
    ensure_transition, Action, ActorContext, Approval, ApprovalStatus, DomainError, DomainResult,
    PayRun, PayRunStatus, Severity,
};
use tally_store::ArtifactStore;

use crate::service::{ensure_required_sources, Tally};

impl<A: ArtifactStore> Tally<A> {
    /// Submit a RECONCILED pay run for review.
    ///
    /// Gate conditions, all validation errors: legal transition (RECONCILED
    /// only), every required source mapped, zero open CRITICAL exceptions.
    /// Records the submitter for the self-approval block.
    pub fn submit_for_review(&self, actor: &ActorContext, pay_run_id: Uuid) -> DomainResult<PayRun> {
        self.require(actor, Action::SubmitForReview)?;
        let pay_run = self.store.in_transaction(|st| {
            let current = st.pay_run(actor.firm_id, pay_run_id)?.clone();
            ensure_transition(current.status, PayRunStatus::ReadyForReview)?;
            ensure_required_sources(st, &current)?;

            let open_critical = st
                .open_exceptions(pay_run_id)
                .iter()
                .filter(|e| e.severity == Severity::Critical)
                .count();
            if open_critical > 0 {
                return Err(DomainError::validation(format!(
                    "{open_critical} open CRITICAL exception(s) block submission"
                )));
            }

            let pay_run = st.pay_run_mut(actor.firm_id, pay_run_id)?;
            pay_run.status = PayRunStatus::ReadyForReview;
            pay_run.submitted_by = Some(actor.user_id);
            pay_run.updated_at = Utc::now();
            Ok(pay_run.clone())
        })?;
        info!(pay_run_id = %pay_run_id, "pay run submitted for review");
        self.emit(
            actor,
            "pay_run.submit",
            "pay_run",
            pay_run_id,
            json!({ "submitted_by": actor.user_id }),
        );
        Ok(pay_run)
    }

    /// Approve a pay run in READY_FOR_REVIEW. The submitter may not approve
    /// their own submission unless the firm allows self-approval.
    pub fn approve_pay_run(
        &self,
        actor: &ActorContext,
        pay_run_id: Uuid,
        comment: Option<&str>,
    ) -> DomainResult<PayRun> {
        self.require(actor, Action::Approve)?;
        let pay_run = self.store.in_transaction(|st| {
            let current = st.pay_run(actor.firm_id, pay_run_id)?.clone();
            ensure_transition(current.status, PayRunStatus::Approved)?;

            let firm = st.firm(actor.firm_id)?;
            if current.submitted_by == Some(actor.user_id) && !firm.allow_self_approval {
                return Err(DomainError::validation(
                    "self-approval is not permitted for this firm",
                ));
            }

            let approval = Approval {
                id: Uuid::new_v4(),
                firm_id: actor.firm_id,
                pay_run_id,
                status: ApprovalStatus::Approved,
                reviewer: actor.user_id,
                comment: comment.map(str::to_string),
                created_at: Utc::now(),
            };
            st.approvals.insert(approval.id, approval);

            let pay_run = st.pay_run_mut(actor.firm_id, pay_run_id)?;
            pay_run.status = PayRunStatus::Approved;
            pay_run.updated_at = Utc::now();
            Ok(pay_run.clone())
        })?;
        info!(pay_run_id = %pay_run_id, "pay run approved");
        self.emit(
            actor,
            "pay_run.approve",
            "pay_run",
            pay_run_id,
            json!({ "reviewer": actor.user_id }),
        );
        Ok(pay_run)
    }

    /// Reject a pay run in READY_FOR_REVIEW back to RECONCILED. A non-blank
    /// comment is mandatory.
    pub fn reject_pay_run(
        &self,
        actor: &ActorContext,
        pay_run_id: Uuid,
        comment: &str,
    ) -> DomainResult<PayRun> {
        self.require(actor, Action::Reject)?;
        if comment.trim().is_empty() {
            return Err(DomainError::validation("a rejection comment is required"));
        }
        let pay_run = self.store.in_transaction(|st| {
            let current = st.pay_run(actor.firm_id, pay_run_id)?.clone();
            if current.status != PayRunStatus::ReadyForReview {
                return Err(DomainError::validation(format!(
                    "rejection requires READY_FOR_REVIEW status, found {}",
                    current.status.as_str()
                )));
            }
            ensure_transition(current.status, PayRunStatus::Reconciled)?;

            let approval = Approval {
                id: Uuid::new_v4(),
                firm_id: actor.firm_id,
                pay_run_id,
                status: ApprovalStatus::Rejected,
                reviewer: actor.user_id,
                comment: Some(comment.to_string()),
                created_at: Utc::now(),
            };
            st.approvals.insert(approval.id, approval);

            let pay_run = st.pay_run_mut(actor.firm_id, pay_run_id)?;
            pay_run.status = PayRunStatus::Reconciled;
            pay_run.updated_at = Utc::now();
            Ok(pay_run.clone())
        })?;
        info!(pay_run_id = %pay_run_id, "pay run rejected");
        self.emit(
            actor,
            "pay_run.reject",
            "pay_run",
            pay_run_id,
            json!({ "reviewer": actor.user_id, "comment": comment }),
        );
        Ok(pay_run)
    }
}
