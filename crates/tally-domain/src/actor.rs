use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role taxonomy is an input to the core (defined by the surrounding product),
/// not redefined per operation. Capability checks all go through [`Role::may`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Preparer,
    Reviewer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Preparer => "PREPARER",
            Role::Reviewer => "REVIEWER",
        }
    }
}

/// Every capability the core gates on a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    RunReconciliation,
    SubmitForReview,
    Approve,
    Reject,
    GeneratePack,
    LockPack,
    ResolveException,
    DismissException,
    OverrideException,
    AssignException,
    ManageVariances,
    ArchivePayRun,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::RunReconciliation => "run_reconciliation",
            Action::SubmitForReview => "submit_for_review",
            Action::Approve => "approve",
            Action::Reject => "reject",
            Action::GeneratePack => "generate_pack",
            Action::LockPack => "lock_pack",
            Action::ResolveException => "resolve_exception",
            Action::DismissException => "dismiss_exception",
            Action::OverrideException => "override_exception",
            Action::AssignException => "assign_exception",
            Action::ManageVariances => "manage_variances",
            Action::ArchivePayRun => "archive_pay_run",
        }
    }
}

impl Role {
    /// Single permission table for the whole core.
    ///
    /// Preparers can execute reconciliations and work exceptions; everything
    /// that advances the sign-off workflow (submit, approve, pack, override,
    /// variance admin) requires Reviewer or Admin.
    pub fn may(self, action: Action) -> bool {
        use Action::*;
        match action {
            RunReconciliation | ResolveException | DismissException | AssignException => true,
            SubmitForReview | Approve | Reject | GeneratePack | LockPack | OverrideException
            | ManageVariances | ArchivePayRun => matches!(self, Role::Reviewer | Role::Admin),
        }
    }
}

/// Who is performing an operation. Firm scoping is enforced by querying with
/// both entity id and `firm_id` - never by a secondary authorization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub user_id: Uuid,
    pub firm_id: Uuid,
    pub role: Role,
}

impl ActorContext {
    pub fn new(user_id: Uuid, firm_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            firm_id,
            role,
        }
    }
}
