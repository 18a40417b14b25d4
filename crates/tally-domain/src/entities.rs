//! Persisted entities. Rows are append-only where history matters: runs and
//! exceptions are superseded with a timestamp, never deleted; variances are
//! soft-archived; packs retain every historical version.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::check::{CheckStatus, CheckType, EvidencePointer, ExceptionCategory, Severity};
use crate::imports::SourceType;
use crate::status::PayRunStatus;

/// Region selects the bundle defaults (tolerances, check order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Region {
    Uk,
    Ie,
}

/// An accounting firm - the tenancy boundary for every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Firm {
    pub id: Uuid,
    pub name: String,
    /// When false (the default), the reviewer who submitted a pay run may not
    /// approve it.
    pub allow_self_approval: bool,
    /// Firm-level tolerance defaults (outermost override layer).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance_defaults: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub firm_id: Uuid,
    pub name: String,
    pub region: Region,
    /// Client-level tolerance overrides (middle layer).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance_overrides: Option<Value>,
}

/// One client/period reconciliation unit - the workflow subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayRun {
    pub id: Uuid,
    pub firm_id: Uuid,
    pub client_id: Uuid,
    /// e.g. "2026-08" - display label for the pay period.
    pub period: String,
    /// Increments when a new period cut is created after lock.
    pub revision: u32,
    pub status: PayRunStatus,
    /// Pay-run tolerance overrides (innermost layer).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance_overrides: Option<Value>,
    /// Latest mapped import per source type.
    pub mapped_imports: BTreeMap<SourceType, Uuid>,
    /// Who submitted for review - drives the self-approval block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PayRun {
    pub fn new(firm_id: Uuid, client_id: Uuid, period: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            firm_id,
            client_id,
            period: period.into(),
            revision: 1,
            status: PayRunStatus::Draft,
            tolerance_overrides: None,
            mapped_imports: BTreeMap::new(),
            submitted_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One execution of the check bundle against a pay run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRun {
    pub id: Uuid,
    pub firm_id: Uuid,
    pub pay_run_id: Uuid,
    /// Monotonically increasing per pay run, starting at 1.
    pub run_number: u32,
    pub bundle_id: String,
    pub bundle_version: u32,
    /// Which import id was used per source type.
    pub input_summary: BTreeMap<SourceType, Uuid>,
    /// Worst check status across the run's results.
    pub worst_status: CheckStatus,
    pub executed_at: DateTime<Utc>,
    /// Stamped when a newer run replaces this one; at most one run per pay
    /// run has this unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExceptionStatus {
    Open,
    Resolved,
    Dismissed,
    Overridden,
}

impl ExceptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExceptionStatus::Open => "OPEN",
            ExceptionStatus::Resolved => "RESOLVED",
            ExceptionStatus::Dismissed => "DISMISSED",
            ExceptionStatus::Overridden => "OVERRIDDEN",
        }
    }
}

/// Persisted consequence of a non-passing evaluation, awaiting disposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exception {
    pub id: Uuid,
    pub firm_id: Uuid,
    pub pay_run_id: Uuid,
    pub run_id: Uuid,
    pub check_type: CheckType,
    pub category: ExceptionCategory,
    pub severity: Severity,
    pub status: ExceptionStatus,
    pub title: String,
    pub description: String,
    pub evidence: Vec<EvidencePointer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Uuid>,
    /// Stamped when a newer run replaces this exception's run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Exception {
    /// Open for disposition: not yet dispositioned and not superseded.
    pub fn is_open(&self) -> bool {
        self.status == ExceptionStatus::Open && self.superseded_at.is_none()
    }
}

/// Pre-declared rule that downgrades an otherwise-failing check.
///
/// `condition` and `effect` are stored as JSON so the lenient matching rules
/// (malformed condition matches unconditionally; malformed effect skips the
/// rule) survive round-trips from the admin surface unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedVariance {
    pub id: Uuid,
    pub firm_id: Uuid,
    pub client_id: Uuid,
    /// None applies the rule to every check type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_type: Option<CheckType>,
    pub condition: Value,
    pub effect: Value,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

impl ExpectedVariance {
    pub fn is_active(&self) -> bool {
        self.active && self.archived_at.is_none()
    }
}

/// A versioned, lockable generated artifact summarizing a reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pack {
    pub id: Uuid,
    pub firm_id: Uuid,
    pub pay_run_id: Uuid,
    /// Monotonic, gapless per pay run, starting at 1.
    pub pack_version: u32,
    pub storage_key: String,
    /// Embedded run id, bundle id/version, redaction flags, import
    /// fingerprints, check/exception summary, approval id.
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<Uuid>,
}

impl Pack {
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Approved,
    Rejected,
}

/// Latest-wins approval record per pay run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub id: Uuid,
    pub firm_id: Uuid,
    pub pay_run_id: Uuid,
    pub status: ApprovalStatus,
    pub reviewer: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}
