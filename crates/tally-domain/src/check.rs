//! Check catalog and the evaluation shapes produced by the comparison engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// The fixed, versioned check catalog. Not user-authored formulas - each
/// variant maps to one typed evaluator function in `tally-checks`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckType {
    // Totals reconciliation
    RegisterNetToBank,
    JournalDebitsEqualCredits,
    RegisterDeductionsToStatutory,
    RegisterGrossToJournalExpense,
    RegisterEmployerCostsToJournalExpense,
    RegisterNetPayToJournalLiability,
    RegisterTaxToJournalLiability,
    RegisterPensionToJournalLiability,
    RegisterPensionToPensionSchedule,
    // Bank data quality
    DuplicatePayments,
    NegativePayments,
    PaymentCountMismatch,
}

impl CheckType {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckType::RegisterNetToBank => "REGISTER_NET_TO_BANK",
            CheckType::JournalDebitsEqualCredits => "JOURNAL_DEBITS_EQUAL_CREDITS",
            CheckType::RegisterDeductionsToStatutory => "REGISTER_DEDUCTIONS_TO_STATUTORY",
            CheckType::RegisterGrossToJournalExpense => "REGISTER_GROSS_TO_JOURNAL_EXPENSE",
            CheckType::RegisterEmployerCostsToJournalExpense => {
                "REGISTER_EMPLOYER_COSTS_TO_JOURNAL_EXPENSE"
            }
            CheckType::RegisterNetPayToJournalLiability => "REGISTER_NET_PAY_TO_JOURNAL_LIABILITY",
            CheckType::RegisterTaxToJournalLiability => "REGISTER_TAX_TO_JOURNAL_LIABILITY",
            CheckType::RegisterPensionToJournalLiability => {
                "REGISTER_PENSION_TO_JOURNAL_LIABILITY"
            }
            CheckType::RegisterPensionToPensionSchedule => "REGISTER_PENSION_TO_PENSION_SCHEDULE",
            CheckType::DuplicatePayments => "DUPLICATE_PAYMENTS",
            CheckType::NegativePayments => "NEGATIVE_PAYMENTS",
            CheckType::PaymentCountMismatch => "PAYMENT_COUNT_MISMATCH",
        }
    }

    /// Exception category an evaluator of this check files under.
    pub fn category(self) -> ExceptionCategory {
        match self {
            CheckType::RegisterNetToBank | CheckType::PaymentCountMismatch => {
                ExceptionCategory::BankMismatch
            }
            CheckType::JournalDebitsEqualCredits
            | CheckType::RegisterGrossToJournalExpense
            | CheckType::RegisterEmployerCostsToJournalExpense
            | CheckType::RegisterNetPayToJournalLiability
            | CheckType::RegisterTaxToJournalLiability => ExceptionCategory::JournalMismatch,
            CheckType::RegisterDeductionsToStatutory => ExceptionCategory::StatutoryMismatch,
            CheckType::RegisterPensionToJournalLiability
            | CheckType::RegisterPensionToPensionSchedule => ExceptionCategory::PensionMismatch,
            CheckType::DuplicatePayments | CheckType::NegativePayments => {
                ExceptionCategory::DataQuality
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Ordered so `Critical` compares greatest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExceptionCategory {
    BankMismatch,
    JournalMismatch,
    StatutoryMismatch,
    PensionMismatch,
    DataQuality,
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

/// Reference to the import rows supporting a check's delta.
///
/// Row numbers are always sorted ascending and deduplicated - enforced by the
/// constructor so downstream serialization is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidencePointer {
    pub import_id: Uuid,
    pub row_numbers: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl EvidencePointer {
    pub fn new(import_id: Uuid, mut row_numbers: Vec<u32>, note: Option<String>) -> Self {
        row_numbers.sort_unstable();
        row_numbers.dedup();
        Self {
            import_id,
            row_numbers,
            note,
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// The tolerance band a comparison was evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AppliedTolerance {
    pub absolute_cents: i64,
    pub percent: f64,
}

/// Stamped onto details when an expected variance downgraded a FAIL, so the
/// review surface can demand the declared follow-ups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarianceStamp {
    pub id: Uuid,
    pub requires_note: bool,
    pub requires_attachment: bool,
    pub requires_reviewer_ack: bool,
}

/// Numeric detail block of one evaluation. Byte-identical across repeated
/// runs over the same inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckDetails {
    pub left_label: String,
    pub right_label: String,
    pub left_value: i64,
    pub right_value: i64,
    pub delta_value: i64,
    pub delta_percent: f64,
    pub formula: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance_applied: Option<AppliedTolerance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_variance: Option<VarianceStamp>,
}

/// Draft exception carried by a non-passing evaluation until the synthesizer
/// persists it (or a variance downgrade clears it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionDraft {
    pub category: ExceptionCategory,
    pub severity: Severity,
    pub title: String,
    pub description: String,
}

/// Ephemeral output of one check evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckEvaluation {
    pub check_type: CheckType,
    pub check_version: u32,
    pub status: CheckStatus,
    pub severity: Severity,
    pub summary: String,
    pub details: CheckDetails,
    pub evidence: Vec<EvidencePointer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionDraft>,
}

/// Immutable persisted snapshot of an evaluation, scoped to one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub id: Uuid,
    pub run_id: Uuid,
    /// Position of the check in the bundle's fixed execution order.
    pub sequence: u32,
    pub check_type: CheckType,
    pub check_version: u32,
    pub status: CheckStatus,
    pub severity: Severity,
    pub summary: String,
    pub details: CheckDetails,
    pub evidence: Vec<EvidencePointer>,
}

impl CheckResult {
    pub fn from_evaluation(run_id: Uuid, sequence: u32, eval: &CheckEvaluation) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            sequence,
            check_type: eval.check_type,
            check_version: eval.check_version,
            status: eval.status,
            severity: eval.severity,
            summary: eval.summary.clone(),
            details: eval.details.clone(),
            evidence: eval.evidence.clone(),
        }
    }
}
