//! Normalized import shapes - the narrow contract consumed from the upload
//! and column-mapping subsystems. The core only sees numeric totals and row
//! references; parsing never happens here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The five payroll data sources a pay run reconciles across.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    Register,
    Bank,
    GlJournal,
    Statutory,
    PensionSchedule,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Register => "REGISTER",
            SourceType::Bank => "BANK",
            SourceType::GlJournal => "GL_JOURNAL",
            SourceType::Statutory => "STATUTORY",
            SourceType::PensionSchedule => "PENSION_SCHEDULE",
        }
    }

    /// Statutory and pension sources are optional; their absence downgrades
    /// the comparisons that need them to WARN instead of failing the run.
    pub fn is_required(self) -> bool {
        REQUIRED_SOURCES.contains(&self)
    }
}

/// Sources that must be mapped before a run can execute or be submitted.
pub const REQUIRED_SOURCES: &[SourceType] = &[
    SourceType::Register,
    SourceType::Bank,
    SourceType::GlJournal,
];

/// Typed keys for the per-source total buckets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TotalCategory {
    // Payroll register
    Gross,
    Net,
    Tax,
    Deductions,
    EmployerCosts,
    Pension,
    // Bank payment file
    BankTotal,
    // General-ledger journal
    Debits,
    Credits,
    GrossExpense,
    EmployerCostExpense,
    NetPayLiability,
    TaxLiability,
    PensionLiability,
    // Statutory totals
    StatutoryDue,
    // Pension schedule
    PensionDue,
}

/// One normalized row from an import, in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRow {
    pub row_number: u32,
    pub amount_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl ImportRow {
    pub fn new(row_number: u32, amount_cents: i64) -> Self {
        Self {
            row_number,
            amount_cents,
            payee: None,
            reference: None,
        }
    }
}

/// A parsed, mapped import as delivered by the normalized-import reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedImport {
    pub import_id: Uuid,
    pub source_type: SourceType,
    pub rows: Vec<ImportRow>,
    /// Category totals in cents. Missing categories read as zero.
    pub totals: BTreeMap<TotalCategory, i64>,
}

impl NormalizedImport {
    pub fn new(import_id: Uuid, source_type: SourceType) -> Self {
        Self {
            import_id,
            source_type,
            rows: Vec::new(),
            totals: BTreeMap::new(),
        }
    }

    pub fn total(&self, category: TotalCategory) -> i64 {
        self.totals.get(&category).copied().unwrap_or(0)
    }
}
