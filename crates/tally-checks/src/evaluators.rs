//! Per-check evaluators. One pure function per catalog entry, all funnelled
//! through a shared two-sided amount comparison so the PASS/FAIL rule,
//! severity banding and evidence capture behave identically everywhere.

use tally_domain::{
    AppliedTolerance, CheckDetails, CheckEvaluation, CheckStatus, CheckType, EvidencePointer,
    ExceptionDraft, NormalizedImport, Severity, SourceType, TotalCategory,
};

use crate::bundle::{severity_for_overage, CHECK_VERSION, EVIDENCE_ROW_CAP};
use crate::tolerance::{ToleranceBand, ToleranceSettings};

/// Normalized imports available to a run, one slot per source type.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckInputs<'a> {
    pub register: Option<&'a NormalizedImport>,
    pub bank: Option<&'a NormalizedImport>,
    pub journal: Option<&'a NormalizedImport>,
    pub statutory: Option<&'a NormalizedImport>,
    pub pension: Option<&'a NormalizedImport>,
}

/// Evaluate one check. Pure: same inputs, same output, bit for bit.
pub fn evaluate_check(
    check: CheckType,
    inputs: &CheckInputs<'_>,
    tol: &ToleranceSettings,
) -> CheckEvaluation {
    use CheckType::*;
    match check {
        RegisterNetToBank => amount_check(
            check,
            side(inputs.register, SourceType::Register, "register.net", TotalCategory::Net),
            side(inputs.bank, SourceType::Bank, "bank.total", TotalCategory::BankTotal),
            tol.net_to_bank,
        ),
        JournalDebitsEqualCredits => amount_check(
            check,
            side(inputs.journal, SourceType::GlJournal, "journal.debits", TotalCategory::Debits),
            side(inputs.journal, SourceType::GlJournal, "journal.credits", TotalCategory::Credits),
            tol.journal_balance,
        ),
        RegisterDeductionsToStatutory => amount_check(
            check,
            side(
                inputs.register,
                SourceType::Register,
                "register.deductions",
                TotalCategory::Deductions,
            ),
            side(
                inputs.statutory,
                SourceType::Statutory,
                "statutory.due",
                TotalCategory::StatutoryDue,
            ),
            tol.statutory,
        ),
        RegisterGrossToJournalExpense => amount_check(
            check,
            side(inputs.register, SourceType::Register, "register.gross", TotalCategory::Gross),
            side(
                inputs.journal,
                SourceType::GlJournal,
                "journal.gross_expense",
                TotalCategory::GrossExpense,
            ),
            tol.journal_expense,
        ),
        RegisterEmployerCostsToJournalExpense => amount_check(
            check,
            side(
                inputs.register,
                SourceType::Register,
                "register.employer_costs",
                TotalCategory::EmployerCosts,
            ),
            side(
                inputs.journal,
                SourceType::GlJournal,
                "journal.employer_cost_expense",
                TotalCategory::EmployerCostExpense,
            ),
            tol.journal_expense,
        ),
        RegisterNetPayToJournalLiability => amount_check(
            check,
            side(inputs.register, SourceType::Register, "register.net", TotalCategory::Net),
            side(
                inputs.journal,
                SourceType::GlJournal,
                "journal.net_pay_liability",
                TotalCategory::NetPayLiability,
            ),
            tol.journal_liability,
        ),
        RegisterTaxToJournalLiability => amount_check(
            check,
            side(inputs.register, SourceType::Register, "register.tax", TotalCategory::Tax),
            side(
                inputs.journal,
                SourceType::GlJournal,
                "journal.tax_liability",
                TotalCategory::TaxLiability,
            ),
            tol.journal_liability,
        ),
        RegisterPensionToJournalLiability => amount_check(
            check,
            side(
                inputs.register,
                SourceType::Register,
                "register.pension",
                TotalCategory::Pension,
            ),
            side(
                inputs.journal,
                SourceType::GlJournal,
                "journal.pension_liability",
                TotalCategory::PensionLiability,
            ),
            tol.journal_liability,
        ),
        RegisterPensionToPensionSchedule => amount_check(
            check,
            side(
                inputs.register,
                SourceType::Register,
                "register.pension",
                TotalCategory::Pension,
            ),
            side(
                inputs.pension,
                SourceType::PensionSchedule,
                "pension_schedule.due",
                TotalCategory::PensionDue,
            ),
            tol.pension,
        ),
        DuplicatePayments => duplicate_payments(inputs.bank),
        NegativePayments => negative_payments(inputs.bank),
        PaymentCountMismatch => payment_count_mismatch(inputs.bank, inputs.register, tol),
    }
}

// ---------------------------------------------------------------------------
// Shared two-sided amount comparison
// ---------------------------------------------------------------------------

struct Side<'a> {
    import: Option<&'a NormalizedImport>,
    source: SourceType,
    label: &'static str,
    category: TotalCategory,
}

fn side<'a>(
    import: Option<&'a NormalizedImport>,
    source: SourceType,
    label: &'static str,
    category: TotalCategory,
) -> Side<'a> {
    Side {
        import,
        source,
        label,
        category,
    }
}

/// `delta_percent` relative to the larger absolute magnitude; 0 when both
/// sides are 0. Never divides by zero.
fn delta_percent(left: i64, right: i64, delta: i64) -> f64 {
    let base = left.abs().max(right.abs());
    if base == 0 {
        0.0
    } else {
        delta as f64 * 100.0 / base as f64
    }
}

fn amount_check(
    check: CheckType,
    left: Side<'_>,
    right: Side<'_>,
    band: ToleranceBand,
) -> CheckEvaluation {
    // A missing source is a data-completeness signal, not a mismatch.
    let (left_imp, right_imp) = match (left.import, right.import) {
        (Some(l), Some(r)) => (l, r),
        (None, _) => return missing_source_warn(check, left.source, left.label, right.label),
        (_, None) => return missing_source_warn(check, right.source, left.label, right.label),
    };

    let lv = left_imp.total(left.category);
    let rv = right_imp.total(right.category);
    let delta = (lv - rv).abs();
    let pct = delta_percent(lv, rv, delta);

    // Either bound satisfied is sufficient (OR, not AND) - keeps
    // large-magnitude near-matches from over-flagging.
    let passes = delta <= band.absolute_cents || pct <= band.percent;

    let details = CheckDetails {
        left_label: left.label.to_string(),
        right_label: right.label.to_string(),
        left_value: lv,
        right_value: rv,
        delta_value: delta,
        delta_percent: pct,
        formula: format!("abs({} - {})", left.label, right.label),
        tolerance_applied: Some(AppliedTolerance {
            absolute_cents: band.absolute_cents,
            percent: band.percent,
        }),
        expected_variance: None,
    };

    if passes {
        return CheckEvaluation {
            check_type: check,
            check_version: CHECK_VERSION,
            status: CheckStatus::Pass,
            severity: Severity::Info,
            summary: format!(
                "{} matches {} within tolerance (delta {}c)",
                left.label, right.label, delta
            ),
            details,
            evidence: Vec::new(),
            exception: None,
        };
    }

    let severity = severity_for_overage(pct, band.percent);
    let summary = format!(
        "{} {}c vs {} {}c: delta {}c ({:.4}%) exceeds tolerance",
        left.label, lv, right.label, rv, delta, pct
    );
    let mut evidence = Vec::new();
    for imp in [left_imp, right_imp] {
        if let Some(ev) = top_rows_evidence(imp) {
            evidence.push(ev);
        }
    }
    CheckEvaluation {
        check_type: check,
        check_version: CHECK_VERSION,
        status: CheckStatus::Fail,
        severity,
        summary: summary.clone(),
        details,
        evidence,
        exception: Some(ExceptionDraft {
            category: check.category(),
            severity,
            title: format!("{} does not reconcile to {}", left.label, right.label),
            description: format!(
                "{summary} (tolerance {}c / {}%)",
                band.absolute_cents, band.percent
            ),
        }),
    }
}

/// Top contributing rows by absolute amount, capped, ties broken by row
/// number, final order ascending by row number (EvidencePointer sorts).
fn top_rows_evidence(import: &NormalizedImport) -> Option<EvidencePointer> {
    if import.rows.is_empty() {
        return None;
    }
    let mut rows: Vec<_> = import.rows.iter().collect();
    rows.sort_by(|a, b| {
        b.amount_cents
            .abs()
            .cmp(&a.amount_cents.abs())
            .then(a.row_number.cmp(&b.row_number))
    });
    let row_numbers: Vec<u32> = rows
        .iter()
        .take(EVIDENCE_ROW_CAP)
        .map(|r| r.row_number)
        .collect();
    Some(EvidencePointer::new(import.import_id, row_numbers, None))
}

fn missing_source_warn(
    check: CheckType,
    missing: SourceType,
    left_label: &str,
    right_label: &str,
) -> CheckEvaluation {
    CheckEvaluation {
        check_type: check,
        check_version: CHECK_VERSION,
        status: CheckStatus::Warn,
        severity: Severity::Low,
        summary: format!(
            "{} source not mapped; {} vs {} comparison skipped",
            missing.as_str(),
            left_label,
            right_label
        ),
        details: CheckDetails {
            left_label: left_label.to_string(),
            right_label: right_label.to_string(),
            left_value: 0,
            right_value: 0,
            delta_value: 0,
            delta_percent: 0.0,
            formula: format!("abs({left_label} - {right_label})"),
            tolerance_applied: None,
            expected_variance: None,
        },
        evidence: Vec::new(),
        exception: None,
    }
}

// ---------------------------------------------------------------------------
// Bank data-quality checks (structural - no tolerance)
// ---------------------------------------------------------------------------

fn duplicate_payments(bank: Option<&NormalizedImport>) -> CheckEvaluation {
    let check = CheckType::DuplicatePayments;
    let Some(bank) = bank else {
        return missing_source_warn(check, SourceType::Bank, "bank.payments", "duplicates");
    };

    // Group on (payee, reference, amount), case-insensitive text.
    let mut groups: std::collections::BTreeMap<(String, String, i64), Vec<u32>> =
        std::collections::BTreeMap::new();
    for row in &bank.rows {
        let key = (
            row.payee.as_deref().unwrap_or("").to_lowercase(),
            row.reference.as_deref().unwrap_or("").to_lowercase(),
            row.amount_cents,
        );
        groups.entry(key).or_default().push(row.row_number);
    }

    let mut duplicate_rows: Vec<u32> = Vec::new();
    let mut group_count: i64 = 0;
    for rows in groups.values() {
        if rows.len() > 1 {
            group_count += 1;
            duplicate_rows.extend_from_slice(rows);
        }
    }

    structural_result(
        check,
        bank,
        "duplicate payment group(s)",
        "group(payee, reference, amount) having count > 1",
        group_count,
        duplicate_rows,
    )
}

fn negative_payments(bank: Option<&NormalizedImport>) -> CheckEvaluation {
    let check = CheckType::NegativePayments;
    let Some(bank) = bank else {
        return missing_source_warn(check, SourceType::Bank, "bank.payments", "negatives");
    };

    let negative_rows: Vec<u32> = bank
        .rows
        .iter()
        .filter(|r| r.amount_cents < 0)
        .map(|r| r.row_number)
        .collect();

    structural_result(
        check,
        bank,
        "negative payment(s)",
        "amount < 0",
        negative_rows.len() as i64,
        negative_rows,
    )
}

fn structural_result(
    check: CheckType,
    bank: &NormalizedImport,
    noun: &str,
    formula: &str,
    match_count: i64,
    matched_rows: Vec<u32>,
) -> CheckEvaluation {
    let details = CheckDetails {
        left_label: "bank.payments".to_string(),
        right_label: noun.to_string(),
        left_value: bank.rows.len() as i64,
        right_value: match_count,
        delta_value: match_count,
        delta_percent: 0.0,
        formula: formula.to_string(),
        tolerance_applied: None,
        expected_variance: None,
    };

    if match_count == 0 {
        return CheckEvaluation {
            check_type: check,
            check_version: CHECK_VERSION,
            status: CheckStatus::Pass,
            severity: Severity::Info,
            summary: format!("no {noun} in bank file"),
            details,
            evidence: Vec::new(),
            exception: None,
        };
    }

    let summary = format!("{match_count} {noun} in bank file");
    let severity = Severity::High;
    CheckEvaluation {
        check_type: check,
        check_version: CHECK_VERSION,
        status: CheckStatus::Fail,
        severity,
        summary: summary.clone(),
        details,
        evidence: vec![EvidencePointer::new(bank.import_id, matched_rows, None)],
        exception: Some(ExceptionDraft {
            category: check.category(),
            severity,
            title: summary.clone(),
            description: format!("{summary} ({formula})"),
        }),
    }
}

fn payment_count_mismatch(
    bank: Option<&NormalizedImport>,
    register: Option<&NormalizedImport>,
    tol: &ToleranceSettings,
) -> CheckEvaluation {
    let check = CheckType::PaymentCountMismatch;
    let Some(bank) = bank else {
        return missing_source_warn(check, SourceType::Bank, "bank.count", "register.count");
    };
    let Some(register) = register else {
        return missing_source_warn(check, SourceType::Register, "bank.count", "register.count");
    };

    let bc = bank.rows.len() as i64;
    let rc = register.rows.len() as i64;
    let delta = (bc - rc).abs();
    let pct = delta_percent(bc, rc, delta);
    let passes = pct <= tol.payment_count_mismatch_pct;

    let details = CheckDetails {
        left_label: "bank.count".to_string(),
        right_label: "register.count".to_string(),
        left_value: bc,
        right_value: rc,
        delta_value: delta,
        delta_percent: pct,
        formula: "abs(bank.count - register.count)".to_string(),
        tolerance_applied: Some(AppliedTolerance {
            absolute_cents: 0,
            percent: tol.payment_count_mismatch_pct,
        }),
        expected_variance: None,
    };

    if passes {
        return CheckEvaluation {
            check_type: check,
            check_version: CHECK_VERSION,
            status: CheckStatus::Pass,
            severity: Severity::Info,
            summary: format!("bank payment count {bc} matches register count {rc}"),
            details,
            evidence: Vec::new(),
            exception: None,
        };
    }

    let severity = Severity::Medium;
    let summary = format!(
        "bank payment count {bc} vs register count {rc}: {pct:.4}% mismatch"
    );
    CheckEvaluation {
        check_type: check,
        check_version: CHECK_VERSION,
        status: CheckStatus::Fail,
        severity,
        summary: summary.clone(),
        details,
        evidence: Vec::new(),
        exception: Some(ExceptionDraft {
            category: check.category(),
            severity,
            title: "bank payment count does not match register".to_string(),
            description: summary,
        }),
    }
}
