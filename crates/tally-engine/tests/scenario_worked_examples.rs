//! End-to-end checks of the reference comparisons: a near-match inside
//! tolerance passes, a journal mismatch outside it fails with the right
//! category and evidence.

mod common;

use tally_domain::{
    CheckStatus, CheckType, ExceptionCategory, Severity, SourceType, TotalCategory,
};

#[test]
fn net_to_bank_within_tolerance_passes() {
    let h = common::harness();
    // register.net 10000 vs bank.total 10050: delta 50c within the 100c
    // absolute bound.
    let register = common::total(
        common::import(SourceType::Register),
        TotalCategory::Net,
        10_000,
    );
    let bank = common::total(
        common::import(SourceType::Bank),
        TotalCategory::BankTotal,
        10_050,
    );
    let journal = common::import(SourceType::GlJournal);
    let pay_run = common::mapped_pay_run(&h, vec![register, bank, journal]);

    h.tally.run_reconciliation(&h.preparer, pay_run.id).unwrap();

    h.tally.store().read(|st| {
        let run = st.current_run(pay_run.id).unwrap();
        let results = st.results_for_run(run.id);
        let net_to_bank = results
            .iter()
            .find(|r| r.check_type == CheckType::RegisterNetToBank)
            .unwrap();
        assert_eq!(net_to_bank.status, CheckStatus::Pass);
        assert_eq!(net_to_bank.details.delta_value, 50);

        // Statutory and pension sources are unmapped: their comparisons warn
        // without drafting exceptions.
        let warns = results
            .iter()
            .filter(|r| r.status == CheckStatus::Warn)
            .count();
        assert!(warns >= 2, "expected missing-source warns, got {warns}");
        assert!(st.open_exceptions(pay_run.id).is_empty());
    });
}

#[test]
fn journal_expense_mismatch_fails_as_journal_mismatch() {
    let h = common::harness();
    // register.gross 25000 vs journal.gross_expense 24000: delta 1000c,
    // 4% of the larger side, far past the 0.5% / 100c bounds.
    let register = common::row(
        common::total(
            common::import(SourceType::Register),
            TotalCategory::Gross,
            25_000,
        ),
        1,
        25_000,
        Some("A Archer"),
        None,
    );
    let bank = common::import(SourceType::Bank);
    let journal = common::total(
        common::import(SourceType::GlJournal),
        TotalCategory::GrossExpense,
        24_000,
    );
    let pay_run = common::mapped_pay_run(&h, vec![register, bank, journal]);

    h.tally.run_reconciliation(&h.preparer, pay_run.id).unwrap();

    h.tally.store().read(|st| {
        let run = st.current_run(pay_run.id).unwrap();
        let result = st
            .results_for_run(run.id)
            .into_iter()
            .find(|r| r.check_type == CheckType::RegisterGrossToJournalExpense)
            .unwrap()
            .clone();
        assert_eq!(result.status, CheckStatus::Fail);
        assert_eq!(result.details.delta_value, 1_000);
        assert!((result.details.delta_percent - 4.0).abs() < 1e-9);
        // Overage of 3.5 percentage points lands in the HIGH band.
        assert_eq!(result.severity, Severity::High);

        let exception = st
            .open_exceptions(pay_run.id)
            .into_iter()
            .find(|e| e.check_type == CheckType::RegisterGrossToJournalExpense)
            .unwrap()
            .clone();
        assert_eq!(exception.category, ExceptionCategory::JournalMismatch);
        assert_eq!(exception.severity, Severity::High);
        assert!(!exception.evidence.is_empty());
    });
}
