//! Expected variances: a declared rule downgrades a failing check, archival
//! stops it applying, and rule shape is validated at creation.

mod common;

use serde_json::json;

use tally_domain::{CheckStatus, CheckType, DomainError, ErrorKind, Severity};

#[test]
fn payee_scoped_variance_downgrades_to_pass() {
    let h = common::harness();
    let variance = h
        .tally
        .create_expected_variance(
            &h.reviewer,
            h.client_id,
            Some(CheckType::RegisterNetToBank),
            json!({ "payeeContains": "hmrc" }),
            json!({ "downgradeTo": "PASS", "requiresReviewerAck": true }),
        )
        .unwrap();

    // The bank file carries an HMRC payment; the total is 3000c off.
    let pay_run = common::mapped_pay_run(&h, common::sources(common::NET + 3_000));
    h.tally.run_reconciliation(&h.preparer, pay_run.id).unwrap();

    h.tally.store().read(|st| {
        let run = st.current_run(pay_run.id).unwrap();
        let result = st
            .results_for_run(run.id)
            .into_iter()
            .find(|r| r.check_type == CheckType::RegisterNetToBank)
            .unwrap()
            .clone();
        assert_eq!(result.status, CheckStatus::Pass);
        assert_eq!(result.severity, Severity::Info);
        let stamp = result.details.expected_variance.unwrap();
        assert_eq!(stamp.id, variance.id);
        assert!(stamp.requires_reviewer_ack);
        assert!(st.open_exceptions(pay_run.id).is_empty());
    });

    // Archive the rule; the next run fails again.
    h.tally
        .archive_expected_variance(&h.reviewer, variance.id)
        .unwrap();
    h.tally.run_reconciliation(&h.preparer, pay_run.id).unwrap();
    h.tally.store().read(|st| {
        assert_eq!(st.open_exceptions(pay_run.id).len(), 1);
    });
}

#[test]
fn warn_downgrade_keeps_the_exception() {
    let h = common::harness();
    h.tally
        .create_expected_variance(
            &h.reviewer,
            h.client_id,
            Some(CheckType::RegisterNetToBank),
            json!({ "amountBounds": { "min": 2_500, "max": 3_500 } }),
            json!({ "downgradeTo": "WARN", "requiresNote": true }),
        )
        .unwrap();

    let pay_run = common::mapped_pay_run(&h, common::sources(common::NET + 3_000));
    h.tally.run_reconciliation(&h.preparer, pay_run.id).unwrap();

    h.tally.store().read(|st| {
        let run = st.current_run(pay_run.id).unwrap();
        let result = st
            .results_for_run(run.id)
            .into_iter()
            .find(|r| r.check_type == CheckType::RegisterNetToBank)
            .unwrap()
            .clone();
        assert_eq!(result.status, CheckStatus::Warn);
        // Severity survives a WARN downgrade, and so does the exception.
        assert!(result.severity > Severity::Info);
        assert_eq!(st.open_exceptions(pay_run.id).len(), 1);
    });
}

#[test]
fn creation_validates_shape_and_role() {
    let h = common::harness();

    let no_condition = h
        .tally
        .create_expected_variance(
            &h.reviewer,
            h.client_id,
            None,
            json!({}),
            json!({ "downgradeTo": "PASS" }),
        )
        .unwrap_err();
    assert_eq!(no_condition.kind(), ErrorKind::Validation);

    let bad_effect = h
        .tally
        .create_expected_variance(
            &h.reviewer,
            h.client_id,
            None,
            json!({ "payeeContains": "HMRC" }),
            json!({ "downgradeTo": "FAIL" }),
        )
        .unwrap_err();
    assert_eq!(bad_effect.kind(), ErrorKind::Validation);

    let not_allowed = h
        .tally
        .create_expected_variance(
            &h.preparer,
            h.client_id,
            None,
            json!({ "payeeContains": "HMRC" }),
            json!({ "downgradeTo": "PASS" }),
        )
        .unwrap_err();
    assert!(matches!(not_allowed, DomainError::Permission { .. }));
}
