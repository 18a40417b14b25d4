//! Approve/reject flow, the self-approval block, and the audit trail the
//! workflow leaves behind.

mod common;

use tally_domain::{ApprovalStatus, DisplayStatus, ErrorKind, PayRunStatus};
use tally_store::{verify_hash_chain, ChainVerify};

#[test]
fn approve_records_approval_and_advances_status() {
    let h = common::harness();
    let pay_run = common::mapped_pay_run(&h, common::sources(common::NET));
    h.tally.run_reconciliation(&h.preparer, pay_run.id).unwrap();
    h.tally.submit_for_review(&h.reviewer, pay_run.id).unwrap();

    let approved = h
        .tally
        .approve_pay_run(&h.second_reviewer, pay_run.id, Some("all clear"))
        .unwrap();
    assert_eq!(approved.status, PayRunStatus::Approved);

    h.tally.store().read(|st| {
        let approval = st.latest_approval(pay_run.id).unwrap();
        assert_eq!(approval.status, ApprovalStatus::Approved);
        assert_eq!(approval.reviewer, h.second_reviewer.user_id);
    });

    match verify_hash_chain(&h.audit_path).unwrap() {
        ChainVerify::Valid { lines } => assert!(lines >= 3, "expected audit events, got {lines}"),
        broken => panic!("audit chain broken: {broken:?}"),
    }
}

#[test]
fn submitter_cannot_approve_unless_firm_allows_it() {
    let h = common::harness();
    let pay_run = common::mapped_pay_run(&h, common::sources(common::NET));
    h.tally.run_reconciliation(&h.preparer, pay_run.id).unwrap();
    h.tally.submit_for_review(&h.reviewer, pay_run.id).unwrap();

    let err = h
        .tally
        .approve_pay_run(&h.reviewer, pay_run.id, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("self-approval"), "got {err}");

    h.tally
        .store()
        .in_transaction(|st| {
            st.firms.get_mut(&h.firm_id).unwrap().allow_self_approval = true;
            Ok(())
        })
        .unwrap();
    let approved = h.tally.approve_pay_run(&h.reviewer, pay_run.id, None).unwrap();
    assert_eq!(approved.status, PayRunStatus::Approved);
}

#[test]
fn reject_requires_comment_and_returns_to_reconciled() {
    let h = common::harness();
    let pay_run = common::mapped_pay_run(&h, common::sources(common::NET));
    h.tally.run_reconciliation(&h.preparer, pay_run.id).unwrap();
    h.tally.submit_for_review(&h.reviewer, pay_run.id).unwrap();

    let err = h
        .tally
        .reject_pay_run(&h.second_reviewer, pay_run.id, "   ")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let rejected = h
        .tally
        .reject_pay_run(&h.second_reviewer, pay_run.id, "bank statement missing page 2")
        .unwrap();
    assert_eq!(rejected.status, PayRunStatus::Reconciled);

    h.tally.store().read(|st| {
        let approval = st.latest_approval(pay_run.id).unwrap();
        assert_eq!(approval.status, ApprovalStatus::Rejected);
        assert_eq!(
            approval.comment.as_deref(),
            Some("bank statement missing page 2")
        );
    });

    // The rejected run can be re-reconciled and resubmitted.
    h.tally.run_reconciliation(&h.preparer, pay_run.id).unwrap();
    let resubmitted = h.tally.submit_for_review(&h.reviewer, pay_run.id).unwrap();
    assert_eq!(resubmitted.status, PayRunStatus::ReadyForReview);
}

#[test]
fn display_status_derives_exceptions_open() {
    let h = common::harness();
    let pay_run = common::mapped_pay_run(&h, common::sources(common::NET + 3_000));
    h.tally.run_reconciliation(&h.preparer, pay_run.id).unwrap();

    assert_eq!(
        h.tally
            .pay_run_display_status(&h.preparer, pay_run.id)
            .unwrap(),
        DisplayStatus::ExceptionsOpen
    );

    let exception_id = h
        .tally
        .store()
        .read(|st| st.open_exceptions(pay_run.id)[0].id);
    h.tally
        .resolve_exception(&h.preparer, exception_id, "re-keyed from bank portal")
        .unwrap();

    assert_eq!(
        h.tally
            .pay_run_display_status(&h.preparer, pay_run.id)
            .unwrap(),
        DisplayStatus::Status(PayRunStatus::Reconciled)
    );
}
