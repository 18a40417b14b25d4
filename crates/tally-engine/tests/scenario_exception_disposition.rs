//! Exception disposition: one-way from OPEN, note requirements, role gates,
//! assignment idempotence, and the LOCKED/ARCHIVED freeze.

mod common;

use uuid::Uuid;

use tally_domain::{
    ActorContext, DomainError, ErrorKind, ExceptionStatus, PayRunStatus, Role,
};

fn open_exception_id(h: &common::Harness, pay_run_id: Uuid) -> Uuid {
    h.tally
        .store()
        .read(|st| st.open_exceptions(pay_run_id)[0].id)
}

#[test]
fn disposition_is_one_way_and_requires_a_note() {
    let h = common::harness();
    let pay_run = common::mapped_pay_run(&h, common::sources(common::NET + 3_000));
    h.tally.run_reconciliation(&h.preparer, pay_run.id).unwrap();
    let exception_id = open_exception_id(&h, pay_run.id);

    let blank = h
        .tally
        .resolve_exception(&h.preparer, exception_id, "  ")
        .unwrap_err();
    assert_eq!(blank.kind(), ErrorKind::Validation);

    let resolved = h
        .tally
        .resolve_exception(&h.preparer, exception_id, "duplicate bank line removed")
        .unwrap();
    assert_eq!(resolved.status, ExceptionStatus::Resolved);
    assert_eq!(
        resolved.resolution_note.as_deref(),
        Some("duplicate bank line removed")
    );

    let again = h
        .tally
        .dismiss_exception(&h.preparer, exception_id, "changed my mind")
        .unwrap_err();
    assert_eq!(again.kind(), ErrorKind::Validation);
    assert!(again.to_string().contains("RESOLVED"), "got {again}");
}

#[test]
fn override_requires_reviewer_or_admin() {
    let h = common::harness();
    let pay_run = common::mapped_pay_run(&h, common::sources(common::NET + 3_000));
    h.tally.run_reconciliation(&h.preparer, pay_run.id).unwrap();
    let exception_id = open_exception_id(&h, pay_run.id);

    let err = h
        .tally
        .override_exception(&h.preparer, exception_id, "accepting as-is")
        .unwrap_err();
    assert!(matches!(err, DomainError::Permission { .. }));

    let overridden = h
        .tally
        .override_exception(&h.reviewer, exception_id, "accepting as-is")
        .unwrap();
    assert_eq!(overridden.status, ExceptionStatus::Overridden);
}

#[test]
fn assignment_is_idempotent_and_status_irrelevant() {
    let h = common::harness();
    let pay_run = common::mapped_pay_run(&h, common::sources(common::NET + 3_000));
    h.tally.run_reconciliation(&h.preparer, pay_run.id).unwrap();
    let exception_id = open_exception_id(&h, pay_run.id);
    let assignee = Uuid::new_v4();

    let assigned = h
        .tally
        .assign_exception(&h.preparer, exception_id, Some(assignee))
        .unwrap();
    assert_eq!(assigned.assigned_to, Some(assignee));

    // Same assignment again is a no-op, not an error.
    let repeat = h
        .tally
        .assign_exception(&h.preparer, exception_id, Some(assignee))
        .unwrap();
    assert_eq!(repeat.updated_at, assigned.updated_at);

    // Assignment still works after disposition.
    h.tally
        .resolve_exception(&h.preparer, exception_id, "fixed upstream")
        .unwrap();
    let unassigned = h
        .tally
        .assign_exception(&h.preparer, exception_id, None)
        .unwrap();
    assert_eq!(unassigned.assigned_to, None);
}

#[test]
fn superseded_exceptions_cannot_be_reassigned() {
    let h = common::harness();
    let pay_run = common::mapped_pay_run(&h, common::sources(common::NET + 3_000));
    h.tally.run_reconciliation(&h.preparer, pay_run.id).unwrap();
    let first = open_exception_id(&h, pay_run.id);

    // The rerun supersedes the first run's exceptions.
    h.tally.run_reconciliation(&h.preparer, pay_run.id).unwrap();

    let err = h
        .tally
        .assign_exception(&h.preparer, first, Some(Uuid::new_v4()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("superseded"), "got {err}");
}

#[test]
fn locked_pay_run_freezes_its_exceptions() {
    let h = common::harness();
    let pay_run = common::mapped_pay_run(&h, common::sources(common::NET + 3_000));
    h.tally.run_reconciliation(&h.preparer, pay_run.id).unwrap();
    let exception_id = open_exception_id(&h, pay_run.id);

    h.tally
        .store()
        .in_transaction(|st| {
            st.pay_runs.get_mut(&pay_run.id).unwrap().status = PayRunStatus::Locked;
            Ok(())
        })
        .unwrap();

    let err = h
        .tally
        .resolve_exception(&h.preparer, exception_id, "too late")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("LOCKED"), "got {err}");

    let assign_err = h
        .tally
        .assign_exception(&h.preparer, exception_id, Some(Uuid::new_v4()))
        .unwrap_err();
    assert_eq!(assign_err.kind(), ErrorKind::Validation);
}

#[test]
fn firm_scope_hides_foreign_exceptions() {
    let h = common::harness();
    let pay_run = common::mapped_pay_run(&h, common::sources(common::NET + 3_000));
    h.tally.run_reconciliation(&h.preparer, pay_run.id).unwrap();
    let exception_id = open_exception_id(&h, pay_run.id);

    let outsider = ActorContext::new(Uuid::new_v4(), Uuid::new_v4(), Role::Admin);
    let err = h
        .tally
        .resolve_exception(&outsider, exception_id, "should not see this")
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}
