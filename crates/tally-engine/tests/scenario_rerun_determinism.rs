//! Re-running reconciliation over unchanged inputs must produce
//! byte-identical result details and an identical exception set, while
//! superseding the prior run and its exceptions.

mod common;

use tally_store::canonical_json;

#[test]
fn rerun_is_deterministic_and_supersedes_prior_run() {
    let h = common::harness();
    // Bank total off by 3000 cents: one failing net-to-bank check.
    let pay_run = common::mapped_pay_run(&h, common::sources(common::NET + 3_000));

    let run1 = h.tally.run_reconciliation(&h.preparer, pay_run.id).unwrap();
    let run2 = h.tally.run_reconciliation(&h.preparer, pay_run.id).unwrap();

    assert_eq!(run1.run_number, 1);
    assert_eq!(run2.run_number, 2);
    assert_eq!(run1.bundle_id, run2.bundle_id);

    h.tally.store().read(|st| {
        // Prior run is superseded; exactly one current run remains.
        let run1_row = st.runs.get(&run1.id).unwrap();
        assert!(run1_row.superseded_at.is_some());
        assert_eq!(st.current_run(pay_run.id).unwrap().id, run2.id);

        // Result details are byte-identical position by position.
        let results1 = st.results_for_run(run1.id);
        let results2 = st.results_for_run(run2.id);
        assert_eq!(results1.len(), 12);
        assert_eq!(results1.len(), results2.len());
        for (a, b) in results1.iter().zip(&results2) {
            assert_eq!(a.check_type, b.check_type);
            assert_eq!(a.status, b.status);
            assert_eq!(
                canonical_json(&a.details).unwrap(),
                canonical_json(&b.details).unwrap()
            );
        }

        // Exception content is identical; only run 2's are open.
        let run1_exceptions: Vec<_> = st
            .exceptions
            .values()
            .filter(|e| e.run_id == run1.id)
            .collect();
        let open = st.open_exceptions(pay_run.id);
        assert_eq!(run1_exceptions.len(), 1);
        assert_eq!(open.len(), 1);
        assert!(run1_exceptions[0].superseded_at.is_some());
        assert_eq!(open[0].run_id, run2.id);
        assert_eq!(open[0].title, run1_exceptions[0].title);
        assert_eq!(open[0].description, run1_exceptions[0].description);
        assert_eq!(open[0].severity, run1_exceptions[0].severity);
    });
}
