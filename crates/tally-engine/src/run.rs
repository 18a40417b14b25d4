//! Reconciliation run orchestrator. Executes the regional check bundle over
//! the pay run's mapped imports and persists the outcome atomically.

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use tally_checks::{
    apply_expected_variances, bundle_for_region, evaluate_check, resolve_tolerances, CheckInputs,
};
use tally_domain::{
    ensure_transition, Action, ActorContext, CheckResult, CheckStatus, DomainResult, Exception,
    ExceptionStatus, NormalizedImport, PayRunStatus, ReconciliationRun, SourceType,
};
use tally_store::ArtifactStore;

use crate::service::{ensure_required_sources, Tally};

impl<A: ArtifactStore> Tally<A> {
    /// Execute the full check bundle for a pay run.
    ///
    /// Preconditions (checked before anything is persisted): legal transition
    /// into RECONCILING, every required source mapped with its import
    /// present. On success, one transaction holds: supersession of the prior
    /// run and its exceptions, the new run + its results + its exceptions,
    /// and the status advance to RECONCILED.
    ///
    /// Running twice over unchanged inputs yields byte-identical result
    /// `details` and an identical exception set; only ids, timestamps and
    /// `run_number` differ.
    pub fn run_reconciliation(
        &self,
        actor: &ActorContext,
        pay_run_id: Uuid,
    ) -> DomainResult<ReconciliationRun> {
        self.require(actor, Action::RunReconciliation)?;

        let run = self.store.in_transaction(|st| {
            let pay_run = st.pay_run(actor.firm_id, pay_run_id)?.clone();
            ensure_transition(pay_run.status, PayRunStatus::Reconciling)?;
            ensure_required_sources(st, &pay_run)?;

            let client = st.client(actor.firm_id, pay_run.client_id)?.clone();
            let firm = st.firm(actor.firm_id)?.clone();

            let tolerances = resolve_tolerances(
                client.region,
                firm.tolerance_defaults.as_ref(),
                client.tolerance_overrides.as_ref(),
                pay_run.tolerance_overrides.as_ref(),
            );
            let bundle = bundle_for_region(client.region);
            let variances = st.active_variances(actor.firm_id, client.id);

            // Snapshot the mapped imports so evaluation borrows nothing from
            // the working state we are about to mutate.
            let imports: BTreeMap<SourceType, NormalizedImport> = pay_run
                .mapped_imports
                .iter()
                .filter_map(|(s, id)| st.imports.get(id).map(|i| (*s, i.clone())))
                .collect();
            let inputs = CheckInputs {
                register: imports.get(&SourceType::Register),
                bank: imports.get(&SourceType::Bank),
                journal: imports.get(&SourceType::GlJournal),
                statutory: imports.get(&SourceType::Statutory),
                pension: imports.get(&SourceType::PensionSchedule),
            };
            let bank_payments = imports
                .get(&SourceType::Bank)
                .map(|i| i.rows.as_slice())
                .unwrap_or(&[]);

            let evaluations: Vec<_> = bundle
                .checks
                .iter()
                .map(|check| {
                    let eval = evaluate_check(*check, &inputs, &tolerances);
                    apply_expected_variances(eval, &variances, bank_payments)
                })
                .collect();

            let now = Utc::now();
            st.supersede_exceptions(pay_run_id, now);
            st.supersede_runs(pay_run_id, now);

            let worst_status = evaluations
                .iter()
                .fold(CheckStatus::Pass, |worst, e| match (worst, e.status) {
                    (_, CheckStatus::Fail) | (CheckStatus::Fail, _) => CheckStatus::Fail,
                    (_, CheckStatus::Warn) | (CheckStatus::Warn, _) => CheckStatus::Warn,
                    _ => CheckStatus::Pass,
                });

            let run = ReconciliationRun {
                id: Uuid::new_v4(),
                firm_id: actor.firm_id,
                pay_run_id,
                run_number: st.next_run_number(pay_run_id),
                bundle_id: bundle.id.to_string(),
                bundle_version: bundle.version,
                input_summary: pay_run.mapped_imports.clone(),
                worst_status,
                executed_at: now,
                superseded_at: None,
            };

            for (sequence, eval) in evaluations.iter().enumerate() {
                let result = CheckResult::from_evaluation(run.id, sequence as u32, eval);
                st.check_results.insert(result.id, result);

                // One exception per non-passing evaluation that still
                // carries a draft after variance matching.
                if let Some(draft) = &eval.exception {
                    if eval.status != CheckStatus::Pass {
                        let exception = Exception {
                            id: Uuid::new_v4(),
                            firm_id: actor.firm_id,
                            pay_run_id,
                            run_id: run.id,
                            check_type: eval.check_type,
                            category: draft.category,
                            severity: draft.severity,
                            status: ExceptionStatus::Open,
                            title: draft.title.clone(),
                            description: draft.description.clone(),
                            evidence: eval.evidence.clone(),
                            resolution_note: None,
                            assigned_to: None,
                            superseded_at: None,
                            created_at: now,
                            updated_at: now,
                        };
                        st.exceptions.insert(exception.id, exception);
                    }
                }
            }
            st.runs.insert(run.id, run.clone());

            // RECONCILING is transient; single-threaded execution collapses
            // the two hops into one committed write.
            ensure_transition(PayRunStatus::Reconciling, PayRunStatus::Reconciled)?;
            let pay_run = st.pay_run_mut(actor.firm_id, pay_run_id)?;
            pay_run.status = PayRunStatus::Reconciled;
            pay_run.updated_at = now;
            Ok(run)
        })?;

        info!(
            pay_run_id = %pay_run_id,
            run_number = run.run_number,
            bundle = %run.bundle_id,
            worst = ?run.worst_status,
            "reconciliation run complete"
        );
        self.emit(
            actor,
            "reconciliation.run",
            "reconciliation_run",
            run.id,
            json!({
                "pay_run_id": pay_run_id,
                "run_number": run.run_number,
                "bundle_id": run.bundle_id,
                "bundle_version": run.bundle_version,
            }),
        );
        Ok(run)
    }
}
