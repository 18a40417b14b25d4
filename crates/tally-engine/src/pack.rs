//! Pack lifecycle: deterministic artifact generation, one-way locking, and
//! reopening for regeneration.
//!
//! The artifact upload is the only retried operation in the core, and it
//! happens *before* the pack transaction: an upload failure aborts the whole
//! operation with no Pack row and no status change.

use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use tally_domain::{
    ensure_transition, Action, ActorContext, CheckStatus, DomainError, DomainResult, Pack,
    PayRunStatus,
};
use tally_store::{canonical_json, import_fingerprint, put_with_retry, ArtifactStore};

use crate::service::Tally;

/// Bounded attempts for the artifact upload.
pub const UPLOAD_ATTEMPTS: u32 = 3;
/// Fixed delay between upload attempts.
pub const UPLOAD_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Everything the artifact needs, snapshotted from committed state before
/// the upload.
struct PackPlan {
    version: u32,
    storage_key: String,
    metadata: Value,
    artifact: Value,
}

impl<A: ArtifactStore> Tally<A> {
    /// Generate the next pack version for an APPROVED pay run.
    ///
    /// `pack_version` is monotonic and gapless per pay run. The rendered
    /// artifact is canonical JSON embedding the run id, bundle id/version,
    /// redaction flags, per-import fingerprints, the check/exception summary
    /// and the approval id - deterministic for a given committed state.
    pub fn generate_pack(&self, actor: &ActorContext, pay_run_id: Uuid) -> DomainResult<Pack> {
        self.require(actor, Action::GeneratePack)?;

        let plan = self.store.read(|st| self.plan_pack(st, actor, pay_run_id))?;

        let body = canonical_json(&plan.artifact)
            .map_err(|e| DomainError::internal(format!("pack artifact render failed: {e:#}")))?;
        put_with_retry(
            &self.artifacts,
            &plan.storage_key,
            body.as_bytes(),
            UPLOAD_ATTEMPTS,
            UPLOAD_RETRY_DELAY,
        )
        .map_err(|e| DomainError::internal(format!("pack artifact upload failed: {e:#}")))?;

        let pack = self.store.in_transaction(|st| {
            let pay_run = st.pay_run(actor.firm_id, pay_run_id)?.clone();
            ensure_transition(pay_run.status, PayRunStatus::Packed)?;
            // A racing generation would have claimed this version already.
            if st.max_pack_version(pay_run_id) + 1 != plan.version {
                return Err(DomainError::conflict(format!(
                    "pack version {} was claimed concurrently",
                    plan.version
                )));
            }

            let pack = Pack {
                id: Uuid::new_v4(),
                firm_id: actor.firm_id,
                pay_run_id,
                pack_version: plan.version,
                storage_key: plan.storage_key.clone(),
                metadata: plan.metadata.clone(),
                created_at: Utc::now(),
                locked_at: None,
                locked_by: None,
            };
            st.packs.insert(pack.id, pack.clone());

            let pay_run = st.pay_run_mut(actor.firm_id, pay_run_id)?;
            pay_run.status = PayRunStatus::Packed;
            pay_run.updated_at = Utc::now();
            Ok(pack)
        })?;

        info!(
            pay_run_id = %pay_run_id,
            pack_version = pack.pack_version,
            key = %pack.storage_key,
            "pack generated"
        );
        self.emit(
            actor,
            "pack.generate",
            "pack",
            pack.id,
            json!({ "pay_run_id": pay_run_id, "pack_version": pack.pack_version }),
        );
        Ok(pack)
    }

    /// Lock the pay run's current pack. One-way: locking an already-locked
    /// pack is a validation error; locking with no pack is not-found.
    pub fn lock_pack(&self, actor: &ActorContext, pay_run_id: Uuid) -> DomainResult<Pack> {
        self.require(actor, Action::LockPack)?;
        let pack = self.store.in_transaction(|st| {
            let pay_run = st.pay_run(actor.firm_id, pay_run_id)?.clone();
            let Some(current) = st.current_pack(pay_run_id) else {
                return Err(DomainError::not_found("pack", pay_run_id));
            };
            if current.is_locked() {
                return Err(DomainError::validation("pack is already locked"));
            }
            ensure_transition(pay_run.status, PayRunStatus::Locked)?;

            let now = Utc::now();
            let pack = st
                .current_pack_mut(pay_run_id)
                .ok_or(DomainError::not_found("pack", pay_run_id))?;
            pack.locked_at = Some(now);
            pack.locked_by = Some(actor.user_id);
            let pack = pack.clone();

            let pay_run = st.pay_run_mut(actor.firm_id, pay_run_id)?;
            pay_run.status = PayRunStatus::Locked;
            pay_run.updated_at = now;
            Ok(pack)
        })?;
        info!(pay_run_id = %pay_run_id, pack_version = pack.pack_version, "pack locked");
        self.emit(
            actor,
            "pack.lock",
            "pack",
            pack.id,
            json!({ "pay_run_id": pay_run_id, "pack_version": pack.pack_version }),
        );
        Ok(pack)
    }

    /// Reopen a PACKED pay run so a corrected pack can be generated as the
    /// next version. Only possible while the current pack is unlocked.
    pub fn reopen_for_regeneration(
        &self,
        actor: &ActorContext,
        pay_run_id: Uuid,
    ) -> DomainResult<tally_domain::PayRun> {
        self.require(actor, Action::GeneratePack)?;
        let pay_run = self.store.in_transaction(|st| {
            let current = st.pay_run(actor.firm_id, pay_run_id)?.clone();
            ensure_transition(current.status, PayRunStatus::Approved)?;
            if let Some(pack) = st.current_pack(pay_run_id) {
                if pack.is_locked() {
                    return Err(DomainError::validation(
                        "a locked pack cannot be reopened for regeneration",
                    ));
                }
            }
            let pay_run = st.pay_run_mut(actor.firm_id, pay_run_id)?;
            pay_run.status = PayRunStatus::Approved;
            pay_run.updated_at = Utc::now();
            Ok(pay_run.clone())
        })?;
        self.emit(
            actor,
            "pack.reopen",
            "pay_run",
            pay_run_id,
            json!({ "status": pay_run.status.as_str() }),
        );
        Ok(pay_run)
    }

    /// Build the artifact plan from committed state. Read-only.
    fn plan_pack(
        &self,
        st: &tally_store::StoreState,
        actor: &ActorContext,
        pay_run_id: Uuid,
    ) -> DomainResult<PackPlan> {
        let pay_run = st.pay_run(actor.firm_id, pay_run_id)?;
        if pay_run.status != PayRunStatus::Approved {
            return Err(DomainError::validation(format!(
                "pack generation requires APPROVED status, found {}",
                pay_run.status.as_str()
            )));
        }
        let Some(run) = st.current_run(pay_run_id) else {
            return Err(DomainError::validation(
                "no current reconciliation run to pack",
            ));
        };

        let mut fingerprints = serde_json::Map::new();
        for (source, import_id) in &pay_run.mapped_imports {
            if let Some(import) = st.imports.get(import_id) {
                let digest = import_fingerprint(import).map_err(|e| {
                    DomainError::internal(format!("import fingerprint failed: {e:#}"))
                })?;
                fingerprints.insert(source.as_str().to_string(), json!(digest));
            }
        }

        let results = st.results_for_run(run.id);
        let count = |status: CheckStatus| results.iter().filter(|r| r.status == status).count();
        let check_summary = json!({
            "pass": count(CheckStatus::Pass),
            "warn": count(CheckStatus::Warn),
            "fail": count(CheckStatus::Fail),
        });
        let open_exceptions = st.open_exceptions(pay_run_id).len();
        let approval_id = st.latest_approval(pay_run_id).map(|a| a.id);

        let version = st.max_pack_version(pay_run_id) + 1;
        let storage_key = format!("packs/{pay_run_id}/v{version}.json");

        // Payee and reference text never leaves the core; the artifact only
        // carries totals, deltas and row numbers.
        let metadata = json!({
            "runId": run.id,
            "runNumber": run.run_number,
            "bundleId": run.bundle_id,
            "bundleVersion": run.bundle_version,
            "redactionFlags": { "payeeNames": true, "referenceText": true },
            "importFingerprints": Value::Object(fingerprints),
            "checkSummary": check_summary,
            "exceptionCount": open_exceptions,
            "approvalId": approval_id,
        });

        let checks: Vec<Value> = results
            .iter()
            .map(|r| {
                json!({
                    "checkType": r.check_type.as_str(),
                    "checkVersion": r.check_version,
                    "status": r.status,
                    "severity": r.severity,
                    "summary": r.summary,
                    "details": r.details,
                    "evidence": r.evidence,
                })
            })
            .collect();

        let artifact = json!({
            "payRunId": pay_run_id,
            "period": pay_run.period,
            "packVersion": version,
            "metadata": metadata,
            "checks": checks,
        });

        Ok(PackPlan {
            version,
            storage_key,
            metadata,
            artifact,
        })
    }
}
