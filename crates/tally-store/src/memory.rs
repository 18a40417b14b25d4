//! Unit-of-work in-memory store.
//!
//! The state machine transitions in the engine touch several tables at once
//! (pack insert + pay-run status flip, exception supersession + new inserts).
//! [`MemoryStore::in_transaction`] gives those writes all-or-nothing
//! semantics: the closure mutates a working copy of the state, which replaces
//! the committed state only on `Ok`. An `Err` discards the copy, leaving
//! previously committed state untouched.
//!
//! Tables are `BTreeMap`s keyed by id, so every scan iterates in a stable
//! order - "current" queries stay deterministic across identical states.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tally_domain::{
    Approval, CheckResult, Client, DomainError, DomainResult, Exception, ExpectedVariance, Firm,
    NormalizedImport, Pack, PayRun, ReconciliationRun,
};
use uuid::Uuid;

/// All persisted tables. Rows are append-only where history matters: runs,
/// exceptions and packs are superseded or locked, never removed.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub firms: BTreeMap<Uuid, Firm>,
    pub clients: BTreeMap<Uuid, Client>,
    pub pay_runs: BTreeMap<Uuid, PayRun>,
    pub imports: BTreeMap<Uuid, NormalizedImport>,
    pub runs: BTreeMap<Uuid, ReconciliationRun>,
    pub check_results: BTreeMap<Uuid, CheckResult>,
    pub exceptions: BTreeMap<Uuid, Exception>,
    pub variances: BTreeMap<Uuid, ExpectedVariance>,
    pub packs: BTreeMap<Uuid, Pack>,
    pub approvals: BTreeMap<Uuid, Approval>,
}

impl StoreState {
    // -- firm-scoped lookups ------------------------------------------------
    //
    // Scoping is enforced here, by querying with both id and firm id - there
    // is no secondary authorization pass anywhere above.

    pub fn firm(&self, firm_id: Uuid) -> DomainResult<&Firm> {
        self.firms
            .get(&firm_id)
            .ok_or(DomainError::not_found("firm", firm_id))
    }

    pub fn client(&self, firm_id: Uuid, id: Uuid) -> DomainResult<&Client> {
        self.clients
            .get(&id)
            .filter(|c| c.firm_id == firm_id)
            .ok_or(DomainError::not_found("client", id))
    }

    pub fn pay_run(&self, firm_id: Uuid, id: Uuid) -> DomainResult<&PayRun> {
        self.pay_runs
            .get(&id)
            .filter(|p| p.firm_id == firm_id)
            .ok_or(DomainError::not_found("pay_run", id))
    }

    pub fn pay_run_mut(&mut self, firm_id: Uuid, id: Uuid) -> DomainResult<&mut PayRun> {
        self.pay_runs
            .get_mut(&id)
            .filter(|p| p.firm_id == firm_id)
            .ok_or(DomainError::not_found("pay_run", id))
    }

    pub fn exception(&self, firm_id: Uuid, id: Uuid) -> DomainResult<&Exception> {
        self.exceptions
            .get(&id)
            .filter(|e| e.firm_id == firm_id)
            .ok_or(DomainError::not_found("exception", id))
    }

    pub fn exception_mut(&mut self, firm_id: Uuid, id: Uuid) -> DomainResult<&mut Exception> {
        self.exceptions
            .get_mut(&id)
            .filter(|e| e.firm_id == firm_id)
            .ok_or(DomainError::not_found("exception", id))
    }

    pub fn variance_mut(
        &mut self,
        firm_id: Uuid,
        id: Uuid,
    ) -> DomainResult<&mut ExpectedVariance> {
        self.variances
            .get_mut(&id)
            .filter(|v| v.firm_id == firm_id)
            .ok_or(DomainError::not_found("expected_variance", id))
    }

    // -- current pointers ---------------------------------------------------

    /// The one non-superseded run for a pay run, if any.
    pub fn current_run(&self, pay_run_id: Uuid) -> Option<&ReconciliationRun> {
        self.runs
            .values()
            .find(|r| r.pay_run_id == pay_run_id && r.superseded_at.is_none())
    }

    pub fn next_run_number(&self, pay_run_id: Uuid) -> u32 {
        self.runs
            .values()
            .filter(|r| r.pay_run_id == pay_run_id)
            .map(|r| r.run_number)
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Open (not dispositioned, not superseded) exceptions for a pay run.
    pub fn open_exceptions(&self, pay_run_id: Uuid) -> Vec<&Exception> {
        self.exceptions
            .values()
            .filter(|e| e.pay_run_id == pay_run_id && e.is_open())
            .collect()
    }

    /// Stamp every non-superseded exception of the pay run. Called before a
    /// new run's exceptions are inserted so "open" queries only ever see the
    /// latest run - history is preserved for audit export.
    pub fn supersede_exceptions(&mut self, pay_run_id: Uuid, at: DateTime<Utc>) {
        for e in self.exceptions.values_mut() {
            if e.pay_run_id == pay_run_id && e.superseded_at.is_none() {
                e.superseded_at = Some(at);
                e.updated_at = at;
            }
        }
    }

    /// Stamp every non-superseded run of the pay run.
    pub fn supersede_runs(&mut self, pay_run_id: Uuid, at: DateTime<Utc>) {
        for r in self.runs.values_mut() {
            if r.pay_run_id == pay_run_id && r.superseded_at.is_none() {
                r.superseded_at = Some(at);
            }
        }
    }

    /// Check results of one run, in bundle execution order.
    pub fn results_for_run(&self, run_id: Uuid) -> Vec<&CheckResult> {
        let mut results: Vec<_> = self
            .check_results
            .values()
            .filter(|r| r.run_id == run_id)
            .collect();
        results.sort_by_key(|r| r.sequence);
        results
    }

    /// Active variances for a client, in creation order (the matcher is
    /// first-match, so list order is part of the contract).
    pub fn active_variances(&self, firm_id: Uuid, client_id: Uuid) -> Vec<ExpectedVariance> {
        let mut out: Vec<_> = self
            .variances
            .values()
            .filter(|v| v.firm_id == firm_id && v.client_id == client_id && v.is_active())
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        out
    }

    pub fn max_pack_version(&self, pay_run_id: Uuid) -> u32 {
        self.packs
            .values()
            .filter(|p| p.pay_run_id == pay_run_id)
            .map(|p| p.pack_version)
            .max()
            .unwrap_or(0)
    }

    /// The highest-version pack for a pay run.
    pub fn current_pack(&self, pay_run_id: Uuid) -> Option<&Pack> {
        self.packs
            .values()
            .filter(|p| p.pay_run_id == pay_run_id)
            .max_by_key(|p| p.pack_version)
    }

    pub fn current_pack_mut(&mut self, pay_run_id: Uuid) -> Option<&mut Pack> {
        self.packs
            .values_mut()
            .filter(|p| p.pay_run_id == pay_run_id)
            .max_by_key(|p| p.pack_version)
    }

    /// Latest approval record (latest-wins by creation time, id tiebreak).
    pub fn latest_approval(&self, pay_run_id: Uuid) -> Option<&Approval> {
        self.approvals
            .values()
            .filter(|a| a.pay_run_id == pay_run_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
    }
}

/// Shared store handle. Single-threaded-per-request is the execution model;
/// the mutex exists so tests and a future transport can share one instance.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against a working copy of the state; commit on `Ok`, discard
    /// on `Err`. This is the only write path - partial application of a
    /// multi-entity mutation is impossible by construction.
    pub fn in_transaction<T>(
        &self,
        f: impl FnOnce(&mut StoreState) -> DomainResult<T>,
    ) -> DomainResult<T> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut working = guard.clone();
        let out = f(&mut working)?;
        *guard = working;
        Ok(out)
    }

    /// Read-only access to committed state.
    pub fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }
}
