//! The service type and the pay-run lifecycle operations that feed the
//! reconciliation pipeline (creation, import mapping, archival).

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use tally_domain::{
    ensure_transition, Action, ActorContext, DisplayStatus, DomainError, DomainResult,
    NormalizedImport, PayRun, PayRunStatus, REQUIRED_SOURCES,
};
use tally_store::{ArtifactStore, AuditRecord, AuditSink, MemoryStore, StoreState};

/// The reconciliation core. One instance per firm cluster; all operations go
/// through here.
pub struct Tally<A: ArtifactStore> {
    pub(crate) store: MemoryStore,
    pub(crate) artifacts: A,
    pub(crate) audit: Box<dyn AuditSink>,
}

impl<A: ArtifactStore> Tally<A> {
    pub fn new(artifacts: A, audit: Box<dyn AuditSink>) -> Self {
        Self {
            store: MemoryStore::new(),
            artifacts,
            audit,
        }
    }

    /// Direct store access for seeding and assertions.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Role capability gate. Scope is enforced separately, by every lookup
    /// querying with `(firm_id, id)`.
    pub(crate) fn require(&self, actor: &ActorContext, action: Action) -> DomainResult<()> {
        if actor.role.may(action) {
            Ok(())
        } else {
            Err(DomainError::permission(actor.role, action.as_str()))
        }
    }

    /// Emit an audit event. Best-effort: a sink failure is logged and the
    /// committed operation stands.
    pub(crate) fn emit(
        &self,
        actor: &ActorContext,
        action: &str,
        entity_type: &str,
        entity_id: Uuid,
        metadata: Value,
    ) {
        let record = AuditRecord {
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            actor_id: actor.user_id,
            firm_id: actor.firm_id,
            metadata,
            ts_utc: Utc::now(),
        };
        if let Err(e) = self.audit.record(&record) {
            warn!(action, %entity_id, error = %e, "audit sink failure");
        }
    }

    // -- pay-run lifecycle --------------------------------------------------

    /// Create a pay run for a client/period. While a run for the same period
    /// is in flight a second cut is a conflict; once the period is LOCKED a
    /// new cut is allowed and takes the next `revision`.
    pub fn create_pay_run(
        &self,
        actor: &ActorContext,
        client_id: Uuid,
        period: &str,
    ) -> DomainResult<PayRun> {
        if period.trim().is_empty() {
            return Err(DomainError::validation("pay-run period must not be blank"));
        }
        let pay_run = self.store.in_transaction(|st| {
            st.client(actor.firm_id, client_id)?;
            let mut revision = 1;
            for existing in st
                .pay_runs
                .values()
                .filter(|p| p.client_id == client_id && p.period == period)
            {
                if !existing.status.is_terminal() {
                    return Err(DomainError::conflict(format!(
                        "a pay run for period {period} is already in progress"
                    )));
                }
                // Archived cuts were abandoned; only locked ones count.
                if existing.status == PayRunStatus::Locked {
                    revision = revision.max(existing.revision + 1);
                }
            }
            let mut pay_run = PayRun::new(actor.firm_id, client_id, period);
            pay_run.revision = revision;
            st.pay_runs.insert(pay_run.id, pay_run.clone());
            Ok(pay_run)
        })?;
        info!(pay_run_id = %pay_run.id, period, revision = pay_run.revision, "pay run created");
        self.emit(
            actor,
            "pay_run.create",
            "pay_run",
            pay_run.id,
            json!({
                "period": period,
                "client_id": client_id,
                "revision": pay_run.revision,
            }),
        );
        Ok(pay_run)
    }

    /// Register a normalized import and map it onto the pay run's slot for
    /// its source type. Remapping a slot before reconciliation replaces the
    /// previous import id; the import rows themselves are kept.
    ///
    /// Advances DRAFT → IMPORTED on the first import and IMPORTED → MAPPED
    /// once every required source is mapped.
    pub fn attach_import(
        &self,
        actor: &ActorContext,
        pay_run_id: Uuid,
        import: NormalizedImport,
    ) -> DomainResult<PayRun> {
        let source = import.source_type;
        let import_id = import.import_id;
        let pay_run = self.store.in_transaction(|st| {
            let current = st.pay_run(actor.firm_id, pay_run_id)?.clone();
            if !matches!(
                current.status,
                PayRunStatus::Draft | PayRunStatus::Imported | PayRunStatus::Mapped
            ) {
                return Err(DomainError::validation(format!(
                    "imports cannot be mapped while the pay run is {}",
                    current.status.as_str()
                )));
            }

            st.imports.insert(import.import_id, import);
            let pay_run = st.pay_run_mut(actor.firm_id, pay_run_id)?;
            pay_run.mapped_imports.insert(source, import_id);

            if pay_run.status == PayRunStatus::Draft {
                ensure_transition(pay_run.status, PayRunStatus::Imported)?;
                pay_run.status = PayRunStatus::Imported;
            }
            let all_required = REQUIRED_SOURCES
                .iter()
                .all(|s| pay_run.mapped_imports.contains_key(s));
            if pay_run.status == PayRunStatus::Imported && all_required {
                ensure_transition(pay_run.status, PayRunStatus::Mapped)?;
                pay_run.status = PayRunStatus::Mapped;
            }
            pay_run.updated_at = Utc::now();
            Ok(pay_run.clone())
        })?;
        self.emit(
            actor,
            "import.map",
            "pay_run",
            pay_run_id,
            json!({ "source_type": source.as_str(), "import_id": import_id }),
        );
        Ok(pay_run)
    }

    pub fn archive_pay_run(&self, actor: &ActorContext, pay_run_id: Uuid) -> DomainResult<PayRun> {
        self.require(actor, Action::ArchivePayRun)?;
        let pay_run = self.store.in_transaction(|st| {
            let pay_run = st.pay_run_mut(actor.firm_id, pay_run_id)?;
            ensure_transition(pay_run.status, PayRunStatus::Archived)?;
            pay_run.status = PayRunStatus::Archived;
            pay_run.updated_at = Utc::now();
            Ok(pay_run.clone())
        })?;
        self.emit(actor, "pay_run.archive", "pay_run", pay_run_id, json!({}));
        Ok(pay_run)
    }

    /// Listing-surface status: RECONCILED with open exceptions renders as
    /// EXCEPTIONS_OPEN; everything else is the persisted status.
    pub fn pay_run_display_status(
        &self,
        actor: &ActorContext,
        pay_run_id: Uuid,
    ) -> DomainResult<DisplayStatus> {
        self.store.read(|st| {
            let pay_run = st.pay_run(actor.firm_id, pay_run_id)?;
            let open = st.open_exceptions(pay_run_id).len();
            Ok(tally_domain::display_status(pay_run.status, open))
        })
    }
}

/// Missing required sources for a pay run, as display names.
pub(crate) fn missing_required_sources(st: &StoreState, pay_run: &PayRun) -> Vec<&'static str> {
    REQUIRED_SOURCES
        .iter()
        .filter(|s| {
            pay_run
                .mapped_imports
                .get(s)
                .map_or(true, |id| !st.imports.contains_key(id))
        })
        .map(|s| s.as_str())
        .collect()
}

/// Guard shared by submit and reconcile: every required source mapped and
/// its import present.
pub(crate) fn ensure_required_sources(st: &StoreState, pay_run: &PayRun) -> DomainResult<()> {
    let missing = missing_required_sources(st, pay_run);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "required sources not mapped: {}",
            missing.join(", ")
        )))
    }
}
