#![allow(dead_code)]

//! Shared harness for the scenario tests: a seeded firm/client, actors for
//! each role, and import builders for balanced and mismatched source sets.

use std::path::PathBuf;

use tempfile::TempDir;
use uuid::Uuid;

use tally_domain::{
    ActorContext, Client, Firm, ImportRow, NormalizedImport, PayRun, Region, Role, SourceType,
    TotalCategory,
};
use tally_engine::Tally;
use tally_store::{DirArtifactStore, JsonlAuditSink};

pub struct Harness {
    pub tally: Tally<DirArtifactStore>,
    pub firm_id: Uuid,
    pub client_id: Uuid,
    pub preparer: ActorContext,
    pub reviewer: ActorContext,
    pub second_reviewer: ActorContext,
    pub audit_path: PathBuf,
    pub artifact_root: PathBuf,
    _tmp: TempDir,
}

pub fn harness() -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();

    let tmp = TempDir::new().unwrap();
    let artifact_root = tmp.path().join("artifacts");
    let audit_path = tmp.path().join("audit.jsonl");
    let tally = Tally::new(
        DirArtifactStore::new(&artifact_root),
        Box::new(JsonlAuditSink::new(&audit_path).unwrap()),
    );

    let firm_id = Uuid::new_v4();
    let client_id = Uuid::new_v4();
    tally
        .store()
        .in_transaction(|st| {
            st.firms.insert(
                firm_id,
                Firm {
                    id: firm_id,
                    name: "Granite Payroll LLP".into(),
                    allow_self_approval: false,
                    tolerance_defaults: None,
                },
            );
            st.clients.insert(
                client_id,
                Client {
                    id: client_id,
                    firm_id,
                    name: "Harbour Logistics Ltd".into(),
                    region: Region::Uk,
                    tolerance_overrides: None,
                },
            );
            Ok(())
        })
        .unwrap();

    Harness {
        tally,
        firm_id,
        client_id,
        preparer: ActorContext::new(Uuid::new_v4(), firm_id, Role::Preparer),
        reviewer: ActorContext::new(Uuid::new_v4(), firm_id, Role::Reviewer),
        second_reviewer: ActorContext::new(Uuid::new_v4(), firm_id, Role::Reviewer),
        audit_path,
        artifact_root,
        _tmp: tmp,
    }
}

// -- import builders --------------------------------------------------------

/// Register net pay used by the balanced fixtures, in cents.
pub const NET: i64 = 100_000;
pub const GROSS: i64 = 125_000;
pub const TAX: i64 = 15_000;
pub const DEDUCTIONS: i64 = 25_000;
pub const EMPLOYER_COSTS: i64 = 12_000;
pub const PENSION: i64 = 5_000;

pub fn import(source: SourceType) -> NormalizedImport {
    NormalizedImport::new(Uuid::new_v4(), source)
}

pub fn total(mut imp: NormalizedImport, cat: TotalCategory, v: i64) -> NormalizedImport {
    imp.totals.insert(cat, v);
    imp
}

pub fn row(
    mut imp: NormalizedImport,
    row_number: u32,
    amount_cents: i64,
    payee: Option<&str>,
    reference: Option<&str>,
) -> NormalizedImport {
    imp.rows.push(ImportRow {
        row_number,
        amount_cents,
        payee: payee.map(str::to_string),
        reference: reference.map(str::to_string),
    });
    imp
}

pub fn register_import() -> NormalizedImport {
    let imp = import(SourceType::Register);
    let imp = total(imp, TotalCategory::Gross, GROSS);
    let imp = total(imp, TotalCategory::Net, NET);
    let imp = total(imp, TotalCategory::Tax, TAX);
    let imp = total(imp, TotalCategory::Deductions, DEDUCTIONS);
    let imp = total(imp, TotalCategory::EmployerCosts, EMPLOYER_COSTS);
    let imp = total(imp, TotalCategory::Pension, PENSION);
    let imp = row(imp, 1, 40_000, Some("A Archer"), Some("AUG-001"));
    let imp = row(imp, 2, 35_000, Some("B Bell"), Some("AUG-002"));
    row(imp, 3, 25_000, Some("C Cole"), Some("AUG-003"))
}

pub fn bank_import(bank_total: i64) -> NormalizedImport {
    let imp = import(SourceType::Bank);
    let imp = total(imp, TotalCategory::BankTotal, bank_total);
    let imp = row(imp, 1, 40_000, Some("A Archer"), Some("AUG-001"));
    let imp = row(imp, 2, 35_000, Some("B Bell"), Some("AUG-002"));
    row(imp, 3, bank_total - 75_000, Some("HMRC"), Some("PAYE-AUG"))
}

pub fn journal_import() -> NormalizedImport {
    let imp = import(SourceType::GlJournal);
    let imp = total(imp, TotalCategory::Debits, GROSS + EMPLOYER_COSTS);
    let imp = total(imp, TotalCategory::Credits, GROSS + EMPLOYER_COSTS);
    let imp = total(imp, TotalCategory::GrossExpense, GROSS);
    let imp = total(imp, TotalCategory::EmployerCostExpense, EMPLOYER_COSTS);
    let imp = total(imp, TotalCategory::NetPayLiability, NET);
    let imp = total(imp, TotalCategory::TaxLiability, TAX);
    total(imp, TotalCategory::PensionLiability, PENSION)
}

pub fn statutory_import() -> NormalizedImport {
    total(
        import(SourceType::Statutory),
        TotalCategory::StatutoryDue,
        DEDUCTIONS,
    )
}

pub fn pension_import() -> NormalizedImport {
    total(
        import(SourceType::PensionSchedule),
        TotalCategory::PensionDue,
        PENSION,
    )
}

/// All five sources, mutually consistent except for the bank total.
pub fn sources(bank_total: i64) -> Vec<NormalizedImport> {
    vec![
        register_import(),
        bank_import(bank_total),
        journal_import(),
        statutory_import(),
        pension_import(),
    ]
}

// -- stage helpers -----------------------------------------------------------

/// Create a pay run and attach the given imports (Draft → Mapped).
pub fn mapped_pay_run(h: &Harness, imports: Vec<NormalizedImport>) -> PayRun {
    let pay_run = h
        .tally
        .create_pay_run(&h.preparer, h.client_id, "2026-08")
        .unwrap();
    let mut latest = pay_run.clone();
    for imp in imports {
        latest = h.tally.attach_import(&h.preparer, pay_run.id, imp).unwrap();
    }
    latest
}

/// Balanced pay run taken through reconcile + submit + approve.
pub fn approved_pay_run(h: &Harness) -> Uuid {
    let pay_run = mapped_pay_run(h, sources(NET));
    h.tally.run_reconciliation(&h.preparer, pay_run.id).unwrap();
    h.tally.submit_for_review(&h.reviewer, pay_run.id).unwrap();
    h.tally
        .approve_pay_run(&h.second_reviewer, pay_run.id, None)
        .unwrap();
    pay_run.id
}
