//! Tolerance resolver - merges the firm → client → pay-run override layers
//! over the regional bundle defaults into one complete settings object.
//!
//! Precedence is applied **per field**, not per object: a client can override
//! only `percent` while the firm layer supplies `absoluteCents`. Malformed
//! buckets and ill-typed fields are skipped field-by-field; the resolver
//! never errors. Negative values clamp to the bundle default (the floor is
//! never below zero).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tally_domain::Region;

/// Where a resolved field's value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Layer {
    Bundle,
    Firm,
    Client,
    PayRun,
}

/// Absolute-cents / percent bound pair for one check family. A delta within
/// either bound passes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceBand {
    pub absolute_cents: i64,
    /// Percentage points (0.5 means 0.5%).
    pub percent: f64,
}

impl ToleranceBand {
    pub const fn new(absolute_cents: i64, percent: f64) -> Self {
        Self {
            absolute_cents,
            percent,
        }
    }
}

/// Fully resolved tolerance settings. Derived at read time - never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToleranceSettings {
    pub net_to_bank: ToleranceBand,
    pub journal_balance: ToleranceBand,
    pub journal_expense: ToleranceBand,
    pub journal_liability: ToleranceBand,
    pub statutory: ToleranceBand,
    pub pension: ToleranceBand,
    /// Scalar percent bound for the bank payment-count comparison.
    pub payment_count_mismatch_pct: f64,
    /// Field path → layer that supplied the value, for audit display.
    pub provenance: BTreeMap<String, Layer>,
}

/// Bundle hard defaults per region - the outermost fallback layer.
fn bundle_defaults(region: Region) -> ToleranceSettings {
    // UK and IE currently share values; the split exists so a regional
    // divergence is a data change, not a code restructure.
    let _ = region;
    ToleranceSettings {
        net_to_bank: ToleranceBand::new(100, 0.5),
        journal_balance: ToleranceBand::new(50, 0.1),
        journal_expense: ToleranceBand::new(100, 0.5),
        journal_liability: ToleranceBand::new(100, 0.5),
        statutory: ToleranceBand::new(100, 0.5),
        pension: ToleranceBand::new(100, 0.5),
        payment_count_mismatch_pct: 0.0,
        provenance: BTreeMap::new(),
    }
}

/// Resolve the effective tolerances for one pay run.
///
/// `firm`, `client` and `pay_run` are the raw override blobs as stored; any
/// of them may be absent, non-object, or partially ill-typed without
/// affecting the other fields.
pub fn resolve_tolerances(
    region: Region,
    firm: Option<&Value>,
    client: Option<&Value>,
    pay_run: Option<&Value>,
) -> ToleranceSettings {
    let defaults = bundle_defaults(region);
    // Innermost first: pay-run > client > firm.
    let layers: [(Layer, Option<&Value>); 3] = [
        (Layer::PayRun, pay_run),
        (Layer::Client, client),
        (Layer::Firm, firm),
    ];

    let mut provenance = BTreeMap::new();
    let mut band = |family: &str, default: ToleranceBand| -> ToleranceBand {
        let (abs, abs_layer) = resolve_cents(
            default.absolute_cents,
            &format!("/{family}/absoluteCents"),
            &layers,
        );
        let (pct, pct_layer) =
            resolve_percent(default.percent, &format!("/{family}/percent"), &layers);
        provenance.insert(format!("{family}.absoluteCents"), abs_layer);
        provenance.insert(format!("{family}.percent"), pct_layer);
        ToleranceBand::new(abs, pct)
    };

    let net_to_bank = band("netToBank", defaults.net_to_bank);
    let journal_balance = band("journalBalance", defaults.journal_balance);
    let journal_expense = band("journalExpense", defaults.journal_expense);
    let journal_liability = band("journalLiability", defaults.journal_liability);
    let statutory = band("statutory", defaults.statutory);
    let pension = band("pension", defaults.pension);

    let (count_pct, count_layer) = resolve_percent(
        defaults.payment_count_mismatch_pct,
        "/paymentCountMismatchPercent",
        &layers,
    );
    provenance.insert("paymentCountMismatchPercent".to_string(), count_layer);

    ToleranceSettings {
        net_to_bank,
        journal_balance,
        journal_expense,
        journal_liability,
        statutory,
        pension,
        payment_count_mismatch_pct: count_pct,
        provenance,
    }
}

/// First well-formed integer across the layers; negative clamps to the
/// bundle default. Ill-typed values fall through to the next-outer layer.
fn resolve_cents(
    default: i64,
    pointer: &str,
    layers: &[(Layer, Option<&Value>)],
) -> (i64, Layer) {
    for (layer, blob) in layers {
        let Some(v) = blob.and_then(|b| b.pointer(pointer)) else {
            continue;
        };
        let Some(n) = v.as_i64() else {
            continue;
        };
        if n < 0 {
            return (default, *layer);
        }
        return (n, *layer);
    }
    (default, Layer::Bundle)
}

/// First finite number across the layers; negative clamps to the bundle
/// default. NaN/inf and non-numbers fall through.
fn resolve_percent(
    default: f64,
    pointer: &str,
    layers: &[(Layer, Option<&Value>)],
) -> (f64, Layer) {
    for (layer, blob) in layers {
        let Some(v) = blob.and_then(|b| b.pointer(pointer)) else {
            continue;
        };
        let Some(n) = v.as_f64() else {
            continue;
        };
        if !n.is_finite() {
            continue;
        }
        if n < 0.0 {
            return (default, *layer);
        }
        return (n, *layer);
    }
    (default, Layer::Bundle)
}
