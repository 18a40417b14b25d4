//! Versioned check bundles. A bundle fixes the catalog *and* its execution
//! order; results and packs record the bundle id/version they were produced
//! under so historic runs stay interpretable after a catalog revision.

use tally_domain::{CheckType, Region, Severity};

/// Version stamped on every evaluation produced by this crate.
pub const CHECK_VERSION: u32 = 1;

/// Maximum evidence rows captured per side of a comparison.
pub const EVIDENCE_ROW_CAP: usize = 5;

/// Severity banding for a failed amount comparison, expressed as the overage
/// of `delta_percent` above the percent tolerance, in percentage points.
const OVERAGE_HIGH_PP: f64 = 1.0;
const OVERAGE_CRITICAL_PP: f64 = 5.0;

/// A named, versioned set of checks executed together for a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckBundle {
    pub id: &'static str,
    pub version: u32,
    /// Fixed execution order. The orchestrator runs these exactly in order.
    pub checks: &'static [CheckType],
}

const UK_IE_CHECK_ORDER: &[CheckType] = &[
    CheckType::RegisterNetToBank,
    CheckType::JournalDebitsEqualCredits,
    CheckType::RegisterDeductionsToStatutory,
    CheckType::RegisterGrossToJournalExpense,
    CheckType::RegisterEmployerCostsToJournalExpense,
    CheckType::RegisterNetPayToJournalLiability,
    CheckType::RegisterTaxToJournalLiability,
    CheckType::RegisterPensionToJournalLiability,
    CheckType::RegisterPensionToPensionSchedule,
    CheckType::DuplicatePayments,
    CheckType::NegativePayments,
    CheckType::PaymentCountMismatch,
];

const BUNDLE_UK_V1: CheckBundle = CheckBundle {
    id: "BUNDLE_UK_V1",
    version: 1,
    checks: UK_IE_CHECK_ORDER,
};

const BUNDLE_IE_V1: CheckBundle = CheckBundle {
    id: "BUNDLE_IE_V1",
    version: 1,
    checks: UK_IE_CHECK_ORDER,
};

pub fn bundle_for_region(region: Region) -> CheckBundle {
    match region {
        Region::Uk => BUNDLE_UK_V1,
        Region::Ie => BUNDLE_IE_V1,
    }
}

/// Severity of a failed comparison from how far `delta_percent` exceeds the
/// percent tolerance.
pub fn severity_for_overage(delta_percent: f64, percent_tolerance: f64) -> Severity {
    let overage = delta_percent - percent_tolerance;
    if overage >= OVERAGE_CRITICAL_PP {
        Severity::Critical
    } else if overage >= OVERAGE_HIGH_PP {
        Severity::High
    } else {
        Severity::Medium
    }
}
