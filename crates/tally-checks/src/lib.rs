//! Deterministic reconciliation check engine.
//!
//! Everything in this crate is a pure function: no IO, no clock, no
//! randomness. The same inputs always produce byte-identical output - the
//! orchestrator in `tally-engine` relies on that for re-run determinism.

pub mod bundle;
pub mod evaluators;
pub mod tolerance;
pub mod variance;

pub use bundle::{bundle_for_region, severity_for_overage, CheckBundle, CHECK_VERSION};
pub use evaluators::{evaluate_check, CheckInputs};
pub use tolerance::{
    resolve_tolerances, Layer, ToleranceBand, ToleranceSettings,
};
pub use variance::apply_expected_variances;
