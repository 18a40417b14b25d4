//! Expected-variance matcher - downgrades a failing evaluation when a
//! pre-declared variance rule matches.
//!
//! Matching is deliberately lenient about rule shape (rules arrive as JSON
//! from the admin surface): a condition that is not an object constrains
//! nothing and matches unconditionally; an effect that is not an object makes
//! the rule unusable and skips it. Evaluation order is list order,
//! first-match wins - not best-match.

use serde_json::Value;
use tally_domain::{
    CheckEvaluation, CheckStatus, ExpectedVariance, ImportRow, Severity, VarianceStamp,
};

/// Parsed effect of a variance rule. `None` when the stored effect is
/// malformed, in which case the rule is skipped entirely.
struct VarianceEffect {
    downgrade_to: CheckStatus,
    requires_note: bool,
    requires_attachment: bool,
    requires_reviewer_ack: bool,
}

fn parse_effect(effect: &Value) -> Option<VarianceEffect> {
    let obj = effect.as_object()?;
    let downgrade_to = match obj.get("downgradeTo").and_then(Value::as_str) {
        Some("PASS") => CheckStatus::Pass,
        Some("WARN") => CheckStatus::Warn,
        _ => return None,
    };
    let flag = |key: &str| obj.get(key).and_then(Value::as_bool).unwrap_or(false);
    Some(VarianceEffect {
        downgrade_to,
        requires_note: flag("requiresNote"),
        requires_attachment: flag("requiresAttachment"),
        requires_reviewer_ack: flag("requiresReviewerAck"),
    })
}

/// Inclusive bounds check against a `{min?, max?}` object. A bounds value
/// that is not an object, or a bound that is not a finite number, fails the
/// sub-condition (rather than erroring).
fn bounds_match(bounds: &Value, x: f64) -> bool {
    let Some(obj) = bounds.as_object() else {
        return false;
    };
    if !x.is_finite() {
        return false;
    }
    for (key, cmp) in [("min", f64::ge as fn(&f64, &f64) -> bool), ("max", f64::le)] {
        if let Some(raw) = obj.get(key) {
            match raw.as_f64() {
                Some(bound) if bound.is_finite() => {
                    if !cmp(&x, &bound) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }
    true
}

/// Case-insensitive substring test against any supplied bank payment field.
fn any_payment_contains(
    payments: &[ImportRow],
    needle: &Value,
    field: fn(&ImportRow) -> Option<&str>,
) -> bool {
    let Some(needle) = needle.as_str() else {
        return false;
    };
    let needle = needle.to_lowercase();
    payments
        .iter()
        .filter_map(field)
        .any(|v| v.to_lowercase().contains(&needle))
}

/// Every *declared* sub-condition must match (AND). An absent sub-condition
/// constrains nothing; a non-object condition constrains nothing at all.
fn condition_matches(
    condition: &Value,
    eval: &CheckEvaluation,
    bank_payments: &[ImportRow],
) -> bool {
    let Some(obj) = condition.as_object() else {
        return true;
    };
    if let Some(bounds) = obj.get("amountBounds") {
        if !bounds_match(bounds, eval.details.delta_value as f64) {
            return false;
        }
    }
    if let Some(bounds) = obj.get("pctBounds") {
        if !bounds_match(bounds, eval.details.delta_percent) {
            return false;
        }
    }
    if let Some(needle) = obj.get("payeeContains") {
        if !any_payment_contains(bank_payments, needle, |r| r.payee.as_deref()) {
            return false;
        }
    }
    if let Some(needle) = obj.get("referenceContains") {
        if !any_payment_contains(bank_payments, needle, |r| r.reference.as_deref()) {
            return false;
        }
    }
    true
}

/// Post-process one evaluation against the declared variances.
///
/// No-op unless the evaluation is FAIL. On the first matching active rule:
/// status becomes the rule's downgrade target; severity drops to INFO only
/// for a downgrade to PASS (a WARN downgrade keeps the failure's severity and
/// its exception draft); the applied rule is stamped into `details` for the
/// review surface and audit trail.
pub fn apply_expected_variances(
    mut eval: CheckEvaluation,
    variances: &[ExpectedVariance],
    bank_payments: &[ImportRow],
) -> CheckEvaluation {
    if eval.status != CheckStatus::Fail {
        return eval;
    }

    for variance in variances {
        if !variance.is_active() {
            continue;
        }
        if let Some(scope) = variance.check_type {
            if scope != eval.check_type {
                continue;
            }
        }
        let Some(effect) = parse_effect(&variance.effect) else {
            continue;
        };
        if !condition_matches(&variance.condition, &eval, bank_payments) {
            continue;
        }

        eval.status = effect.downgrade_to;
        if effect.downgrade_to == CheckStatus::Pass {
            eval.severity = Severity::Info;
            eval.exception = None;
        }
        eval.details.expected_variance = Some(VarianceStamp {
            id: variance.id,
            requires_note: effect.requires_note,
            requires_attachment: effect.requires_attachment,
            requires_reviewer_ack: effect.requires_reviewer_ack,
        });
        break;
    }

    eval
}
