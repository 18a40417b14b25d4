//! Expected-variance administration. Rules are created by reviewers/admins,
//! validated for shape at creation, and soft-archived - never deleted, so a
//! historic run's downgrade stamp always points at a retrievable rule.

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use tally_domain::{
    Action, ActorContext, CheckType, DomainError, DomainResult, ExpectedVariance,
};
use tally_store::ArtifactStore;

use crate::service::Tally;

const CONDITION_KEYS: &[&str] = &[
    "amountBounds",
    "pctBounds",
    "payeeContains",
    "referenceContains",
];

impl<A: ArtifactStore> Tally<A> {
    /// Create a variance rule for a client, optionally scoped to one check
    /// type. The condition must declare at least one recognized
    /// sub-condition and the effect must be a well-formed downgrade.
    pub fn create_expected_variance(
        &self,
        actor: &ActorContext,
        client_id: Uuid,
        check_type: Option<CheckType>,
        condition: Value,
        effect: Value,
    ) -> DomainResult<ExpectedVariance> {
        self.require(actor, Action::ManageVariances)?;
        validate_condition(&condition)?;
        validate_effect(&effect)?;

        let variance = self.store.in_transaction(|st| {
            st.client(actor.firm_id, client_id)?;
            let variance = ExpectedVariance {
                id: Uuid::new_v4(),
                firm_id: actor.firm_id,
                client_id,
                check_type,
                condition: condition.clone(),
                effect: effect.clone(),
                created_by: actor.user_id,
                created_at: Utc::now(),
                active: true,
                archived_at: None,
            };
            st.variances.insert(variance.id, variance.clone());
            Ok(variance)
        })?;
        self.emit(
            actor,
            "variance.create",
            "expected_variance",
            variance.id,
            json!({
                "client_id": client_id,
                "check_type": check_type.map(CheckType::as_str),
            }),
        );
        Ok(variance)
    }

    /// Soft-archive a rule. Idempotent: archiving an archived rule is a
    /// no-op, not an error.
    pub fn archive_expected_variance(
        &self,
        actor: &ActorContext,
        variance_id: Uuid,
    ) -> DomainResult<ExpectedVariance> {
        self.require(actor, Action::ManageVariances)?;
        let variance = self.store.in_transaction(|st| {
            let variance = st.variance_mut(actor.firm_id, variance_id)?;
            if variance.archived_at.is_none() {
                variance.archived_at = Some(Utc::now());
                variance.active = false;
            }
            Ok(variance.clone())
        })?;
        self.emit(
            actor,
            "variance.archive",
            "expected_variance",
            variance_id,
            json!({}),
        );
        Ok(variance)
    }
}

fn validate_condition(condition: &Value) -> DomainResult<()> {
    let declared = condition
        .as_object()
        .map(|obj| CONDITION_KEYS.iter().filter(|k| obj.contains_key(**k)).count())
        .unwrap_or(0);
    if declared == 0 {
        return Err(DomainError::validation(format!(
            "condition must declare at least one of: {}",
            CONDITION_KEYS.join(", ")
        )));
    }
    Ok(())
}

fn validate_effect(effect: &Value) -> DomainResult<()> {
    let downgrade = effect
        .as_object()
        .and_then(|obj| obj.get("downgradeTo"))
        .and_then(Value::as_str);
    match downgrade {
        Some("PASS") | Some("WARN") => Ok(()),
        _ => Err(DomainError::validation(
            "effect.downgradeTo must be PASS or WARN",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn condition_needs_a_recognized_sub_condition() {
        assert!(validate_condition(&json!({"amountBounds": {"max": 100}})).is_ok());
        assert!(validate_condition(&json!({"payeeContains": "HMRC"})).is_ok());
        assert!(validate_condition(&json!({})).is_err());
        assert!(validate_condition(&json!({"unknown": 1})).is_err());
        assert!(validate_condition(&json!("not an object")).is_err());
    }

    #[test]
    fn effect_needs_a_valid_downgrade_target() {
        assert!(validate_effect(&json!({"downgradeTo": "PASS"})).is_ok());
        assert!(validate_effect(&json!({"downgradeTo": "WARN", "requiresNote": true})).is_ok());
        assert!(validate_effect(&json!({"downgradeTo": "FAIL"})).is_err());
        assert!(validate_effect(&json!({})).is_err());
        assert!(validate_effect(&json!(null)).is_err());
    }
}
