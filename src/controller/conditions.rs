//! Condition helpers for DatabaseCluster status

use chrono::Utc;

use crate::crd::Condition;
use crate::error::Error;

/// All credentials required by the spec exist
pub const CONDITION_TYPE_SECRETS_READY: &str = "SecretsReady";
/// The spec passed validation
pub const CONDITION_TYPE_SPEC_VALID: &str = "SpecValid";

pub const CONDITION_STATUS_TRUE: &str = "True";
pub const CONDITION_STATUS_FALSE: &str = "False";

/// Update or add a condition.
///
/// The transition time only moves when the status flips.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    type_: &str,
    status: &str,
    reason: &str,
    message: &str,
    observed_generation: Option<i64>,
) {
    match conditions.iter_mut().find(|c| c.type_ == type_) {
        Some(existing) => {
            if existing.status != status {
                existing.last_transition_time = Utc::now().to_rfc3339();
            }
            existing.status = status.to_string();
            existing.reason = reason.to_string();
            existing.message = message.to_string();
            existing.observed_generation = observed_generation;
        }
        None => conditions.push(Condition {
            type_: type_.to_string(),
            status: status.to_string(),
            last_transition_time: Utc::now().to_rfc3339(),
            reason: reason.to_string(),
            message: message.to_string(),
            observed_generation,
        }),
    }
}

pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

pub fn is_condition_true(conditions: &[Condition], type_: &str) -> bool {
    find_condition(conditions, type_).is_some_and(|c| c.status == CONDITION_STATUS_TRUE)
}

/// Record the outcome of a credential pass as the SecretsReady condition.
pub fn set_secrets_ready(
    conditions: &mut Vec<Condition>,
    outcome: Result<usize, &Error>,
    observed_generation: Option<i64>,
) {
    match outcome {
        Ok(inspected) => set_condition(
            conditions,
            CONDITION_TYPE_SECRETS_READY,
            CONDITION_STATUS_TRUE,
            "SecretsEnsured",
            &format!("{inspected} credential(s) present"),
            observed_generation,
        ),
        Err(e) => set_condition(
            conditions,
            CONDITION_TYPE_SECRETS_READY,
            CONDITION_STATUS_FALSE,
            secrets_failure_reason(e),
            &e.to_string(),
            observed_generation,
        ),
    }
}

fn secrets_failure_reason(error: &Error) -> &'static str {
    match error {
        Error::ValidationError(_) => "InvalidSourceSecret",
        Error::StoreError { .. } | Error::Timeout { .. } | Error::KubeError(_) => {
            "SecretStoreUnavailable"
        }
        Error::NotFound { .. } => "MissingSecret",
        _ => "SecretsFailed",
    }
}
