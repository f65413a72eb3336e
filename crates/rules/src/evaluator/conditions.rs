//! Single-condition evaluation with dot-path field resolution.

use casewatch_core::{Condition, ConditionOperator};
use serde_json::Value;
use tracing::warn;

/// Evaluate one condition against an event payload.
///
/// The condition's `field` is resolved as a dot-path into the payload. A
/// missing path is "undefined": it fails `equals`/`contains`/`in`, and is
/// distinct from any concrete value (including explicit `null`) for
/// `not_equals`/`not_in`. Unrecognized operators and malformed membership
/// values fail closed with a warning — a bad condition never fires a
/// transition and never panics.
pub fn evaluate_condition(condition: &Condition, payload: &Value) -> bool {
    let resolved = resolve_path(payload, &condition.field);

    match condition.operator {
        ConditionOperator::Equals => resolved == Some(&condition.value),
        ConditionOperator::NotEquals => resolved != Some(&condition.value),
        ConditionOperator::In => match condition.value.as_array() {
            Some(allowed) => resolved.is_some_and(|v| allowed.contains(v)),
            None => {
                warn!(
                    field = %condition.field,
                    "'in' condition value is not an array, failing closed"
                );
                false
            }
        },
        ConditionOperator::NotIn => match condition.value.as_array() {
            Some(denied) => resolved.is_none_or(|v| !denied.contains(v)),
            None => {
                warn!(
                    field = %condition.field,
                    "'not_in' condition value is not an array, failing closed"
                );
                false
            }
        },
        ConditionOperator::Contains => match resolved {
            Some(actual) => coerce_to_string(actual)
                .to_lowercase()
                .contains(&coerce_to_string(&condition.value).to_lowercase()),
            None => false,
        },
        ConditionOperator::Unknown => {
            warn!(
                field = %condition.field,
                "unrecognized condition operator, failing closed"
            );
            false
        }
    }
}

/// Resolve a dot-path (`"assignment.group"`) against a JSON payload.
/// Returns `None` when any segment is missing or traverses a non-object.
fn resolve_path<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = payload;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// String coercion for the `contains` substring test. JSON strings are
/// used as-is; other values use their JSON rendering.
fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn condition(field: &str, operator: ConditionOperator, value: Value) -> Condition {
        Condition {
            field: field.to_string(),
            operator,
            value,
        }
    }

    // Scenario: equals against present, different, and missing fields.
    #[test]
    fn equals_matches_exact_value_only() {
        let c = condition("to", ConditionOperator::Equals, json!("Resolved"));
        assert!(evaluate_condition(&c, &json!({"to": "Resolved"})));
        assert!(!evaluate_condition(&c, &json!({"to": "InProgress"})));
        assert!(!evaluate_condition(&c, &json!({})));
    }

    #[test]
    fn equals_is_strict_on_types() {
        let c = condition("priority", ConditionOperator::Equals, json!(2));
        assert!(evaluate_condition(&c, &json!({"priority": 2})));
        assert!(!evaluate_condition(&c, &json!({"priority": "2"})));
    }

    #[test]
    fn explicit_null_is_distinct_from_absent() {
        let c = condition("assignee", ConditionOperator::Equals, Value::Null);
        // Present null matches the null sentinel; an absent field does not.
        assert!(evaluate_condition(&c, &json!({"assignee": null})));
        assert!(!evaluate_condition(&c, &json!({})));
    }

    #[test]
    fn not_equals_treats_undefined_as_distinct() {
        let c = condition("to", ConditionOperator::NotEquals, json!("Resolved"));
        assert!(!evaluate_condition(&c, &json!({"to": "Resolved"})));
        assert!(evaluate_condition(&c, &json!({"to": "InProgress"})));
        // Undefined is distinct from any concrete value.
        assert!(evaluate_condition(&c, &json!({})));
    }

    #[test]
    fn in_membership() {
        let c = condition("to", ConditionOperator::In, json!(["Resolved", "Closed"]));
        assert!(evaluate_condition(&c, &json!({"to": "Closed"})));
        assert!(!evaluate_condition(&c, &json!({"to": "Open"})));
        assert!(!evaluate_condition(&c, &json!({})));
    }

    #[test]
    fn not_in_membership() {
        let c = condition("to", ConditionOperator::NotIn, json!(["Spam"]));
        assert!(evaluate_condition(&c, &json!({"to": "Open"})));
        assert!(!evaluate_condition(&c, &json!({"to": "Spam"})));
        // Undefined is not a member of anything.
        assert!(evaluate_condition(&c, &json!({})));
    }

    #[test]
    fn membership_with_non_array_value_fails_closed() {
        let c = condition("to", ConditionOperator::In, json!("Resolved"));
        assert!(!evaluate_condition(&c, &json!({"to": "Resolved"})));

        let c = condition("to", ConditionOperator::NotIn, json!("Spam"));
        assert!(!evaluate_condition(&c, &json!({"to": "Open"})));
    }

    #[test]
    fn contains_is_case_insensitive_substring() {
        let c = condition("subject", ConditionOperator::Contains, json!("URGENT"));
        assert!(evaluate_condition(
            &c,
            &json!({"subject": "Re: urgent outage"}),
        ));
        assert!(!evaluate_condition(&c, &json!({"subject": "routine"})));
        assert!(!evaluate_condition(&c, &json!({})));
    }

    #[test]
    fn contains_coerces_non_strings() {
        let c = condition("code", ConditionOperator::Contains, json!(50));
        assert!(evaluate_condition(&c, &json!({"code": 1503})));
    }

    #[test]
    fn unknown_operator_fails_closed() {
        let c: Condition =
            serde_json::from_value(json!({"field": "to", "operator": "regex", "value": ".*"}))
                .unwrap();
        assert!(!evaluate_condition(&c, &json!({"to": "anything"})));
    }

    #[test]
    fn dot_path_traverses_nested_objects() {
        let c = condition(
            "assignment.group",
            ConditionOperator::Equals,
            json!("tier-2"),
        );
        assert!(evaluate_condition(
            &c,
            &json!({"assignment": {"group": "tier-2"}}),
        ));
        assert!(!evaluate_condition(&c, &json!({"assignment": {}})));
        assert!(!evaluate_condition(&c, &json!({"assignment": "tier-2"})));
    }
}
