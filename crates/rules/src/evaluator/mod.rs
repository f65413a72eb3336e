//! Pure trigger evaluation.
//!
//! Matches a [`Trigger`] against an incoming event name and payload.
//! Evaluation is side-effect-free and total: malformed conditions fail
//! closed (with a warning) instead of erroring, so a bad rule can never
//! wrongly fire a transition or take the event path down.

mod alias;
mod conditions;

pub use alias::{canonical_event, EVENT_ALIASES};
pub use conditions::evaluate_condition;

use casewatch_core::{Trigger, TriggerAction, TriggerRules};

/// Evaluate a single trigger against an event.
///
/// The event name must match exactly after canonicalization through the
/// [`EVENT_ALIASES`] table. With no conditions, a name match alone
/// suffices; otherwise all conditions must hold (AND).
pub fn evaluate_trigger(trigger: &Trigger, event_name: &str, payload: &serde_json::Value) -> bool {
    if canonical_event(&trigger.event) != canonical_event(event_name) {
        return false;
    }
    trigger
        .conditions
        .iter()
        .all(|condition| evaluate_condition(condition, payload))
}

/// All triggers of the requested action category that match the event,
/// in declaration order. Callers generally only need "any match".
pub fn find_matching_triggers<'a>(
    rules: &'a TriggerRules,
    event_name: &str,
    payload: &serde_json::Value,
    action: TriggerAction,
) -> Vec<&'a Trigger> {
    rules
        .for_action(action)
        .iter()
        .filter(|trigger| evaluate_trigger(trigger, event_name, payload))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use casewatch_core::{Condition, ConditionOperator};
    use serde_json::json;

    fn trigger(event: &str, conditions: Vec<Condition>, action: TriggerAction) -> Trigger {
        Trigger {
            event: event.to_string(),
            conditions,
            action,
        }
    }

    fn equals(field: &str, value: serde_json::Value) -> Condition {
        Condition {
            field: field.to_string(),
            operator: ConditionOperator::Equals,
            value,
        }
    }

    #[test]
    fn name_match_without_conditions_suffices() {
        let t = trigger("case.created", vec![], TriggerAction::Start);
        assert!(evaluate_trigger(&t, "case.created", &json!({})));
        assert!(!evaluate_trigger(&t, "case.updated", &json!({})));
    }

    #[test]
    fn creation_sync_alias_matches_both_directions() {
        let t = trigger("case.created", vec![], TriggerAction::Start);
        assert!(evaluate_trigger(&t, "case.created.sync", &json!({})));

        let t = trigger("case.created.sync", vec![], TriggerAction::Start);
        assert!(evaluate_trigger(&t, "case.created", &json!({})));
    }

    #[test]
    fn alias_does_not_leak_to_other_events() {
        let t = trigger("case.status.changed", vec![], TriggerAction::Stop);
        assert!(!evaluate_trigger(&t, "case.status.changed.sync", &json!({})));
    }

    #[test]
    fn all_conditions_must_hold() {
        let t = trigger(
            "case.status.changed",
            vec![
                equals("to", json!("Resolved")),
                equals("priority", json!("high")),
            ],
            TriggerAction::Stop,
        );
        assert!(evaluate_trigger(
            &t,
            "case.status.changed",
            &json!({"to": "Resolved", "priority": "high"}),
        ));
        assert!(!evaluate_trigger(
            &t,
            "case.status.changed",
            &json!({"to": "Resolved", "priority": "low"}),
        ));
    }

    #[test]
    fn find_matching_filters_by_action_in_declaration_order() {
        let rules: TriggerRules = serde_json::from_value(json!({
            "stop_triggers": [
                {"event": "case.status.changed", "action": "stop",
                 "conditions": [{"field": "to", "operator": "equals", "value": "Resolved"}]},
                {"event": "case.status.changed", "action": "stop",
                 "conditions": [{"field": "to", "operator": "in", "value": ["Resolved", "Closed"]}]}
            ],
            "pause_triggers": [
                {"event": "case.status.changed", "action": "pause",
                 "conditions": [{"field": "to", "operator": "equals", "value": "OnHold"}]}
            ]
        }))
        .unwrap();

        let payload = json!({"to": "Resolved"});
        let stops =
            find_matching_triggers(&rules, "case.status.changed", &payload, TriggerAction::Stop);
        assert_eq!(stops.len(), 2);

        let pauses =
            find_matching_triggers(&rules, "case.status.changed", &payload, TriggerAction::Pause);
        assert!(pauses.is_empty());
    }
}
