//! Target validation with structured errors and advisory warnings.
//!
//! Run before a target definition is stored (admin API create, YAML
//! seeding). Errors block the save; warnings are advisory. Evaluation
//! itself fails closed on bad conditions, so validation exists to surface
//! mistakes at authoring time instead of silently-dead rules at runtime.

use casewatch_core::{Condition, ConditionOperator, SlaTarget, TriggerAction};
use serde::{Deserialize, Serialize};

// ── Result types ────────────────────────────────────────────────────

/// Overall validation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

/// A blocking validation error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    /// JSON-path-like location, e.g. `"rules.stop_triggers[0].event"`.
    pub path: String,
    pub message: String,
}

/// A non-blocking advisory warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationResult {
    fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationWarning {
            path: path.into(),
            message: message.into(),
        });
    }

    /// All error messages joined for single-line logging.
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ── Public API ──────────────────────────────────────────────────────

/// Validate a parsed [`SlaTarget`] definition.
pub fn validate_target(target: &SlaTarget) -> ValidationResult {
    let mut result = ValidationResult::new();

    if target.key.trim().is_empty() {
        result.error("key", "target key must not be empty");
    }
    if target.name.trim().is_empty() {
        result.error("name", "target name must not be empty");
    }
    if target.goal_ms <= 0 {
        result.error("goal_ms", "goal must be a positive duration in milliseconds");
    }

    if target.rules.start_triggers.is_empty() {
        result.warn(
            "rules.start_triggers",
            "target has no start triggers; its timers can never start",
        );
    }

    let lists = [
        ("start_triggers", TriggerAction::Start),
        ("stop_triggers", TriggerAction::Stop),
        ("pause_triggers", TriggerAction::Pause),
        ("resume_triggers", TriggerAction::Resume),
    ];
    for (list_name, action) in lists {
        for (i, trigger) in target.rules.for_action(action).iter().enumerate() {
            let path = format!("rules.{}[{}]", list_name, i);

            if trigger.event.trim().is_empty() {
                result.error(format!("{}.event", path), "trigger event must not be empty");
            }
            if trigger.action != action {
                result.error(
                    format!("{}.action", path),
                    format!(
                        "action '{}' does not belong in the {} list",
                        action_name(trigger.action),
                        list_name
                    ),
                );
            }
            validate_conditions(&trigger.conditions, &path, &mut result);
        }
    }

    result
}

fn validate_conditions(conditions: &[Condition], path: &str, result: &mut ValidationResult) {
    for (i, condition) in conditions.iter().enumerate() {
        let cpath = format!("{}.conditions[{}]", path, i);

        if condition.field.trim().is_empty() {
            result.error(format!("{}.field", cpath), "condition field must not be empty");
        }
        match condition.operator {
            ConditionOperator::Unknown => {
                result.error(format!("{}.operator", cpath), "unrecognized operator");
            }
            ConditionOperator::In | ConditionOperator::NotIn => {
                if !condition.value.is_array() {
                    result.error(
                        format!("{}.value", cpath),
                        "membership operators require an array value",
                    );
                }
            }
            _ => {}
        }
    }
}

fn action_name(action: TriggerAction) -> &'static str {
    match action {
        TriggerAction::Start => "start",
        TriggerAction::Stop => "stop",
        TriggerAction::Pause => "pause",
        TriggerAction::Resume => "resume",
    }
}
