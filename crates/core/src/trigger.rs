use serde::{Deserialize, Serialize};

/// Timer transition a trigger fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerAction {
    Start,
    Stop,
    Pause,
    Resume,
}

/// Comparison operator for a single field condition.
///
/// Unrecognized operator strings deserialize to [`Unknown`](Self::Unknown)
/// instead of failing the whole document; the evaluator treats `Unknown`
/// as fail-closed and validation rejects it at save time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Contains,
    #[serde(other)]
    Unknown,
}

/// A single field condition. `field` is a dot-path into the event payload;
/// `value` defaults to JSON `null`, which is an explicit sentinel distinct
/// from "field absent".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// An (event, conditions, action) rule. Conditions are AND-combined; an
/// empty list means the event name alone matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub event: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub action: TriggerAction,
}

/// The four trigger lists attached to an [`SlaTarget`](crate::SlaTarget),
/// stored as plain serializable data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerRules {
    #[serde(default)]
    pub start_triggers: Vec<Trigger>,
    #[serde(default)]
    pub stop_triggers: Vec<Trigger>,
    #[serde(default)]
    pub pause_triggers: Vec<Trigger>,
    #[serde(default)]
    pub resume_triggers: Vec<Trigger>,
}

impl TriggerRules {
    /// The trigger list for one action category.
    pub fn for_action(&self, action: TriggerAction) -> &[Trigger] {
        match action {
            TriggerAction::Start => &self.start_triggers,
            TriggerAction::Stop => &self.stop_triggers,
            TriggerAction::Pause => &self.pause_triggers,
            TriggerAction::Resume => &self.resume_triggers,
        }
    }
}
