use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain module an SLA target monitors. Each module owns the name of the
/// event emitted when one of its entities is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceModule {
    Case,
    Task,
}

impl ReferenceModule {
    /// The creation event for entities of this module. Start triggers are
    /// evaluated against this event at entity-creation time.
    pub fn creation_event(&self) -> &'static str {
        match self {
            ReferenceModule::Case => "case.created",
            ReferenceModule::Task => "task.created",
        }
    }
}

impl fmt::Display for ReferenceModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceModule::Case => write!(f, "case"),
            ReferenceModule::Task => write!(f, "task"),
        }
    }
}

impl FromStr for ReferenceModule {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "case" => Ok(ReferenceModule::Case),
            "task" => Ok(ReferenceModule::Task),
            other => Err(format!("unknown reference module: '{}'", other)),
        }
    }
}

/// Engine-side view of a monitored entity at creation time.
///
/// `payload` is the creation event's field map; start-trigger conditions
/// are evaluated against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredEntity {
    pub id: String,
    pub module: ReferenceModule,
    #[serde(default)]
    pub business_line_id: Option<Uuid>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Inbound domain event envelope.
///
/// The envelope carries the entity's module and business line so target
/// scoping never requires a lookup against the owning case store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub name: String,
    pub entity_id: String,
    pub module: ReferenceModule,
    #[serde(default)]
    pub business_line_id: Option<Uuid>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_event_per_module() {
        assert_eq!(ReferenceModule::Case.creation_event(), "case.created");
        assert_eq!(ReferenceModule::Task.creation_event(), "task.created");
    }

    #[test]
    fn module_display_from_str_round_trip() {
        for module in [ReferenceModule::Case, ReferenceModule::Task] {
            let parsed: ReferenceModule = module.to_string().parse().unwrap();
            assert_eq!(parsed, module);
        }
        assert!("widget".parse::<ReferenceModule>().is_err());
    }

    #[test]
    fn event_payload_defaults_to_null() {
        let event: DomainEvent = serde_json::from_str(
            r#"{"name":"case.status.changed","entity_id":"C-1","module":"case","business_line_id":null}"#,
        )
        .unwrap();
        assert!(event.payload.is_null());
    }
}
