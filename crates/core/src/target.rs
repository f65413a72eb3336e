use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::ReferenceModule;
use crate::trigger::TriggerRules;

/// A named, configurable time commitment scoped to a business line and a
/// monitored module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaTarget {
    pub id: Uuid,
    /// Human-stable identifier, unique across targets (e.g. `"respond"`).
    pub key: String,
    pub name: String,
    /// Target duration in milliseconds.
    pub goal_ms: i64,
    pub reference_module: ReferenceModule,
    /// `None` means globally applicable.
    pub business_line_id: Option<Uuid>,
    pub rules: TriggerRules,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl SlaTarget {
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        goal_ms: i64,
        reference_module: ReferenceModule,
        business_line_id: Option<Uuid>,
        rules: TriggerRules,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: key.into(),
            name: name.into(),
            goal_ms,
            reference_module,
            business_line_id,
            rules,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Whether this target applies to an entity in the given business line.
    /// Global targets (no business line) apply everywhere.
    pub fn applies_to(&self, business_line_id: Option<Uuid>) -> bool {
        match self.business_line_id {
            None => true,
            Some(scoped) => business_line_id == Some(scoped),
        }
    }
}
