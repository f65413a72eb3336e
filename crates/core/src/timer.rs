use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::target::SlaTarget;

/// Lifecycle state of an SLA timer. `Stopped`, `Breached`, and `Met` are
/// terminal and accept no further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Running,
    Paused,
    Stopped,
    Breached,
    Met,
}

impl TimerStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TimerStatus::Stopped | TimerStatus::Breached | TimerStatus::Met
        )
    }
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerStatus::Running => write!(f, "running"),
            TimerStatus::Paused => write!(f, "paused"),
            TimerStatus::Stopped => write!(f, "stopped"),
            TimerStatus::Breached => write!(f, "breached"),
            TimerStatus::Met => write!(f, "met"),
        }
    }
}

impl FromStr for TimerStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "running" => Ok(TimerStatus::Running),
            "paused" => Ok(TimerStatus::Paused),
            "stopped" => Ok(TimerStatus::Stopped),
            "breached" => Ok(TimerStatus::Breached),
            "met" => Ok(TimerStatus::Met),
            other => Err(format!("unknown timer status: '{}'", other)),
        }
    }
}

/// The live countdown instance for one `(entity, target)` pair.
///
/// `target_key` and `goal_ms` are denormalized from the target so the
/// scheduler can clamp and build breach notifications from the timer row
/// alone. The row is never deleted; it is the append-only record of this
/// SLA instance's life.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaTimer {
    pub id: Uuid,
    pub entity_id: String,
    pub target_id: Uuid,
    pub target_key: String,
    pub goal_ms: i64,
    pub status: TimerStatus,
    /// Countdown value, clamped to `[0, goal_ms]`.
    pub remaining_ms: i64,
    /// Cumulative time excluded from counting across pause/resume cycles.
    pub total_paused_ms: i64,
    pub started_at: DateTime<Utc>,
    pub last_tick_at: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub resumed_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub breached_at: Option<DateTime<Utc>>,
}

impl SlaTimer {
    /// Create a fresh `Running` timer for an entity against a target.
    pub fn start(entity_id: impl Into<String>, target: &SlaTarget, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id: entity_id.into(),
            target_id: target.id,
            target_key: target.key.clone(),
            goal_ms: target.goal_ms,
            status: TimerStatus::Running,
            remaining_ms: target.goal_ms.max(0),
            total_paused_ms: 0,
            started_at: now,
            last_tick_at: now,
            paused_at: None,
            resumed_at: None,
            stopped_at: None,
            breached_at: None,
        }
    }
}
