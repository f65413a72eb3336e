//! Storage traits for SLA targets and timers.
//!
//! Timer state never moves through a read-branch-write sequence: every
//! transition method is a conditional update keyed on the expected prior
//! status (and, for [`advance`](TimerStore::advance), the observed
//! `last_tick_at`). A transition whose expectation no longer holds —
//! because another writer got there first, or the transition is illegal
//! for the timer's current state — returns `Ok(None)` and changes
//! nothing. The store layer, not its callers, enforces the status graph.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use casewatch_core::{ReferenceModule, SlaTarget, SlaTimer};

/// Errors from target/timer storage.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("timer already exists for entity '{entity_id}' and target {target_id}")]
    DuplicateTimer { entity_id: String, target_id: Uuid },

    #[error("target key '{0}' already exists")]
    DuplicateTargetKey(String),

    #[error("invalid stored value: {0}")]
    InvalidValue(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence for [`SlaTarget`] definitions.
#[async_trait::async_trait]
pub trait TargetStore: Send + Sync {
    /// Insert a target. Fails with [`StoreError::DuplicateTargetKey`] when
    /// the key is taken.
    async fn insert(&self, target: SlaTarget) -> Result<SlaTarget>;

    async fn get(&self, id: Uuid) -> Result<Option<SlaTarget>>;

    async fn list(&self) -> Result<Vec<SlaTarget>>;

    /// Active targets monitoring `module`, scoped to the given business
    /// line. Global targets (no business line) are always included.
    async fn list_active(
        &self,
        module: ReferenceModule,
        business_line_id: Option<Uuid>,
    ) -> Result<Vec<SlaTarget>>;

    /// Returns `false` when no target with that id existed.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Persistence for [`SlaTimer`] rows.
///
/// At most one timer exists per `(entity_id, target_id)`; the store
/// enforces this on insert. Timers are never deleted.
#[async_trait::async_trait]
pub trait TimerStore: Send + Sync {
    /// Insert a fresh timer. Fails with [`StoreError::DuplicateTimer`] when
    /// the `(entity_id, target_id)` pair already has one.
    async fn insert(&self, timer: SlaTimer) -> Result<SlaTimer>;

    async fn get(&self, entity_id: &str, target_id: Uuid) -> Result<Option<SlaTimer>>;

    async fn list_for_entity(&self, entity_id: &str) -> Result<Vec<SlaTimer>>;

    /// Up to `limit` `Running` timers, least-recently-ticked first.
    async fn list_running(&self, limit: usize) -> Result<Vec<SlaTimer>>;

    /// `Running -> Met`, setting `stopped_at`.
    async fn mark_met(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<SlaTimer>>;

    /// `Running -> Paused`, setting `paused_at`. Remaining time freezes.
    async fn mark_paused(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<SlaTimer>>;

    /// `Paused -> Running`. Adds the paused interval to `total_paused_ms`,
    /// clears `paused_at`, sets `resumed_at`, and resets `last_tick_at` so
    /// the next tick does not charge the paused interval.
    async fn mark_resumed(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<SlaTimer>>;

    /// `Running|Paused -> Stopped` (administrative cancel), setting
    /// `stopped_at`.
    async fn mark_stopped(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<SlaTimer>>;

    /// Claim-and-advance for the scheduler: decrements `remaining_ms` by
    /// the elapsed time since `expected_tick` (clamped to `[0, goal]`) and
    /// moves `last_tick_at` to `now`, guarded on
    /// `status = Running AND last_tick_at = expected_tick` so concurrent
    /// schedulers cannot double-decrement the same interval.
    async fn advance(
        &self,
        id: Uuid,
        expected_tick: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<SlaTimer>>;

    /// `Running -> Breached`, setting `breached_at` and zeroing
    /// `remaining_ms`. The CAS winner is the one emitter of the breach
    /// notification.
    async fn mark_breached(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<SlaTimer>>;
}
