//! In-memory store backed by `std::sync::RwLock`.
//!
//! Used by tests and configuration-free deployments. Lock scopes never
//! cross an await point, so the std lock is safe on the async runtime.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use casewatch_core::{ReferenceModule, SlaTarget, SlaTimer, TimerStatus};

use super::{Result, StoreError, TargetStore, TimerStore};

#[derive(Default)]
struct TimerTable {
    by_id: HashMap<Uuid, SlaTimer>,
    by_pair: HashMap<(String, Uuid), Uuid>,
}

/// In-memory implementation of [`TargetStore`] and [`TimerStore`].
#[derive(Default)]
pub struct MemoryStore {
    targets: RwLock<HashMap<Uuid, SlaTarget>>,
    timers: RwLock<TimerTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `mutate` to the timer iff its status is one of `expected`.
    fn update_if<F>(&self, id: Uuid, expected: &[TimerStatus], mutate: F) -> Option<SlaTimer>
    where
        F: FnOnce(&mut SlaTimer),
    {
        let mut table = self.timers.write().expect("timer table lock poisoned");
        let timer = table.by_id.get_mut(&id)?;
        if !expected.contains(&timer.status) {
            return None;
        }
        mutate(timer);
        Some(timer.clone())
    }
}

#[async_trait::async_trait]
impl TargetStore for MemoryStore {
    async fn insert(&self, target: SlaTarget) -> Result<SlaTarget> {
        let mut targets = self.targets.write().expect("target lock poisoned");
        if targets.values().any(|t| t.key == target.key) {
            return Err(StoreError::DuplicateTargetKey(target.key));
        }
        targets.insert(target.id, target.clone());
        Ok(target)
    }

    async fn get(&self, id: Uuid) -> Result<Option<SlaTarget>> {
        let targets = self.targets.read().expect("target lock poisoned");
        Ok(targets.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<SlaTarget>> {
        let targets = self.targets.read().expect("target lock poisoned");
        let mut all: Vec<SlaTarget> = targets.values().cloned().collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(all)
    }

    async fn list_active(
        &self,
        module: ReferenceModule,
        business_line_id: Option<Uuid>,
    ) -> Result<Vec<SlaTarget>> {
        let targets = self.targets.read().expect("target lock poisoned");
        let mut matched: Vec<SlaTarget> = targets
            .values()
            .filter(|t| {
                t.is_active && t.reference_module == module && t.applies_to(business_line_id)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(matched)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut targets = self.targets.write().expect("target lock poisoned");
        Ok(targets.remove(&id).is_some())
    }
}

#[async_trait::async_trait]
impl TimerStore for MemoryStore {
    async fn insert(&self, timer: SlaTimer) -> Result<SlaTimer> {
        let mut table = self.timers.write().expect("timer table lock poisoned");
        let pair = (timer.entity_id.clone(), timer.target_id);
        if table.by_pair.contains_key(&pair) {
            return Err(StoreError::DuplicateTimer {
                entity_id: timer.entity_id,
                target_id: timer.target_id,
            });
        }
        table.by_pair.insert(pair, timer.id);
        table.by_id.insert(timer.id, timer.clone());
        Ok(timer)
    }

    async fn get(&self, entity_id: &str, target_id: Uuid) -> Result<Option<SlaTimer>> {
        let table = self.timers.read().expect("timer table lock poisoned");
        let id = table.by_pair.get(&(entity_id.to_string(), target_id));
        Ok(id.and_then(|id| table.by_id.get(id)).cloned())
    }

    async fn list_for_entity(&self, entity_id: &str) -> Result<Vec<SlaTimer>> {
        let table = self.timers.read().expect("timer table lock poisoned");
        let mut timers: Vec<SlaTimer> = table
            .by_id
            .values()
            .filter(|t| t.entity_id == entity_id)
            .cloned()
            .collect();
        timers.sort_by(|a, b| a.target_key.cmp(&b.target_key));
        Ok(timers)
    }

    async fn list_running(&self, limit: usize) -> Result<Vec<SlaTimer>> {
        let table = self.timers.read().expect("timer table lock poisoned");
        let mut running: Vec<SlaTimer> = table
            .by_id
            .values()
            .filter(|t| t.status == TimerStatus::Running)
            .cloned()
            .collect();
        running.sort_by_key(|t| t.last_tick_at);
        running.truncate(limit);
        Ok(running)
    }

    async fn mark_met(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<SlaTimer>> {
        Ok(self.update_if(id, &[TimerStatus::Running], |t| {
            t.status = TimerStatus::Met;
            t.stopped_at = Some(at);
        }))
    }

    async fn mark_paused(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<SlaTimer>> {
        Ok(self.update_if(id, &[TimerStatus::Running], |t| {
            t.status = TimerStatus::Paused;
            t.paused_at = Some(at);
        }))
    }

    async fn mark_resumed(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<SlaTimer>> {
        Ok(self.update_if(id, &[TimerStatus::Paused], |t| {
            if let Some(paused_at) = t.paused_at {
                t.total_paused_ms += (at - paused_at).num_milliseconds().max(0);
            }
            t.status = TimerStatus::Running;
            t.paused_at = None;
            t.resumed_at = Some(at);
            t.last_tick_at = at;
        }))
    }

    async fn mark_stopped(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<SlaTimer>> {
        Ok(
            self.update_if(id, &[TimerStatus::Running, TimerStatus::Paused], |t| {
                t.status = TimerStatus::Stopped;
                t.stopped_at = Some(at);
            }),
        )
    }

    async fn advance(
        &self,
        id: Uuid,
        expected_tick: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<SlaTimer>> {
        let mut table = self.timers.write().expect("timer table lock poisoned");
        let timer = match table.by_id.get_mut(&id) {
            Some(t) => t,
            None => return Ok(None),
        };
        if timer.status != TimerStatus::Running || timer.last_tick_at != expected_tick {
            return Ok(None);
        }
        let elapsed = (now - timer.last_tick_at).num_milliseconds().max(0);
        timer.remaining_ms = (timer.remaining_ms - elapsed).max(0);
        timer.last_tick_at = now;
        Ok(Some(timer.clone()))
    }

    async fn mark_breached(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<SlaTimer>> {
        Ok(self.update_if(id, &[TimerStatus::Running], |t| {
            t.status = TimerStatus::Breached;
            t.breached_at = Some(at);
            t.remaining_ms = 0;
        }))
    }
}
