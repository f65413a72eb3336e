//! Timer Lifecycle Service.
//!
//! Creates timers at entity-creation time and reacts to inbound domain
//! events with at most one state transition per event per target. An SLA
//! clock starts once, at entity creation, or not at all: events never
//! create timers reactively.
//!
//! Both entry points run inline with the request that triggered them and
//! are deliberately non-fatal — incomplete SLA configuration must never
//! make an entity uncreatable.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use casewatch_core::{DomainEvent, MonitoredEntity, SlaTimer, TriggerAction};
use casewatch_rules::evaluator::find_matching_triggers;

use crate::store::{StoreError, TargetStore, TimerStore};

/// Outcome of [`TimerLifecycle::init_for_entity`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InitOutcome {
    /// Targets considered for this entity.
    pub processed: usize,
    /// Timers created.
    pub started: usize,
    /// Targets skipped: existing timer, or no start trigger matched.
    pub skipped: usize,
    /// Per-target failures, contained and logged.
    pub errors: usize,
}

/// Outcome of [`TimerLifecycle::process_event`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventOutcome {
    /// Targets with an existing timer for the event's entity.
    pub processed: usize,
    /// Transitions actually applied.
    pub transitioned: usize,
    /// Per-target failures, contained and logged.
    pub errors: usize,
}

/// Consumes the rule evaluator plus target/timer storage to drive the
/// timer state machine.
pub struct TimerLifecycle {
    targets: Arc<dyn TargetStore>,
    timers: Arc<dyn TimerStore>,
}

impl TimerLifecycle {
    pub fn new(targets: Arc<dyn TargetStore>, timers: Arc<dyn TimerStore>) -> Self {
        Self { targets, timers }
    }

    /// Start timers for a freshly created entity.
    ///
    /// For each active target scoped to the entity's module and business
    /// line that does not already have a timer, evaluates the target's
    /// start triggers against the module's creation event; any match
    /// creates a `Running` timer with the full goal remaining.
    ///
    /// Idempotent: calling again never resets or recreates an existing
    /// timer.
    pub async fn init_for_entity(&self, entity: &MonitoredEntity) -> InitOutcome {
        let mut outcome = InitOutcome::default();

        let targets = match self
            .targets
            .list_active(entity.module, entity.business_line_id)
            .await
        {
            Ok(targets) => targets,
            Err(e) => {
                warn!(entity_id = %entity.id, error = %e, "failed to load SLA targets, skipping timer init");
                outcome.errors += 1;
                return outcome;
            }
        };
        if targets.is_empty() {
            warn!(
                entity_id = %entity.id,
                module = %entity.module,
                "no active SLA targets for entity, nothing to start"
            );
            return outcome;
        }

        let event_name = entity.module.creation_event();

        for target in targets {
            outcome.processed += 1;

            match self.timers.get(&entity.id, target.id).await {
                Ok(Some(_)) => {
                    debug!(
                        entity_id = %entity.id,
                        target_key = %target.key,
                        "timer already exists, init is idempotent"
                    );
                    outcome.skipped += 1;
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(entity_id = %entity.id, target_key = %target.key, error = %e, "timer lookup failed");
                    outcome.errors += 1;
                    continue;
                }
            }

            let matches =
                find_matching_triggers(&target.rules, event_name, &entity.payload, TriggerAction::Start);
            if matches.is_empty() {
                outcome.skipped += 1;
                continue;
            }

            let timer = SlaTimer::start(&entity.id, &target, Utc::now());
            match self.timers.insert(timer).await {
                Ok(created) => {
                    info!(
                        entity_id = %entity.id,
                        target_key = %target.key,
                        goal_ms = created.goal_ms,
                        "SLA timer started"
                    );
                    outcome.started += 1;
                }
                Err(StoreError::DuplicateTimer { .. }) => {
                    // Lost a creation race; the other writer's timer stands.
                    debug!(entity_id = %entity.id, target_key = %target.key, "timer created concurrently");
                    outcome.skipped += 1;
                }
                Err(e) => {
                    warn!(entity_id = %entity.id, target_key = %target.key, error = %e, "failed to create timer");
                    outcome.errors += 1;
                }
            }
        }

        outcome
    }

    /// React to an inbound domain event.
    ///
    /// Only targets with an existing timer participate; a missing timer is
    /// a silent no-op. Trigger categories are evaluated in priority order
    /// stop > pause > resume, and the first category with a match wins:
    /// at most one transition per event per target. The transition is
    /// applied as a conditional update keyed on its legal prior status, so
    /// an inapplicable match (stop on a paused timer, pause on paused)
    /// degrades to a logged no-op.
    pub async fn process_event(&self, event: &DomainEvent) -> EventOutcome {
        let mut outcome = EventOutcome::default();

        let targets = match self
            .targets
            .list_active(event.module, event.business_line_id)
            .await
        {
            Ok(targets) => targets,
            Err(e) => {
                warn!(event = %event.name, entity_id = %event.entity_id, error = %e, "failed to load SLA targets, ignoring event");
                outcome.errors += 1;
                return outcome;
            }
        };
        if targets.is_empty() {
            warn!(
                event = %event.name,
                entity_id = %event.entity_id,
                "no active SLA targets in scope, ignoring event"
            );
            return outcome;
        }

        for target in targets {
            let timer = match self.timers.get(&event.entity_id, target.id).await {
                Ok(Some(timer)) => timer,
                // Timers are never created reactively.
                Ok(None) => continue,
                Err(e) => {
                    warn!(entity_id = %event.entity_id, target_key = %target.key, error = %e, "timer lookup failed");
                    outcome.errors += 1;
                    continue;
                }
            };
            outcome.processed += 1;

            if timer.status.is_terminal() {
                continue;
            }

            let matched = [TriggerAction::Stop, TriggerAction::Pause, TriggerAction::Resume]
                .into_iter()
                .find(|&action| {
                    !find_matching_triggers(&target.rules, &event.name, &event.payload, action)
                        .is_empty()
                });
            let Some(action) = matched else { continue };

            let now = Utc::now();
            let result = match action {
                TriggerAction::Stop => self.timers.mark_met(timer.id, now).await,
                TriggerAction::Pause => self.timers.mark_paused(timer.id, now).await,
                TriggerAction::Resume => self.timers.mark_resumed(timer.id, now).await,
                // Start triggers are only honored at entity creation.
                TriggerAction::Start => Ok(None),
            };

            match result {
                Ok(Some(updated)) => {
                    info!(
                        entity_id = %event.entity_id,
                        target_key = %updated.target_key,
                        event = %event.name,
                        status = %updated.status,
                        "SLA timer transition"
                    );
                    outcome.transitioned += 1;
                }
                Ok(None) => {
                    debug!(
                        entity_id = %event.entity_id,
                        target_key = %target.key,
                        event = %event.name,
                        "transition not applicable for current timer status"
                    );
                }
                Err(e) => {
                    warn!(entity_id = %event.entity_id, target_key = %target.key, error = %e, "timer transition failed");
                    outcome.errors += 1;
                }
            }
        }

        outcome
    }

    /// Administrative cancel: move every live timer for the entity to
    /// `Stopped`. Returns the number of timers cancelled.
    pub async fn cancel_for_entity(&self, entity_id: &str) -> usize {
        let timers = match self.timers.list_for_entity(entity_id).await {
            Ok(timers) => timers,
            Err(e) => {
                warn!(entity_id = %entity_id, error = %e, "failed to list timers for cancel");
                return 0;
            }
        };

        let now = Utc::now();
        let mut cancelled = 0;
        for timer in timers {
            if timer.status.is_terminal() {
                continue;
            }
            match self.timers.mark_stopped(timer.id, now).await {
                Ok(Some(_)) => cancelled += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!(entity_id = %entity_id, target_key = %timer.target_key, error = %e, "failed to cancel timer");
                }
            }
        }

        if cancelled > 0 {
            info!(entity_id = %entity_id, cancelled, "cancelled SLA timers");
        }
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use casewatch_core::{ReferenceModule, SlaTarget, TimerStatus};
    use serde_json::json;
    use uuid::Uuid;

    fn respond_target() -> SlaTarget {
        SlaTarget::new(
            "respond",
            "First response",
            14_400_000,
            ReferenceModule::Case,
            None,
            serde_json::from_value(json!({
                "start_triggers": [{"event": "case.created", "action": "start"}],
                "stop_triggers": [{"event": "case.status.changed", "action": "stop",
                    "conditions": [{"field": "to", "operator": "equals", "value": "Resolved"}]}],
                "pause_triggers": [{"event": "case.status.changed", "action": "pause",
                    "conditions": [{"field": "to", "operator": "equals", "value": "OnHold"}]}],
                "resume_triggers": [{"event": "case.status.changed", "action": "resume",
                    "conditions": [{"field": "to", "operator": "equals", "value": "InProgress"}]}]
            }))
            .unwrap(),
        )
    }

    fn entity(id: &str) -> MonitoredEntity {
        MonitoredEntity {
            id: id.to_string(),
            module: ReferenceModule::Case,
            business_line_id: None,
            payload: json!({"subject": "printer on fire"}),
        }
    }

    fn status_changed(entity_id: &str, to: &str) -> DomainEvent {
        DomainEvent {
            name: "case.status.changed".to_string(),
            entity_id: entity_id.to_string(),
            module: ReferenceModule::Case,
            business_line_id: None,
            payload: json!({"to": to}),
        }
    }

    async fn setup() -> (Arc<MemoryStore>, TimerLifecycle) {
        let store = Arc::new(MemoryStore::new());
        TargetStore::insert(store.as_ref(), respond_target())
            .await
            .unwrap();
        let lifecycle = TimerLifecycle::new(store.clone(), store.clone());
        (store, lifecycle)
    }

    #[tokio::test]
    async fn init_starts_matching_timers() {
        let (store, lifecycle) = setup().await;
        let outcome = lifecycle.init_for_entity(&entity("C-1")).await;
        assert_eq!(outcome.started, 1);
        assert_eq!(outcome.errors, 0);

        let timers = store.list_for_entity("C-1").await.unwrap();
        assert_eq!(timers.len(), 1);
        assert_eq!(timers[0].status, TimerStatus::Running);
        assert_eq!(timers[0].remaining_ms, 14_400_000);
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let (store, lifecycle) = setup().await;
        lifecycle.init_for_entity(&entity("C-1")).await;

        let before = store.list_for_entity("C-1").await.unwrap();
        let again = lifecycle.init_for_entity(&entity("C-1")).await;
        assert_eq!(again.started, 0);
        assert_eq!(again.skipped, 1);

        let after = store.list_for_entity("C-1").await.unwrap();
        assert_eq!(after[0].id, before[0].id);
        assert_eq!(after[0].remaining_ms, before[0].remaining_ms);
        assert_eq!(after[0].started_at, before[0].started_at);
    }

    #[tokio::test]
    async fn init_with_no_targets_is_a_noop() {
        let store = Arc::new(MemoryStore::new());
        let lifecycle = TimerLifecycle::new(store.clone(), store.clone());
        let outcome = lifecycle.init_for_entity(&entity("C-1")).await;
        assert_eq!(outcome, InitOutcome::default());
    }

    #[tokio::test]
    async fn init_honors_start_conditions() {
        let store = Arc::new(MemoryStore::new());
        let mut target = respond_target();
        target.rules.start_triggers[0].conditions = vec![serde_json::from_value(
            json!({"field": "priority", "operator": "equals", "value": "high"}),
        )
        .unwrap()];
        TargetStore::insert(store.as_ref(), target).await.unwrap();
        let lifecycle = TimerLifecycle::new(store.clone(), store.clone());

        // Payload without the required priority: no timer.
        let outcome = lifecycle.init_for_entity(&entity("C-1")).await;
        assert_eq!(outcome.started, 0);
        assert_eq!(outcome.skipped, 1);

        let mut high = entity("C-2");
        high.payload = json!({"priority": "high"});
        let outcome = lifecycle.init_for_entity(&high).await;
        assert_eq!(outcome.started, 1);
    }

    #[tokio::test]
    async fn event_without_timer_is_silently_ignored() {
        let (_store, lifecycle) = setup().await;
        let outcome = lifecycle.process_event(&status_changed("C-404", "Resolved")).await;
        assert_eq!(outcome.processed, 0);
        assert_eq!(outcome.transitioned, 0);
        assert_eq!(outcome.errors, 0);
    }

    #[tokio::test]
    async fn events_never_create_timers() {
        let (store, lifecycle) = setup().await;
        lifecycle.process_event(&status_changed("C-1", "Resolved")).await;
        assert!(store.list_for_entity("C-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stop_trigger_moves_running_to_met() {
        let (store, lifecycle) = setup().await;
        lifecycle.init_for_entity(&entity("C-1")).await;

        let outcome = lifecycle.process_event(&status_changed("C-1", "Resolved")).await;
        assert_eq!(outcome.transitioned, 1);

        let timer = &store.list_for_entity("C-1").await.unwrap()[0];
        assert_eq!(timer.status, TimerStatus::Met);
        assert!(timer.stopped_at.is_some());
    }

    #[tokio::test]
    async fn stop_wins_over_pause_when_both_match() {
        let store = Arc::new(MemoryStore::new());
        let mut target = respond_target();
        // Make the pause trigger match the same Resolved event as stop.
        target.rules.pause_triggers[0].conditions = vec![serde_json::from_value(
            json!({"field": "to", "operator": "equals", "value": "Resolved"}),
        )
        .unwrap()];
        TargetStore::insert(store.as_ref(), target).await.unwrap();
        let lifecycle = TimerLifecycle::new(store.clone(), store.clone());

        lifecycle.init_for_entity(&entity("C-1")).await;
        lifecycle.process_event(&status_changed("C-1", "Resolved")).await;

        let timer = &store.list_for_entity("C-1").await.unwrap()[0];
        assert_eq!(timer.status, TimerStatus::Met);
    }

    #[tokio::test]
    async fn pause_while_paused_is_a_noop() {
        let (store, lifecycle) = setup().await;
        lifecycle.init_for_entity(&entity("C-1")).await;

        let first = lifecycle.process_event(&status_changed("C-1", "OnHold")).await;
        assert_eq!(first.transitioned, 1);
        let paused = store.list_for_entity("C-1").await.unwrap()[0].clone();

        let second = lifecycle.process_event(&status_changed("C-1", "OnHold")).await;
        assert_eq!(second.transitioned, 0);
        let still_paused = &store.list_for_entity("C-1").await.unwrap()[0];
        assert_eq!(still_paused.status, TimerStatus::Paused);
        assert_eq!(still_paused.paused_at, paused.paused_at);
    }

    #[tokio::test]
    async fn terminal_timers_accept_no_further_transitions() {
        let (store, lifecycle) = setup().await;
        lifecycle.init_for_entity(&entity("C-1")).await;
        lifecycle.process_event(&status_changed("C-1", "Resolved")).await;
        let met = store.list_for_entity("C-1").await.unwrap()[0].clone();

        let outcome = lifecycle.process_event(&status_changed("C-1", "OnHold")).await;
        assert_eq!(outcome.transitioned, 0);

        let unchanged = &store.list_for_entity("C-1").await.unwrap()[0];
        assert_eq!(unchanged.status, TimerStatus::Met);
        assert_eq!(unchanged.stopped_at, met.stopped_at);
    }

    #[tokio::test]
    async fn scoped_targets_do_not_fire_for_other_lines() {
        let store = Arc::new(MemoryStore::new());
        let mut target = respond_target();
        target.business_line_id = Some(Uuid::new_v4());
        TargetStore::insert(store.as_ref(), target).await.unwrap();
        let lifecycle = TimerLifecycle::new(store.clone(), store.clone());

        // Entity in no business line: scoped target out of scope.
        let outcome = lifecycle.init_for_entity(&entity("C-1")).await;
        assert_eq!(outcome.processed, 0);
        assert_eq!(outcome.started, 0);
    }

    #[tokio::test]
    async fn cancel_stops_live_timers_only() {
        let (store, lifecycle) = setup().await;
        lifecycle.init_for_entity(&entity("C-1")).await;

        assert_eq!(lifecycle.cancel_for_entity("C-1").await, 1);
        let timer = &store.list_for_entity("C-1").await.unwrap()[0];
        assert_eq!(timer.status, TimerStatus::Stopped);
        assert!(timer.stopped_at.is_some());

        // Second cancel finds nothing live.
        assert_eq!(lifecycle.cancel_for_entity("C-1").await, 0);
    }
}
