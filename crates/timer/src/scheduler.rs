//! Periodic timer scheduler and breach detector.
//!
//! An independent loop on a fixed wake interval, decoupled from request
//! handling. Each tick claims a bounded batch of `Running` timers,
//! advances their countdowns, and flips expired ones to `Breached`. The
//! fixed interval plus batch cap bounds per-tick work; worst-case breach
//! detection latency is one interval plus processing time.
//!
//! Every advance is a conditional update keyed on the observed
//! `last_tick_at`, so a second scheduler instance cannot double-decrement
//! a timer; and the breach flip is a conditional update on `Running`, so
//! exactly one breach notification is emitted per breach.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use casewatch_core::SlaTimer;
use casewatch_notify::{BreachNotification, Dispatcher};

use crate::store::TimerStore;

/// Default wake interval between ticks.
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);
/// Default cap on timers advanced per tick.
const DEFAULT_BATCH_SIZE: usize = 200;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    pub batch_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Counters from a single scheduler tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    /// Running timers selected this tick.
    pub examined: usize,
    /// Timers advanced without expiring.
    pub advanced: usize,
    /// Timers flipped to `Breached` (one notification each).
    pub breached: usize,
    /// Per-timer failures, contained and logged.
    pub errors: usize,
}

/// Advances `Running` timers and converts expiry into breach
/// notifications. Only `Running` timers are touched; `Paused` timers are
/// inert until resumed.
pub struct TimerScheduler {
    timers: Arc<dyn TimerStore>,
    dispatcher: Arc<Dispatcher>,
    config: SchedulerConfig,
}

impl TimerScheduler {
    pub fn new(
        timers: Arc<dyn TimerStore>,
        dispatcher: Arc<Dispatcher>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            timers,
            dispatcher,
            config,
        }
    }

    /// Main scheduler loop. Spawned as a tokio task; one instance per
    /// deployment is the supported topology.
    pub async fn run(self: Arc<Self>, shutdown: Arc<AtomicBool>) {
        info!(
            interval_secs = self.config.tick_interval.as_secs(),
            batch_size = self.config.batch_size,
            "SLA scheduler started"
        );
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if shutdown.load(Ordering::Relaxed) {
                info!("SLA scheduler stopped");
                break;
            }

            let summary = self.tick(Utc::now()).await;
            if summary.breached > 0 || summary.errors > 0 {
                info!(
                    examined = summary.examined,
                    advanced = summary.advanced,
                    breached = summary.breached,
                    errors = summary.errors,
                    "scheduler tick"
                );
            } else {
                debug!(examined = summary.examined, "scheduler tick");
            }
        }
    }

    /// One sweep over running timers at the given instant.
    ///
    /// Public with an explicit `now` for deterministic tests and replay;
    /// the loop passes wall-clock time.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickSummary {
        let mut summary = TickSummary::default();

        let batch = match self.timers.list_running(self.config.batch_size).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "failed to load running timers, skipping tick");
                summary.errors += 1;
                return summary;
            }
        };

        for timer in batch {
            summary.examined += 1;
            self.advance_one(&timer, now, &mut summary).await;
        }

        summary
    }

    /// Advance a single timer; a failure here must not abort the batch.
    async fn advance_one(&self, timer: &SlaTimer, now: DateTime<Utc>, summary: &mut TickSummary) {
        let updated = match self.timers.advance(timer.id, timer.last_tick_at, now).await {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                // Claimed by a concurrent scheduler, or no longer running.
                debug!(timer_id = %timer.id, "advance lost the claim, skipping");
                return;
            }
            Err(e) => {
                warn!(timer_id = %timer.id, entity_id = %timer.entity_id, error = %e, "failed to advance timer");
                summary.errors += 1;
                return;
            }
        };

        if updated.remaining_ms > 0 {
            summary.advanced += 1;
            return;
        }

        match self.timers.mark_breached(updated.id, now).await {
            Ok(Some(breached)) => {
                summary.breached += 1;
                let notification = BreachNotification {
                    entity_id: breached.entity_id.clone(),
                    target_key: breached.target_key.clone(),
                    goal_ms: breached.goal_ms,
                    breached_at: breached.breached_at.unwrap_or(now),
                };
                warn!(
                    entity_id = %breached.entity_id,
                    target_key = %breached.target_key,
                    goal_ms = breached.goal_ms,
                    "SLA timer breached"
                );
                self.dispatcher.dispatch(&notification).await;
            }
            Ok(None) => {
                // Another writer flipped it first; it owns the notification.
                debug!(timer_id = %updated.id, "breach already recorded elsewhere");
            }
            Err(e) => {
                warn!(timer_id = %updated.id, error = %e, "failed to mark timer breached");
                summary.errors += 1;
            }
        }
    }
}
