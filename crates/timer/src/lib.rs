//! SLA timer lifecycle and breach detection.
//!
//! This crate provides:
//! - `TargetStore`/`TimerStore` traits with in-memory and PostgreSQL
//!   implementations; all timer transitions are conditional updates
//! - `TimerLifecycle`: creates timers at entity creation and reacts to
//!   inbound domain events
//! - `TimerScheduler`: periodic sweep that advances running timers and
//!   turns expiry into breach notifications

pub mod lifecycle;
pub mod scheduler;
pub mod store;

pub use lifecycle::{EventOutcome, InitOutcome, TimerLifecycle};
pub use scheduler::{SchedulerConfig, TickSummary, TimerScheduler};
pub use store::{MemoryStore, PgStore, StoreError, TargetStore, TimerStore};
