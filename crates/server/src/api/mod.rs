//! HTTP handlers, grouped by resource.

pub(crate) mod events;
pub(crate) mod health;
pub(crate) mod targets;
pub(crate) mod timers;
