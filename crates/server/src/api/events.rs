//! Inbound ingest endpoints: entity creation and domain events.
//!
//! Both run the lifecycle service inline and always answer 200 with an
//! outcome summary — incomplete SLA configuration must never fail the
//! producing system's request.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use casewatch_core::{DomainEvent, MonitoredEntity};
use casewatch_timer::{EventOutcome, InitOutcome};

use crate::state::AppState;

/// Register a freshly created entity and start matching SLA timers.
#[utoipa::path(
    post,
    path = "/entities",
    tag = "Ingest",
    request_body = Object,
    responses(
        (status = 200, description = "Init outcome counters", body = Object)
    )
)]
pub(crate) async fn create_entity(
    State(state): State<Arc<AppState>>,
    Json(entity): Json<MonitoredEntity>,
) -> Json<InitOutcome> {
    Json(state.lifecycle.init_for_entity(&entity).await)
}

/// Ingest a domain event and apply timer transitions.
#[utoipa::path(
    post,
    path = "/events",
    tag = "Ingest",
    request_body = Object,
    responses(
        (status = 200, description = "Event outcome counters", body = Object)
    )
)]
pub(crate) async fn ingest_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<DomainEvent>,
) -> Json<EventOutcome> {
    Json(state.lifecycle.process_event(&event).await)
}
