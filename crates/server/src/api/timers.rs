//! Timer introspection and administrative cancel.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::warn;

use casewatch_core::SlaTimer;

use crate::state::AppState;

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct CancelResult {
    pub cancelled: usize,
}

/// List all timers (live and historical) for an entity.
#[utoipa::path(
    get,
    path = "/timers/{entity_id}",
    tag = "Timers",
    params(
        ("entity_id" = String, Path, description = "Monitored entity id")
    ),
    responses(
        (status = 200, description = "Timers for the entity", body = Object)
    )
)]
pub(crate) async fn list_timers(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> Result<Json<Vec<SlaTimer>>, StatusCode> {
    match state.timers.list_for_entity(&entity_id).await {
        Ok(timers) => Ok(Json(timers)),
        Err(e) => {
            warn!(entity_id = %entity_id, error = %e, "failed to list timers");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Administrative cancel: stop every live timer for an entity (e.g. when
/// a case is deleted or merged). Timer rows are kept.
#[utoipa::path(
    delete,
    path = "/timers/{entity_id}",
    tag = "Timers",
    params(
        ("entity_id" = String, Path, description = "Monitored entity id")
    ),
    responses(
        (status = 200, description = "Number of timers cancelled", body = CancelResult)
    )
)]
pub(crate) async fn cancel_timers(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> Json<CancelResult> {
    let cancelled = state.lifecycle.cancel_for_entity(&entity_id).await;
    Json(CancelResult { cancelled })
}
