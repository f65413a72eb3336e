//! CRUD endpoints for SLA targets: list, create, get, delete.
//!
//! Definitions are validated before they are stored; rules are persisted
//! as data, never as executable code.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::warn;
use uuid::Uuid;

use casewatch_core::SlaTarget;
use casewatch_rules::loader::TargetDefinition;
use casewatch_rules::validation::validate_target;
use casewatch_timer::StoreError;

use crate::state::AppState;

/// Lightweight summary returned by the list endpoint.
#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct TargetSummary {
    pub id: String,
    pub key: String,
    pub name: String,
    pub goal_ms: i64,
    pub reference_module: String,
    pub business_line_id: Option<String>,
    pub is_active: bool,
    pub trigger_count: usize,
}

impl From<&SlaTarget> for TargetSummary {
    fn from(target: &SlaTarget) -> Self {
        let rules = &target.rules;
        Self {
            id: target.id.to_string(),
            key: target.key.clone(),
            name: target.name.clone(),
            goal_ms: target.goal_ms,
            reference_module: target.reference_module.to_string(),
            business_line_id: target.business_line_id.map(|id| id.to_string()),
            is_active: target.is_active,
            trigger_count: rules.start_triggers.len()
                + rules.stop_triggers.len()
                + rules.pause_triggers.len()
                + rules.resume_triggers.len(),
        }
    }
}

/// List all SLA targets as lightweight summaries.
#[utoipa::path(
    get,
    path = "/targets",
    tag = "Targets",
    responses(
        (status = 200, description = "List of target summaries", body = Vec<TargetSummary>)
    )
)]
pub(crate) async fn list_targets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TargetSummary>>, (StatusCode, String)> {
    let targets = state.targets.list().await.map_err(internal)?;
    Ok(Json(targets.iter().map(TargetSummary::from).collect()))
}

/// Create a new SLA target from a JSON definition.
///
/// Returns 201 on success, 400 on validation error, 409 if the target key
/// already exists.
#[utoipa::path(
    post,
    path = "/targets",
    tag = "Targets",
    request_body = Object,
    responses(
        (status = 201, description = "Target created", body = Object),
        (status = 400, description = "Invalid definition", body = String),
        (status = 409, description = "Target key already exists", body = String)
    )
)]
pub(crate) async fn create_target(
    State(state): State<Arc<AppState>>,
    Json(definition): Json<TargetDefinition>,
) -> Result<(StatusCode, Json<SlaTarget>), (StatusCode, String)> {
    let target = definition.into_target();

    let validation = validate_target(&target);
    if !validation.valid {
        return Err((StatusCode::BAD_REQUEST, validation.error_summary()));
    }

    match state.targets.insert(target).await {
        Ok(created) => Ok((StatusCode::CREATED, Json(created))),
        Err(StoreError::DuplicateTargetKey(key)) => Err((
            StatusCode::CONFLICT,
            format!("Target with key '{}' already exists", key),
        )),
        Err(e) => {
            warn!(error = %e, "failed to create target");
            Err(internal(e))
        }
    }
}

/// Get a single SLA target by id.
#[utoipa::path(
    get,
    path = "/targets/{id}",
    tag = "Targets",
    params(
        ("id" = String, Path, description = "Target id")
    ),
    responses(
        (status = 200, description = "Target definition", body = Object),
        (status = 404, description = "Target not found")
    )
)]
pub(crate) async fn get_target(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SlaTarget>, StatusCode> {
    match state.targets.get(id).await {
        Ok(Some(target)) => Ok(Json(target)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            warn!(error = %e, "failed to load target");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Delete an SLA target by id. Existing timers for the target are kept as
/// historical records.
#[utoipa::path(
    delete,
    path = "/targets/{id}",
    tag = "Targets",
    params(
        ("id" = String, Path, description = "Target id")
    ),
    responses(
        (status = 204, description = "Target deleted"),
        (status = 404, description = "Target not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn delete_target(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    match state.targets.delete(id).await {
        Ok(true) => StatusCode::NO_CONTENT,
        Ok(false) => StatusCode::NOT_FOUND,
        Err(e) => {
            warn!(error = %e, "failed to delete target");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn internal(e: impl std::fmt::Display) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
