//! HTTP router construction.
//!
//! Assembles all Axum routes, middleware, and OpenAPI docs into a single
//! `Router`.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::api;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health,
        api::targets::list_targets,
        api::targets::create_target,
        api::targets::get_target,
        api::targets::delete_target,
        api::events::create_entity,
        api::events::ingest_event,
        api::timers::list_timers,
        api::timers::cancel_timers,
    ),
    components(schemas(
        api::health::HealthResponse,
        api::targets::TargetSummary,
        api::timers::CancelResult,
    ))
)]
struct ApiDoc;

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = if state.config.server.cors_origin == "*" {
        CorsLayer::permissive()
    } else {
        match state.config.server.cors_origin.parse::<HeaderValue>() {
            Ok(origin) => CorsLayer::new().allow_origin(origin),
            Err(_) => CorsLayer::permissive(),
        }
    };

    Router::new()
        .route("/health", get(api::health::health))
        .route(
            "/targets",
            get(api::targets::list_targets).post(api::targets::create_target),
        )
        .route(
            "/targets/{id}",
            get(api::targets::get_target).delete(api::targets::delete_target),
        )
        .route("/entities", post(api::events::create_entity))
        .route("/events", post(api::events::ingest_event))
        .route(
            "/timers/{entity_id}",
            get(api::timers::list_timers).delete(api::timers::cancel_timers),
        )
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(cors)
        .with_state(state)
}
