use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use conduit_core::ids;
use conduit_llm::adapters::openai::ModelList;
use conduit_observability::run_checks;

use crate::state::AppState;

/// `GET /v1/models`
pub async fn models(State(state): State<AppState>) -> Json<ModelList> {
    Json(ModelList::new(state.server.models.iter().cloned(), ids::unix_timestamp()))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Response {
    let report = run_checks("conduit", state.started_at, state.health_checks()).await;
    (report.status.to_status_code(), Json(report)).into_response()
}

/// `GET /metrics`, Prometheus text format
pub async fn metrics(State(state): State<AppState>) -> Response {
    if !state.metrics.is_installed() {
        return (StatusCode::NOT_FOUND, "metrics are disabled").into_response();
    }
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
        .into_response()
}
