// HTTP request handlers
use crate::application::scheduler::StatsSnapshot;
use crate::domain::report::Report;
use crate::presentation::app_state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Accept a station report for background ingestion.
///
/// The response only confirms queueing; ingestion outcomes are logged.
pub async fn submit_report(
    State(state): State<Arc<AppState>>,
    Json(report): Json<Report>,
) -> impl IntoResponse {
    match state.scheduler.submit(report) {
        Ok(token) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "received",
                "token": token.token,
                "accepted_at": token.accepted_at,
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "rejected",
                "reason": e.to_string(),
            })),
        ),
    }
}

/// Ingestion counters since startup
pub async fn ingestion_stats(State(state): State<Arc<AppState>>) -> Json<StatsSnapshot> {
    Json(state.scheduler.stats().snapshot())
}
