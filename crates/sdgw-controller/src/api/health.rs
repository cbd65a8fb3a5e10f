//! Liveness endpoint with a store-reachability probe.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::store::{deadline, Store as _};
use crate::util::unix_now;

const HEALTH_DEADLINE: Duration = Duration::from_secs(2);

/// `GET /api/health` - 200 when the store answers a point read within the
/// deadline, 503 otherwise.
pub async fn health_check(State(state): State<AppState>) -> Response {
    match deadline(HEALTH_DEADLINE, state.store.get("health-check")).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "timestamp": unix_now() })),
        )
            .into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "error": "store connection failed" })),
        )
            .into_response(),
    }
}
