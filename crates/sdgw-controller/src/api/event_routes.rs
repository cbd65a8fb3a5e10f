//! Failed-event history read endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::AppState;
use crate::events;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FailedEventsQuery {
    pub event_type: Option<String>,
}

/// `GET /api/failed-events?event_type=...`
pub async fn all_failed_events(
    State(state): State<AppState>,
    Query(query): Query<FailedEventsQuery>,
) -> Result<Json<Value>, ApiError> {
    let events = events::read_history(state.store.as_ref(), None, query.event_type.as_deref())
        .await
        .map_err(|_| ApiError::Internal("Failed to get failed events".to_string()))?;
    Ok(Json(json!({ "events": events })))
}

/// `GET /api/failed-events/{nodeId}`
pub async fn node_failed_events(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let events = events::read_history(state.store.as_ref(), Some(&node_id), None)
        .await
        .map_err(|_| ApiError::Internal("Failed to get failed events".to_string()))?;
    Ok(Json(json!({ "events": events })))
}
