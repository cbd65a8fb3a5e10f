//! Node listing, unregistration and subscriber-count administration.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::ApiError;
use super::{message, AppState};
use crate::auth::Claims;

#[derive(Debug, Serialize)]
pub struct NodeEntry {
    pub key: String,
    pub value: String,
}

/// `GET /api/nodes` - raw key/value pairs of every registered node.
pub async fn list_nodes(State(state): State<AppState>) -> Result<Json<Vec<NodeEntry>>, ApiError> {
    let pairs = state.registry.list().await?;
    Ok(Json(
        pairs
            .into_iter()
            .map(|pair| NodeEntry {
                key: pair.key,
                value: String::from_utf8_lossy(&pair.value).into_owned(),
            })
            .collect(),
    ))
}

/// `DELETE /api/nodes/{uuid}` - equivalent to the gRPC unregister: stops
/// monitoring, then deletes the record.
pub async fn unregister_node(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.registry.unregister(&uuid).await?;
    Ok(message("Node unregistered successfully"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateSubscriberCount {
    pub subscriber_count: i64,
}

/// `GET /api/nodes/{uuid}/subscriber-count`
pub async fn get_subscriber_count(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let count = state.counts.get(&node_id).await?;
    Ok(Json(json!({
        "node_id": node_id,
        "subscriber_count": count,
    })))
}

/// `PUT /api/nodes/{uuid}/subscriber-count`
pub async fn update_subscriber_count(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateSubscriberCount>,
) -> Result<Json<Value>, ApiError> {
    state
        .counts
        .put(&node_id, req.subscriber_count, &claims.username)
        .await?;
    Ok(Json(json!({
        "message": "Subscriber count updated successfully",
        "node_id": node_id,
        "subscriber_count": req.subscriber_count,
    })))
}
