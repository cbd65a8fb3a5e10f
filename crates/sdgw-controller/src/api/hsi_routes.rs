//! HSI configuration CRUD and PPPoE command endpoints.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::{message, AppState};
use crate::auth::Claims;
use crate::hsi::{HsiConfig, HsiRecord};

/// `GET /api/config/{nodeId}/hsi/users`
pub async fn list_hsi_user_ids(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user_ids = state.hsi.list_user_ids(&node_id).await?;
    Ok(Json(json!({ "user_ids": user_ids })))
}

/// `GET /api/config/{nodeId}/hsi/{userId}`
pub async fn get_hsi_config(
    State(state): State<AppState>,
    Path((node_id, user_id)): Path<(String, String)>,
) -> Result<Json<HsiRecord>, ApiError> {
    Ok(Json(state.hsi.get(&node_id, &user_id).await?))
}

/// `POST /api/config/{nodeId}/hsi`
pub async fn create_hsi_config(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(config): Json<HsiConfig>,
) -> Result<Json<Value>, ApiError> {
    state.hsi.create(&node_id, config, &claims.username).await?;
    Ok(message("HSI config created successfully"))
}

/// `PUT /api/config/{nodeId}/hsi/{userId}`
pub async fn update_hsi_config(
    State(state): State<AppState>,
    Path((node_id, user_id)): Path<(String, String)>,
    Extension(claims): Extension<Claims>,
    Json(config): Json<HsiConfig>,
) -> Result<Json<Value>, ApiError> {
    state
        .hsi
        .update(&node_id, &user_id, config, &claims.username)
        .await?;
    Ok(message("HSI config updated successfully"))
}

/// `DELETE /api/config/{nodeId}/hsi/{userId}`
pub async fn delete_hsi_config(
    State(state): State<AppState>,
    Path((node_id, user_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    state.hsi.delete(&node_id, &user_id).await?;
    Ok(message("HSI config deleted successfully"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PppoeActionRequest {
    pub node_id: String,
    pub user_id: String,
}

fn require_ids(req: &PppoeActionRequest) -> Result<(), ApiError> {
    if req.node_id.is_empty() || req.user_id.is_empty() {
        return Err(ApiError::BadRequest(
            "Node ID and User ID are required".to_string(),
        ));
    }
    Ok(())
}

/// `POST /api/pppoe/dial`
pub async fn dial_pppoe(
    State(state): State<AppState>,
    Json(req): Json<PppoeActionRequest>,
) -> Result<Json<Value>, ApiError> {
    require_ids(&req)?;
    state.commands.dial(&req.node_id, &req.user_id).await?;
    Ok(message("PPPoE dial command sent successfully"))
}

/// `POST /api/pppoe/hangup`
pub async fn hangup_pppoe(
    State(state): State<AppState>,
    Json(req): Json<PppoeActionRequest>,
) -> Result<Json<Value>, ApiError> {
    require_ids(&req)?;
    state.commands.hangup(&req.node_id, &req.user_id).await?;
    Ok(message("PPPoE hangup command sent successfully"))
}
