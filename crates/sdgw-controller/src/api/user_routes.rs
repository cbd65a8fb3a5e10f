//! User administration for operators.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use super::auth_routes::{user_key, CredentialsRequest};
use super::error::ApiError;
use super::{message, AppState};
use crate::auth::password;
use crate::store::{KeyOrder, Store as _};

/// `GET /api/users` - every registered username.
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let pairs = state.store.get_prefix("users/", KeyOrder::Ascend).await?;
    let users: Vec<String> = pairs
        .into_iter()
        .filter_map(|pair| {
            pair.key
                .strip_prefix("users/")
                .map(|username| username.to_string())
        })
        .collect();
    Ok(Json(json!({ "users": users })))
}

/// `POST /api/users` - upsert a user with a freshly hashed password.
pub async fn add_user(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<Value>, ApiError> {
    let hash = password::hash_password(&req.password)
        .map_err(|_| ApiError::Internal("Failed to hash password".to_string()))?;
    state
        .store
        .put(&user_key(&req.username), hash.into_bytes(), None)
        .await?;
    Ok(message("User created"))
}

/// `DELETE /api/users/{username}`
pub async fn delete_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.store.delete(&user_key(&username)).await?;
    Ok(message("User deleted"))
}
