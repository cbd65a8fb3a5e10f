//! Login, public registration and logout.

use std::time::Duration;

use axum::extract::State;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::error::ApiError;
use super::middleware::BearerToken;
use super::{message, AppState};
use crate::auth::{blacklist_key, password, Claims};
use crate::store::{deadline, Store as _};
use crate::util::unix_now;

const USER_READ_DEADLINE: Duration = Duration::from_secs(3);
const LOGOUT_WRITE_DEADLINE: Duration = Duration::from_secs(5);

pub(super) fn user_key(username: &str) -> String {
    format!("users/{username}")
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

/// Stored bcrypt hash for a username, if the user exists.
pub(super) async fn stored_hash(
    state: &AppState,
    username: &str,
) -> Result<Option<String>, ApiError> {
    let raw = deadline(USER_READ_DEADLINE, state.store.get(&user_key(username)))
        .await
        .map_err(|_| ApiError::Internal("Failed to read from store".to_string()))?;
    Ok(raw.map(|v| String::from_utf8_lossy(&v).into_owned()))
}

/// `POST /api/login`
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<Value>, ApiError> {
    let Some(hash) = stored_hash(&state, &req.username).await? else {
        return Err(ApiError::Unauthorized("User not found".to_string()));
    };

    let valid = password::verify_password(&req.password, &hash)
        .map_err(|_| ApiError::Unauthorized("Invalid credentials".to_string()))?;
    if !valid {
        warn!(username = %req.username, "Failed login attempt");
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let token = state
        .jwt
        .issue(&req.username)
        .map_err(|_| ApiError::Internal("Failed to generate token".to_string()))?;

    info!(username = %req.username, "User logged in");
    Ok(Json(json!({ "token": token })))
}

/// `POST /api/register` - public account creation, 409 when taken.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Username and password are required".to_string(),
        ));
    }

    if stored_hash(&state, &req.username).await?.is_some() {
        return Err(ApiError::Conflict("Username already exists".to_string()));
    }

    let hash = password::hash_password(&req.password)
        .map_err(|_| ApiError::Internal("Failed to hash password".to_string()))?;
    state
        .store
        .put(&user_key(&req.username), hash.into_bytes(), None)
        .await?;

    info!(username = %req.username, "User registered");
    Ok(message("User registered successfully"))
}

/// `POST /api/logout` - revoke the presented token for its remaining
/// lifetime; the store's lease removes the entry when the token would
/// have expired anyway.
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Result<Json<Value>, ApiError> {
    let ttl = claims.exp - unix_now();
    if ttl > 0 {
        let key = blacklist_key(&token);
        deadline(LOGOUT_WRITE_DEADLINE, async {
            let lease = state.store.grant_lease(ttl).await?;
            state.store.put(&key, b"revoked".to_vec(), Some(lease)).await
        })
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to add token to blacklist");
            ApiError::Internal("Failed to logout".to_string())
        })?;
    }

    info!(username = %claims.username, "User logged out");
    Ok(message("Logged out successfully"))
}
