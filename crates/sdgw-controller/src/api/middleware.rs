//! Bearer-token auth middleware and the security-header layer.

use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::error;

use super::error::ApiError;
use super::AppState;
use crate::auth::blacklist_key;
use crate::store::{deadline, Store as _};

const BLACKLIST_READ_DEADLINE: Duration = Duration::from_secs(2);

/// Raw bearer token, kept in request extensions for handlers that need it
/// (logout revokes the exact presented token).
#[derive(Clone)]
pub struct BearerToken(pub String);

/// Reject the request unless it carries a valid, unrevoked bearer token.
/// A store failure during the revocation check fails closed.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;
    let token = header_value
        .strip_prefix("Bearer ")
        .unwrap_or(header_value)
        .to_string();

    let claims = state
        .jwt
        .validate(&token)
        .map_err(|_| ApiError::Unauthorized("Invalid token".to_string()))?;

    let revoked = deadline(
        BLACKLIST_READ_DEADLINE,
        state.store.get(&blacklist_key(&token)),
    )
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to check token blacklist");
        ApiError::Internal("Authentication service unavailable".to_string())
    })?;
    if revoked.is_some() {
        return Err(ApiError::Unauthorized("Token has been revoked".to_string()));
    }

    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(BearerToken(token));
    Ok(next.run(req).await)
}

/// Strict security headers on every response.
pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    );
    resp
}
