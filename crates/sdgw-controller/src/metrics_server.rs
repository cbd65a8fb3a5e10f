//! Prometheus text exposition endpoint.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::error;

/// Router serving `/metrics` from the shared registry.
pub fn build_router(registry: Registry) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(registry)
}

async fn render_metrics(State(registry): State<Registry>) -> Response {
    let families = registry.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    (
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}
