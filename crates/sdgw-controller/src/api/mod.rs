//! HTTPS REST API surface.
//!
//! All routes live under `/api`; protected routes pass through the bearer
//! auth middleware and every response carries the strict security
//! headers. Errors are always `{"error": "..."}` JSON bodies.

pub mod auth_routes;
pub mod error;
pub mod event_routes;
pub mod health;
pub mod hsi_routes;
pub mod middleware;
pub mod node_routes;
pub mod user_routes;

pub use error::ApiError;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::auth::JwtManager;
use crate::hsi::{CommandPublisher, HsiService, SubscriberCounts};
use crate::registry::NodeRegistry;
use crate::store::Store;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub jwt: Arc<JwtManager>,
    pub registry: NodeRegistry,
    pub hsi: HsiService,
    pub counts: SubscriberCounts,
    pub commands: CommandPublisher,
}

/// `{"message": "..."}` success body.
pub(crate) fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}

/// Assemble the full `/api` router.
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health_check))
        .route("/login", post(auth_routes::login))
        .route("/register", post(auth_routes::register));

    let protected = Router::new()
        .route("/logout", post(auth_routes::logout))
        .route("/nodes", get(node_routes::list_nodes))
        .route("/nodes/:uuid", delete(node_routes::unregister_node))
        .route(
            "/nodes/:uuid/subscriber-count",
            get(node_routes::get_subscriber_count).put(node_routes::update_subscriber_count),
        )
        .route(
            "/users",
            get(user_routes::list_users).post(user_routes::add_user),
        )
        .route("/users/:username", delete(user_routes::delete_user))
        .route("/config/:node_id/hsi", post(hsi_routes::create_hsi_config))
        .route(
            "/config/:node_id/hsi/users",
            get(hsi_routes::list_hsi_user_ids),
        )
        .route(
            "/config/:node_id/hsi/:user_id",
            get(hsi_routes::get_hsi_config)
                .put(hsi_routes::update_hsi_config)
                .delete(hsi_routes::delete_hsi_config),
        )
        .route("/pppoe/dial", post(hsi_routes::dial_pppoe))
        .route("/pppoe/hangup", post(hsi_routes::hangup_pppoe))
        .route("/failed-events", get(event_routes::all_failed_events))
        .route(
            "/failed-events/:node_id",
            get(event_routes::node_failed_events),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .nest("/api", public.merge(protected))
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .with_state(state)
}
