//! Wire error mapping. Every handler has a single exit point that maps an
//! internal result into one of these kinds; the body is always
//! `{"error": "..."}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::hsi::HsiError;
use crate::registry::RegistryError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::MissingUuid => Self::BadRequest("Node UUID is required".to_string()),
            RegistryError::NotRegistered => Self::NotFound("Node not found".to_string()),
            RegistryError::Record(_) | RegistryError::Store(_) => Self::Internal(e.to_string()),
        }
    }
}

impl From<HsiError> for ApiError {
    fn from(e: HsiError) -> Self {
        match e {
            HsiError::MissingField(_)
            | HsiError::UserIdOutOfRange
            | HsiError::VlanIdOutOfRange
            | HsiError::InvalidPool(_)
            | HsiError::InvalidSubnet(_)
            | HsiError::InvalidGateway(_)
            | HsiError::GatewayOffSubnet
            | HsiError::GatewayInsidePool
            | HsiError::UserIdMismatch
            | HsiError::NegativeCount
            | HsiError::UserIdExceedsCount => Self::BadRequest(e.to_string()),
            HsiError::VlanInUse { .. } => Self::Conflict(e.to_string()),
            HsiError::NotFound | HsiError::CountNotFound => Self::NotFound(e.to_string()),
            HsiError::CountUnreadable | HsiError::Record(_) | HsiError::Store(_) => {
                Self::Internal(e.to_string())
            }
        }
    }
}
