//! Error types for the movement API.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can be
//! converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Core
//! errors are mapped onto status codes by their `From` impls here, so
//! handlers only use `?`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use starmap_core::{DispatchError, StoreError};

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request did not identify the acting player.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The actor may not perform this action on the target.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The request body or a header was malformed, or the dispatch was
    /// rejected.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The requested planet or movement does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PlanetNotFound(_) | StoreError::MovementNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            StoreError::Ledger(_) | StoreError::Corrupt(_) | StoreError::Backend(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::InsufficientQuantity { .. }
            | DispatchError::InsufficientResource { .. }
            | DispatchError::IneligibleUnitType { .. }
            | DispatchError::InvalidTarget { .. }
            | DispatchError::UnknownUnit(_)
            | DispatchError::EmptyDispatch
            | DispatchError::DuplicateUnit(_)
            | DispatchError::CargoExceedsCapacity { .. }
            | DispatchError::Ledger(_) => Self::BadRequest(err.to_string()),
            DispatchError::UnknownPlanet(_) => Self::NotFound(err.to_string()),
            DispatchError::NotPlanetOwner { .. } => Self::Forbidden(err.to_string()),
            DispatchError::Store(store) => store.into(),
            DispatchError::MissingUnitKind(_) | DispatchError::Travel(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}
