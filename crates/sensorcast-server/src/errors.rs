//! Request-level errors and their HTTP envelopes.
//!
//! Every error body has the shape `{success: false, message, error?}`.

use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sensorcast_core::{FrameError, SubscriberId};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by [`BroadcastService`](crate::BroadcastService) operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The ingest payload could not be parsed; state is unchanged.
    #[error(transparent)]
    Validation(#[from] FrameError),
    /// The id allocator returned an id that is still registered.
    #[error("subscriber id {0} is already registered")]
    RegistryCollision(SubscriberId),
    /// The frame could not be encoded for the wire.
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
    /// Any other unexpected fault.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::RegistryCollision(_) | Self::Encode(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::RegistryCollision(_) => "registry_collision",
            Self::Encode(_) => "encode",
            Self::Internal(_) => "internal",
        }
    }
}

/// JSON error envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Underlying cause, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorBody {
    fn new(message: &str, error: Option<String>) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            error,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::BAD_REQUEST {
            tracing::warn!(error = %self, kind = self.error_kind(), "rejected request");
            "Invalid telemetry payload"
        } else {
            tracing::error!(error = %self, kind = self.error_kind(), "request failed");
            "Internal server error"
        };
        (status, Json(ErrorBody::new(message, Some(self.to_string())))).into_response()
    }
}

/// Fallback for unmatched routes.
pub async fn route_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody::new("Route not found", None)),
    )
        .into_response()
}

/// Render a handler panic as the 500 envelope.
#[allow(clippy::needless_pass_by_value)]
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "handler panicked".to_string()
    };
    tracing::error!(error = %detail, "handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new("Internal server error", Some(detail))),
    )
        .into_response()
}
