//! Unified error handling for the API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use tandem_core::CoreError;

/// API error response body
#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

/// Application error types
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Forbidden(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        (
            status,
            Json(ApiError {
                error: message,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Domain errors keep their status semantics through the anyhow chain
        if let Some(core) = err.downcast_ref::<CoreError>() {
            return match core {
                CoreError::UnknownAgent(_)
                | CoreError::UnknownPhase(_)
                | CoreError::UnknownDocumentType(_)
                | CoreError::UnknownReviewState(_)
                | CoreError::MissingContext(_)
                | CoreError::InvalidReviewTransition { .. } => {
                    AppError::BadRequest(core.to_string())
                }
                CoreError::AgentNotAllowedInLane { .. } => AppError::Forbidden(core.to_string()),
                CoreError::LaneNotFound(_)
                | CoreError::CardNotFound(_)
                | CoreError::ProjectNotFound(_) => AppError::NotFound(core.to_string()),
                CoreError::Provider(_) => {
                    tracing::error!("provider failure: {core}");
                    AppError::Internal(core.to_string())
                }
            };
        }

        tracing::error!("Internal error: {:?}", err);
        AppError::Internal(err.to_string())
    }
}
