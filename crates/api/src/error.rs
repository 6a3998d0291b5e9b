//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use engine::EngineError;
use queue::QueueError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Engine(e) => match e {
                EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                EngineError::WorkflowNotFound(_) | EngineError::RunNotFound(_) => StatusCode::NOT_FOUND,
                EngineError::InvalidStatus { .. } | EngineError::VersionConflict { .. } => StatusCode::CONFLICT,
                EngineError::Serialization(_) => StatusCode::BAD_REQUEST,
                EngineError::Corrupt(_) | EngineError::TaskFailed(_) | EngineError::Database(_) => {
                    tracing::error!(error = %e, "request failed");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Queue(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
