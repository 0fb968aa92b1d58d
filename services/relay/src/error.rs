use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Fatal ingest failure. Ends the relay; there is no internal restart.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("datagram transport failed: {0}")]
    Transport(#[from] std::io::Error),
}

/// Errors scoped to a single HTTP request.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Error loading page: {0}")]
    PageUnavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                "404 Not Found",
            )
                .into_response(),
            AppError::PageUnavailable(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                self.to_string(),
            )
                .into_response(),
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Request failed");
                let body = Json(json!({
                    "error": "INTERNAL_ERROR",
                    "message": "Internal server error"
                }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}
