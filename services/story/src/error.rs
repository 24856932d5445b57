use crate::media_upload::UploadError;
use crate::story_repository::RepositoryError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

/// Error body returned by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Failures of a single request
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("malformed request body: {0}")]
    MalformedBody(#[from] JsonRejection),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::MalformedBody(_) => (StatusCode::BAD_REQUEST, "MALFORMED_BODY"),
            ApiError::Repository(RepositoryError::InvalidId(_)) => {
                (StatusCode::BAD_REQUEST, "INVALID_ID")
            }
            // not-found after a write is not told apart from a store fault on the wire
            ApiError::Repository(RepositoryError::NotFound(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORY_NOT_FOUND")
            }
            ApiError::Repository(RepositoryError::Store(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR")
            }
            ApiError::Upload(UploadError::InvalidPathComponent { .. }) => {
                (StatusCode::BAD_REQUEST, "INVALID_ID")
            }
            ApiError::Upload(UploadError::Presign { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PRESIGN_ERROR")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status.is_server_error() {
            error!(error = %self, code, "Request failed");
            match code {
                "STORY_NOT_FOUND" => "Story not found".to_string(),
                "PRESIGN_ERROR" => "Failed to generate upload URL".to_string(),
                _ => "Document store failure".to_string(),
            }
        } else {
            warn!(error = %self, code, "Rejected request");
            self.to_string()
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

/// Convenience type alias for route handlers
pub type ApiResult<T> = Result<T, ApiError>;
