use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::pdf::RenderError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("{0} not found")]
    NotFound(String),

    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("track '{0}' is no longer active")]
    InactiveTrack(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("request too large: {0}")]
    PayloadTooLarge(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("summary template error: {0}")]
    Summary(#[from] tera::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "ValidationError", self.to_string()),
            Self::InvalidInput(_) => (StatusCode::BAD_REQUEST, "InvalidInput", self.to_string()),
            Self::PayloadTooLarge(_) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PayloadTooLarge",
                self.to_string(),
            ),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            Self::InactiveTrack(_) => (StatusCode::CONFLICT, "InactiveTrack", self.to_string()),
            Self::Render(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "RenderError",
                self.to_string(),
            ),
            Self::Storage(StorageError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "NotFound", self.to_string())
            }
            Self::Storage(_)
            | Self::Database(_)
            | Self::Archive(_)
            | Self::Summary(_)
            | Self::Internal(_) => {
                tracing::error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalError",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let errors = match &self {
            Self::Validation(errors) => errors.clone(),
            _ => Vec::new(),
        };

        let body = Json(json!({
            "error": code,
            "message": message,
            "errors": errors,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
