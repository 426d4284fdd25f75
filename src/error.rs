use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("medication record not found: {0}")]
    NotFound(Uuid),

    #[error("evidence upload failed: {0}")]
    Upload(#[source] anyhow::Error),

    #[error("authentication required")]
    AuthRequired,

    /// Record or blob store failure, propagated as-is.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::Upload(e) => {
                tracing::error!(error = %e, "evidence upload failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "upload_error",
                    "Evidence upload failed".into(),
                )
            }
            AppError::AuthRequired => (
                StatusCode::UNAUTHORIZED,
                "auth_required",
                "Authentication required".into(),
            ),
            AppError::Store(e) => {
                tracing::error!(error = %e, "store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
        };

        (status, Json(ErrorBody { error: code, message })).into_response()
    }
}
