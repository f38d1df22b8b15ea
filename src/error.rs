use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Attempt already in progress: {0}")]
    AlreadyInProgress(String),

    #[error("Test not available: {0}")]
    NotAvailable(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Attempt expired: {0}")]
    AttemptExpired(String),

    #[error("Attempt not found: {0}")]
    AttemptNotFound(String),

    #[error("Test not found: {0}")]
    TestNotFound(String),

    #[error("Question not found: {0}")]
    QuestionNotFound(String),

    #[error("Invalid answer: {0}")]
    InvalidAnswer(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::BadRequest(_) => "bad_request",
            Error::QuotaExceeded(_) => "quota_exceeded",
            Error::AlreadyInProgress(_) => "already_in_progress",
            Error::NotAvailable(_) => "not_available",
            Error::AccessDenied(_) => "access_denied",
            Error::AttemptExpired(_) => "attempt_expired",
            Error::AttemptNotFound(_) => "attempt_not_found",
            Error::TestNotFound(_) => "test_not_found",
            Error::QuestionNotFound(_) => "question_not_found",
            Error::InvalidAnswer(_) => "invalid_answer",
            Error::NotFound(_) => "not_found",
            Error::Validation(_) => "validation_error",
            Error::Json(_) => "invalid_json",
            _ => "internal_error",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let code = self.code();
        let (status, message) = match self {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::QuotaExceeded(msg) => (StatusCode::CONFLICT, msg),
            Error::AlreadyInProgress(msg) => (StatusCode::CONFLICT, msg),
            Error::NotAvailable(msg) => (StatusCode::FORBIDDEN, msg),
            Error::AccessDenied(msg) => (StatusCode::FORBIDDEN, msg),
            Error::AttemptExpired(msg) => (StatusCode::FORBIDDEN, msg),
            Error::AttemptNotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Error::TestNotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Error::QuestionNotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Error::InvalidAnswer(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Error::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Json(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred".to_string(),
                )
            }
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred".to_string(),
            ),
        };

        let body = Json(json!({ "error": code, "message": message }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}
