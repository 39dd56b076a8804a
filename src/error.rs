use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use uuid::Uuid;

use crate::models::exam::QuestionShortfall;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Exam {0} not found")]
    ExamNotFound(Uuid),

    #[error("Exam {0} is not active")]
    ExamInactive(Uuid),

    #[error("Exam category {0} not found")]
    CategoryNotFound(Uuid),

    #[error("Maximum attempts reached for this exam ({used}/{allowed})")]
    RetakesExceeded { used: i64, allowed: i32 },

    #[error("Insufficient questions for {} question type(s)", .0.len())]
    InsufficientQuestions(Vec<QuestionShortfall>),

    #[error("Attempt {0} not found")]
    AttemptNotFound(Uuid),

    #[error("Attempt {0} is not in progress")]
    NotInProgress(Uuid),

    #[error("Question {0} not found")]
    QuestionNotFound(Uuid),

    #[error("Certificate cannot be issued: {0}")]
    CertificateNotEligible(String),

    #[error("Certificate already exists for attempt {0}")]
    CertificateExists(Uuid),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code returned to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIGURATION_ERROR",
            Error::BadRequest(_) => "BAD_REQUEST",
            Error::Unauthorized(_) => "UNAUTHORIZED",
            Error::Forbidden(_) => "FORBIDDEN",
            Error::NotFound(_) => "NOT_FOUND",
            Error::ExamNotFound(_) => "EXAM_NOT_FOUND",
            Error::ExamInactive(_) => "EXAM_INACTIVE",
            Error::CategoryNotFound(_) => "CATEGORY_NOT_FOUND",
            Error::RetakesExceeded { .. } => "RETAKES_EXCEEDED",
            Error::InsufficientQuestions(_) => "INSUFFICIENT_QUESTIONS",
            Error::AttemptNotFound(_) => "ATTEMPT_NOT_FOUND",
            Error::NotInProgress(_) => "NOT_IN_PROGRESS",
            Error::QuestionNotFound(_) => "QUESTION_NOT_FOUND",
            Error::CertificateNotEligible(_) => "CERTIFICATE_NOT_ELIGIBLE",
            Error::CertificateExists(_) => "CERTIFICATE_EXISTS",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Json(_) => "INVALID_JSON",
            Error::Database(_)
            | Error::Migration(_)
            | Error::Reqwest(_)
            | Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) | Error::Validation(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_)
            | Error::ExamNotFound(_)
            | Error::CategoryNotFound(_)
            | Error::AttemptNotFound(_)
            | Error::QuestionNotFound(_) => StatusCode::NOT_FOUND,
            Error::ExamInactive(_)
            | Error::RetakesExceeded { .. }
            | Error::NotInProgress(_)
            | Error::CertificateExists(_) => StatusCode::CONFLICT,
            Error::InsufficientQuestions(_) | Error::CertificateNotEligible(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::Config(_)
            | Error::Database(_)
            | Error::Migration(_)
            | Error::Reqwest(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = match &self {
            Error::RetakesExceeded { used, allowed } => json!({
                "error": self.code(),
                "message": self.to_string(),
                "used": used,
                "allowed": allowed,
            }),
            Error::InsufficientQuestions(shortfalls) => json!({
                "error": self.code(),
                "message": self.to_string(),
                "shortfalls": shortfalls,
            }),
            Error::Database(_) | Error::Migration(_) | Error::Internal(_) | Error::Config(_) => {
                tracing::error!(error = %self, "request failed");
                json!({
                    "error": self.code(),
                    "message": "An unexpected error occurred",
                })
            }
            Error::Reqwest(err) => json!({
                "error": self.code(),
                "message": format!("External service error: {}", err),
            }),
            _ => json!({
                "error": self.code(),
                "message": self.to_string(),
            }),
        };

        (status, Json(body)).into_response()
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
