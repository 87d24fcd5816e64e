use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

/// Common error types used across the application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// The email already won within the cooldown window. Not a system fault.
    #[error("{message}")]
    Cooldown {
        email: String,
        last_award_at: DateTime<Utc>,
        days_remaining: i64,
        message: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Malformed request bodies share the validation error shape.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Persistence(_) | AppError::Migration(_) => {
                tracing::error!(error = %self, "Persistence failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
            AppError::Cooldown {
                last_award_at,
                days_remaining,
                message,
                ..
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "error": message,
                    "eligible": false,
                    "last_award_at": last_award_at,
                    "days_remaining": days_remaining,
                }),
            ),
            AppError::Config(msg) | AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg }))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
        };

        (status, Json(body)).into_response()
    }
}
