use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fleet_assist_core::error::{self, ApiError, DiagnosisFailure};

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
        docs_hint: Option<String>,
    },
    /// Session header absent where a session is required (400)
    MissingSession,
    /// No usable bearer credential (401)
    Unauthorized {
        message: String,
        docs_hint: Option<String>,
    },
    /// Unknown or evicted session (404)
    SessionNotFound { session_id: String },
    /// The diagnosis turn failed downstream (502, `{error}` body only)
    Upstream(String),
    /// Internal error (500)
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::MissingSession => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::MISSING_SESSION.to_string(),
                    message: "This request requires an existing session".to_string(),
                    field: Some(crate::routes::chat::SESSION_HEADER.to_string()),
                    request_id,
                    docs_hint: Some(
                        "Start a session with POST /api/chat and send the returned \
                         mcp-session-id header on later requests."
                            .to_string(),
                    ),
                },
            ),
            AppError::Unauthorized { message, docs_hint } => (
                StatusCode::UNAUTHORIZED,
                ApiError {
                    error: error::codes::UNAUTHORIZED.to_string(),
                    message,
                    field: Some("authorization".to_string()),
                    request_id,
                    docs_hint,
                },
            ),
            AppError::SessionNotFound { session_id } => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: error::codes::SESSION_NOT_FOUND.to_string(),
                    message: format!("Session '{session_id}' does not exist or has expired"),
                    field: Some(crate::routes::chat::SESSION_HEADER.to_string()),
                    request_id,
                    docs_hint: Some(
                        "Start a new session with POST /api/chat without a session header."
                            .to_string(),
                    ),
                },
            ),
            AppError::Upstream(message) => {
                tracing::error!(event = "turn_failed", error = %message, "diagnosis turn failed");
                return (
                    StatusCode::BAD_GATEWAY,
                    Json(DiagnosisFailure { error: message }),
                )
                    .into_response();
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
        };

        (status, Json(api_error)).into_response()
    }
}
