use serde::Serialize;
use utoipa::ToSchema;

/// Structured protocol error. Returned for request-level problems (bad header,
/// unknown session, missing credential) before any diagnosis work starts.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    /// Machine-readable error code (e.g. "validation_failed", "session_not_found")
    pub error: String,
    /// Human-readable description of what went wrong
    pub message: String,
    /// Which header or field caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Request ID for tracing and debugging
    pub request_id: String,
    /// Hint about what the client should do next
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

/// Hard failure of a diagnosis turn. The body carries nothing but the message.
#[derive(Debug, Serialize, ToSchema)]
pub struct DiagnosisFailure {
    pub error: String,
}

/// Error codes used across the API
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const MISSING_SESSION: &str = "missing_session";
    pub const SESSION_NOT_FOUND: &str = "session_not_found";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const INTERNAL_ERROR: &str = "internal_error";
}
