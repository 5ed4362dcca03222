//! Custom extractors that convert axum rejections to structured AppError responses.
//!
//! Use `AppJson<T>` in place of `axum::Json<T>` so malformed chat bodies answer
//! with the same error envelope as every other protocol error.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};

use crate::error::AppError;

pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(map_json_rejection(rejection)),
        }
    }
}

pub fn map_json_rejection(rejection: JsonRejection) -> AppError {
    let body_text = rejection.body_text();
    let field = field_from_serde_message(&body_text).unwrap_or_else(|| "body".to_string());

    AppError::Validation {
        message: format!("Invalid request body: {body_text}"),
        field: Some(field),
        docs_hint: Some(
            "Send a JSON body like {\"message\": \"...\"}; see GET /api-doc/openapi.json."
                .to_string(),
        ),
    }
}

/// Pull the field name out of serde's "missing field `x`" / "unknown field `x`".
fn field_from_serde_message(msg: &str) -> Option<String> {
    ["missing field `", "unknown field `"]
        .iter()
        .find_map(|pattern| {
            let after = &msg[msg.find(pattern)? + pattern.len()..];
            after.find('`').map(|end| after[..end].to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_missing_field_name() {
        let msg = "Failed to deserialize the JSON body into the target type: missing field `message` at line 1 column 2";
        assert_eq!(field_from_serde_message(msg), Some("message".to_string()));
    }

    #[test]
    fn extracts_unknown_field_name() {
        let msg = "unknown field `prompt`, expected `message`";
        assert_eq!(field_from_serde_message(msg), Some("prompt".to_string()));
    }

    #[test]
    fn returns_none_for_type_errors() {
        assert_eq!(
            field_from_serde_message("invalid type: integer `3`, expected a string"),
            None
        );
    }
}
