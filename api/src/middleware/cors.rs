use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;

use crate::auth::TEST_BYPASS_HEADER;
use crate::routes::chat::SESSION_HEADER;

/// Build the CORS layer for the configured origins.
///
/// - Methods: GET, POST, DELETE, OPTIONS
/// - Headers: Authorization, Content-Type, the session header, the test-bypass header
/// - Exposed: the session header, so browser clients can resume
/// - Max age: 3600s
pub fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("authorization"),
            HeaderName::from_static("content-type"),
            HeaderName::from_static(SESSION_HEADER),
            HeaderName::from_static(TEST_BYPASS_HEADER),
        ])
        .expose_headers([HeaderName::from_static(SESSION_HEADER)])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    async fn ok() -> StatusCode {
        StatusCode::OK
    }

    #[tokio::test]
    async fn configured_origin_sees_session_header() {
        let app = Router::new()
            .route("/api/chat", get(ok))
            .layer(build_cors_layer(&["https://admin.example.com".to_string()]));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/chat")
                    .header("origin", "https://admin.example.com")
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should succeed");

        let headers = response.headers();
        assert_eq!(
            headers
                .get("access-control-allow-origin")
                .expect("allow-origin header should exist"),
            "https://admin.example.com"
        );
        assert_eq!(
            headers
                .get("access-control-expose-headers")
                .expect("expose-headers header should exist"),
            SESSION_HEADER
        );
    }
}
