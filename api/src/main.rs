use std::net::SocketAddr;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

mod auth;
mod config;
mod error;
mod extract;
mod middleware;
mod routes;
mod state;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Fleet Assist API",
        version = "0.1.0",
        description = "Conversational troubleshooting for managed Chrome browser fleets. \
Each turn gathers evidence through administrative tools and returns a structured diagnosis."
    ),
    paths(
        routes::health::health_check,
        routes::chat::post_chat,
        routes::chat::get_chat,
        routes::chat::delete_chat,
    ),
    components(schemas(
        HealthResponse,
        routes::chat::ChatRequest,
        routes::chat::SessionSnapshot,
        fleet_assist_core::error::ApiError,
        fleet_assist_core::error::DiagnosisFailure,
        fleet_assist_core::diagnosis::DiagnosisResponse,
        fleet_assist_core::diagnosis::Hypothesis,
        fleet_assist_core::diagnosis::MissingQuestion,
        fleet_assist_core::diagnosis::Reference,
        fleet_assist_core::evidence::EvidenceBundle,
        fleet_assist_core::evidence::Check,
        fleet_assist_core::evidence::CheckStatus,
        fleet_assist_core::evidence::Gap,
        fleet_assist_core::evidence::Signal,
        fleet_assist_core::evidence::ConnectorAnalysis,
        fleet_assist_core::evidence::TargetCounts,
        fleet_assist_core::step::ChatMessage,
        fleet_assist_core::step::ToolCall,
    )),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(
                utoipa::openapi::security::Http::new(
                    utoipa::openapi::security::HttpAuthScheme::Bearer,
                ),
            ),
        );
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// `fixture` or `live`
    pub tool_mode: String,
    pub active_sessions: usize,
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fleet_assist_api=debug,fleet_assist_runtime=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = config::AppConfig::from_env().expect("invalid configuration");
    let app_state = state::AppState::from_config(&config).expect("failed to build app state");

    tracing::info!(
        event = "config_loaded",
        tool_mode = app_state.tools.mode(),
        model = if config.model_url.is_some() { "remote" } else { "offline" },
        session_ttl_secs = config.session_ttl_secs,
        max_steps = config.max_steps,
        allow_test_bypass = config.allow_test_bypass,
        "configuration loaded"
    );

    let cors_layer = middleware::cors::build_cors_layer(&config.cors_origins);

    let app = Router::new()
        .route("/api-doc/openapi.json", get(openapi_json))
        .merge(routes::build_router(app_state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Fleet Assist API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_chat_verbs() {
        let doc = ApiDoc::openapi();
        let chat = doc.paths.paths.get("/api/chat").expect("chat path documented");
        assert!(chat.post.is_some());
        assert!(chat.get.is_some());
        assert!(chat.delete.is_some());
        assert!(doc.paths.paths.contains_key("/health"));
    }
}
