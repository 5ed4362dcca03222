use axum::Router;

use crate::middleware::{security_headers, sweep::SessionSweepLayer};
use crate::state::AppState;

pub mod chat;
pub mod health;

/// Application routes with per-request session sweeping. Tracing and CORS are
/// layered on in `main`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(chat::router())
        .layer(SessionSweepLayer::new(state.registry.clone()))
        .layer(axum::middleware::from_fn(security_headers::apply))
        .with_state(state)
}
