use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use fleet_assist_core::diagnosis::DiagnosisResponse;
use fleet_assist_core::step::ChatMessage;
use fleet_assist_runtime::agent_loop::AgentError;
use fleet_assist_runtime::diagnosis::{assemble, auth_fallback, test_bypass_diagnosis};
use fleet_assist_runtime::evidence::build_evidence;
use fleet_assist_runtime::sessions::{Session, SessionRegistry};
use fleet_assist_runtime::transport::AgentTransport;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub const SESSION_HEADER: &str = "mcp-session-id";

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/chat",
        post(post_chat).get(get_chat).delete(delete_chat),
    )
}

#[derive(Deserialize, utoipa::ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ChatRequest {
    /// The administrator's question for this turn
    pub message: String,
}

/// Transcript of a live session, returned by the resume verb
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub transcript: Vec<ChatMessage>,
}

fn session_header(headers: &HeaderMap) -> Result<Option<Uuid>, AppError> {
    let Some(raw) = headers.get(SESSION_HEADER) else {
        return Ok(None);
    };
    raw.to_str()
        .ok()
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .map(Some)
        .ok_or_else(|| AppError::Validation {
            message: format!("'{SESSION_HEADER}' is not a session id"),
            field: Some(SESSION_HEADER.to_string()),
            docs_hint: Some("Send the value returned by POST /api/chat unchanged.".to_string()),
        })
}

fn require_session(
    headers: &HeaderMap,
    registry: &SessionRegistry<AgentTransport>,
) -> Result<Session<AgentTransport>, AppError> {
    let id = session_header(headers)?.ok_or(AppError::MissingSession)?;
    registry
        .lookup(&id)
        .ok_or_else(|| AppError::SessionNotFound {
            session_id: id.to_string(),
        })
}

/// Closes the session if the handler future is dropped mid-turn (client went
/// away). Disarmed once the turn has finished.
struct DisconnectGuard {
    registry: Arc<SessionRegistry<AgentTransport>>,
    session_id: Uuid,
    armed: bool,
}

impl DisconnectGuard {
    fn arm(registry: Arc<SessionRegistry<AgentTransport>>, session_id: Uuid) -> Self {
        Self {
            registry,
            session_id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::info!(
            event = "client_disconnected",
            session_id = %self.session_id,
            "client went away mid-turn; closing session"
        );
        let registry = self.registry.clone();
        let session_id = self.session_id;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                registry.close(&session_id).await;
            });
        }
    }
}

async fn run_diagnosis(
    state: &AppState,
    session: &Session<AgentTransport>,
    message: &str,
) -> Result<DiagnosisResponse, AgentError> {
    let outcome = session.transport.run_turn(&state.agent, message).await?;
    let evidence = build_evidence(&outcome.tool_records, state.agent.policy());
    let reference = state.references.lookup(message);
    tracing::info!(
        event = "turn_completed",
        session_id = %session.id,
        steps = outcome.steps.len(),
        tool_calls = outcome.tool_records.len(),
        stop_reason = ?outcome.stop_reason,
        gaps = evidence.gaps.len(),
        connector_flag = evidence.connector_analysis.flag,
        "diagnosis turn completed"
    );
    Ok(assemble(&outcome, evidence, reference))
}

fn with_session_header(session_id: Uuid, diagnosis: DiagnosisResponse) -> Response {
    ([(SESSION_HEADER, session_id.to_string())], Json(diagnosis)).into_response()
}

/// Run one diagnosis turn
///
/// Without a session header this authenticates the caller, opens a session,
/// and returns its id in the `mcp-session-id` response header. With the header
/// the turn continues that session's conversation.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    params(
        ("mcp-session-id" = Option<String>, Header, description = "Session to continue")
    ),
    responses(
        (status = 200, description = "Diagnosis for this turn", body = DiagnosisResponse),
        (status = 400, description = "Malformed body or session header", body = fleet_assist_core::error::ApiError),
        (status = 401, description = "Missing bearer credential", body = fleet_assist_core::error::ApiError),
        (status = 404, description = "Unknown or expired session", body = fleet_assist_core::error::ApiError),
        (status = 502, description = "The turn failed downstream", body = fleet_assist_core::error::DiagnosisFailure)
    ),
    security(("bearer_auth" = [])),
    tag = "chat"
)]
pub async fn post_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(req): AppJson<ChatRequest>,
) -> Result<Response, AppError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(AppError::Validation {
            message: "message must not be empty".to_string(),
            field: Some("message".to_string()),
            docs_hint: None,
        });
    }

    if let Some(session_id) = session_header(&headers)? {
        let session = state
            .registry
            .lookup(&session_id)
            .ok_or_else(|| AppError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        state.registry.touch(&session_id);

        let guard = DisconnectGuard::arm(state.registry.clone(), session_id);
        let result = run_diagnosis(&state, &session, message).await;
        guard.disarm();
        state.registry.touch(&session_id);

        let diagnosis = result.map_err(|e| AppError::Upstream(e.to_string()))?;
        return Ok(with_session_header(session_id, diagnosis));
    }

    if auth::wants_test_bypass(&headers, state.allow_test_bypass) {
        tracing::info!(event = "test_bypass", "serving synthetic diagnosis");
        return Ok(Json(test_bypass_diagnosis()).into_response());
    }

    let bearer = auth::bearer_token(&headers)?;
    let credential = match state.credentials.resolve(bearer).await {
        Ok(credential) => credential,
        Err(failure) => {
            tracing::warn!(
                event = "credential_rejected",
                error = %failure,
                "no access credential; answering with fallback diagnosis"
            );
            return Ok(Json(auth_fallback(&failure)).into_response());
        }
    };

    let transport = Arc::new(AgentTransport::new(state.tools.executor_for(credential)));
    let session = state.registry.create(transport);

    let guard = DisconnectGuard::arm(state.registry.clone(), session.id);
    let result = run_diagnosis(&state, &session, message).await;
    guard.disarm();

    match result {
        Ok(diagnosis) => {
            state.registry.touch(&session.id);
            Ok(with_session_header(session.id, diagnosis))
        }
        Err(e) => {
            state.registry.close(&session.id).await;
            Err(AppError::Upstream(e.to_string()))
        }
    }
}

/// Resume a session: its timestamps and transcript
#[utoipa::path(
    get,
    path = "/api/chat",
    params(
        ("mcp-session-id" = String, Header, description = "Session to resume")
    ),
    responses(
        (status = 200, description = "Session snapshot", body = SessionSnapshot),
        (status = 400, description = "Session header missing", body = fleet_assist_core::error::ApiError),
        (status = 404, description = "Unknown or expired session", body = fleet_assist_core::error::ApiError)
    ),
    tag = "chat"
)]
pub async fn get_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = require_session(&headers, &state.registry)?;
    state.registry.touch(&session.id);
    let session = state.registry.lookup(&session.id).unwrap_or(session);

    Ok(Json(SessionSnapshot {
        session_id: session.id,
        created_at: session.created_at,
        last_seen_at: session.last_seen_at,
        transcript: session.transport.transcript(),
    }))
}

/// Close a session and release its transport
#[utoipa::path(
    delete,
    path = "/api/chat",
    params(
        ("mcp-session-id" = String, Header, description = "Session to close")
    ),
    responses(
        (status = 204, description = "Session closed"),
        (status = 400, description = "Session header missing", body = fleet_assist_core::error::ApiError),
        (status = 404, description = "Unknown or expired session", body = fleet_assist_core::error::ApiError)
    ),
    tag = "chat"
)]
pub async fn delete_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let session_id = session_header(&headers)?.ok_or(AppError::MissingSession)?;
    if state.registry.close(&session_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::SessionNotFound {
            session_id: session_id.to_string(),
        })
    }
}
