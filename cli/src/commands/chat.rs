use std::path::Path;

use chrono::Utc;
use serde_json::json;

use crate::util::{
    StoredSession, clear_session, exit_error, load_session, print_response, save_session, send,
};

/// Send one message. Continues the stored session unless `new_session` is
/// set; a stored session the server no longer knows is dropped and a fresh one
/// is started.
pub async fn run(
    api_url: &str,
    token: Option<&str>,
    session_file: &Path,
    message: &str,
    new_session: bool,
    raw: bool,
) -> i32 {
    let stored = if new_session {
        None
    } else {
        load_session(session_file, api_url)
    };
    let body = json!({ "message": message });

    if let Some(stored) = &stored {
        let response = match send(
            api_url,
            reqwest::Method::POST,
            "/api/chat",
            token,
            Some(&stored.session_id),
            Some(body.clone()),
        )
        .await
        {
            Ok(response) => response,
            Err(code) => return code,
        };
        if response.status != 404 {
            return print_response(&response, raw);
        }
        eprintln!(
            "{}",
            json!({
                "notice": "session_expired",
                "message": format!("Session {} expired; starting a new one", stored.session_id)
            })
        );
        clear_session(session_file);
    }

    let Some(token) = token else {
        exit_error(
            "A bearer token is required to start a session",
            Some("Set --token or FLEET_ASSIST_TOKEN"),
        );
    };

    let response = match send(
        api_url,
        reqwest::Method::POST,
        "/api/chat",
        Some(token),
        None,
        Some(body),
    )
    .await
    {
        Ok(response) => response,
        Err(code) => return code,
    };

    if let Some(session_id) = &response.session_id {
        let stored = StoredSession {
            api_url: api_url.to_string(),
            session_id: session_id.clone(),
            saved_at: Utc::now(),
        };
        if let Err(e) = save_session(session_file, &stored) {
            eprintln!(
                "{}",
                json!({
                    "warning": "session_not_saved",
                    "message": format!("Could not save session to {}: {e}", session_file.display())
                })
            );
        }
    }
    print_response(&response, raw)
}
