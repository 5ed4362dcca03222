use std::path::Path;

use serde_json::json;

use crate::util::{clear_session, exit_error, load_session, print_response, send};

fn stored_session_id(session_file: &Path, api_url: &str) -> String {
    match load_session(session_file, api_url) {
        Some(stored) => stored.session_id,
        None => exit_error(
            "No saved session for this API",
            Some("Start one with `fleet-assist chat <message>`"),
        ),
    }
}

/// Print the saved session's transcript. Forgets the session if the server
/// has evicted it.
pub async fn resume(api_url: &str, session_file: &Path, raw: bool) -> i32 {
    let session_id = stored_session_id(session_file, api_url);
    match send(
        api_url,
        reqwest::Method::GET,
        "/api/chat",
        None,
        Some(&session_id),
        None,
    )
    .await
    {
        Ok(response) => {
            if response.status == 404 {
                clear_session(session_file);
            }
            print_response(&response, raw)
        }
        Err(code) => code,
    }
}

pub async fn close(api_url: &str, session_file: &Path) -> i32 {
    let session_id = stored_session_id(session_file, api_url);
    match send(
        api_url,
        reqwest::Method::DELETE,
        "/api/chat",
        None,
        Some(&session_id),
        None,
    )
    .await
    {
        Ok(response) if response.status == 204 || response.status == 404 => {
            clear_session(session_file);
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "closed": session_id,
                    "already_expired": response.status == 404
                }))
                .unwrap_or_default()
            );
            0
        }
        Ok(response) => print_response(&response, false),
        Err(code) => code,
    }
}
