use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const SESSION_HEADER: &str = "mcp-session-id";

/// Session the CLI resumes on the next `chat`, bound to the API it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub api_url: String,
    pub session_id: String,
    pub saved_at: DateTime<Utc>,
}

pub struct ApiResponse {
    pub status: u16,
    pub session_id: Option<String>,
    pub body: Value,
}

pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", serde_json::to_string_pretty(&err).unwrap_or_default());
    std::process::exit(4);
}

pub fn session_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fleet-assist")
        .join("session.json")
}

/// Stored session for `api_url`, if any. A session saved against a different
/// API is ignored.
pub fn load_session(path: &Path, api_url: &str) -> Option<StoredSession> {
    let data = std::fs::read_to_string(path).ok()?;
    let stored: StoredSession = serde_json::from_str(&data).ok()?;
    (stored.api_url == api_url).then_some(stored)
}

pub fn save_session(path: &Path, session: &StoredSession) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(session)?;

    // Session ids grant access to the conversation: owner-only permissions.
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(data.as_bytes())?;
    Ok(())
}

pub fn clear_session(path: &Path) {
    let _ = std::fs::remove_file(path);
}

/// Exit codes: 0=success (2xx), 1=client error (4xx), 2=server error (5xx),
///             3=connection error, 4=usage error
pub fn exit_code_for(status: u16) -> i32 {
    match status {
        200..=299 => 0,
        400..=499 => 1,
        _ => 2,
    }
}

/// Send one request. Connection and URL errors are printed here and come back
/// as their exit code.
pub async fn send(
    api_url: &str,
    method: reqwest::Method,
    path: &str,
    token: Option<&str>,
    session_id: Option<&str>,
    body: Option<Value>,
) -> Result<ApiResponse, i32> {
    let url = match reqwest::Url::parse(&format!("{}{path}", api_url.trim_end_matches('/'))) {
        Ok(url) => url,
        Err(e) => {
            print_error(json!({
                "error": "cli_error",
                "message": format!("Invalid URL: {api_url}{path}: {e}")
            }));
            return Err(4);
        }
    };

    let mut req = client().request(method, url);
    if let Some(t) = token {
        req = req.bearer_auth(t);
    }
    if let Some(id) = session_id {
        req = req.header(SESSION_HEADER, id);
    }
    if let Some(b) = body {
        req = req.json(&b);
    }

    let resp = match req.send().await {
        Ok(r) => r,
        Err(e) => {
            print_error(json!({
                "error": "connection_error",
                "message": format!("{e}"),
                "docs_hint": "Is the API server running? Check FLEET_ASSIST_API_URL."
            }));
            return Err(3);
        }
    };

    let status = resp.status().as_u16();
    let session_id = resp
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let text = resp.text().await.unwrap_or_default();
    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text)
            .unwrap_or_else(|e| json!({ "raw_error": format!("Failed to parse response as JSON: {e}") }))
    };

    Ok(ApiResponse {
        status,
        session_id,
        body,
    })
}

/// Print a response body (stdout on success, stderr otherwise) and return the
/// exit code for its status.
pub fn print_response(response: &ApiResponse, raw: bool) -> i32 {
    let exit_code = exit_code_for(response.status);
    let formatted = if raw {
        serde_json::to_string(&response.body)
    } else {
        serde_json::to_string_pretty(&response.body)
    }
    .unwrap_or_default();

    if exit_code == 0 {
        println!("{formatted}");
    } else {
        eprintln!("{formatted}");
    }
    exit_code
}

fn print_error(err: Value) {
    eprintln!("{}", serde_json::to_string_pretty(&err).unwrap_or_default());
}

// Unix-specific imports for file permissions
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

#[cfg(not(unix))]
trait OpenOptionsExt {
    fn mode(&mut self, _mode: u32) -> &mut Self;
}

#[cfg(not(unix))]
impl OpenOptionsExt for std::fs::OpenOptions {
    fn mode(&mut self, _mode: u32) -> &mut Self {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_session_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("fleet-assist-cli-{}", uuid::Uuid::now_v7()))
            .join("session.json")
    }

    #[test]
    fn stored_session_is_scoped_to_its_api() {
        let path = temp_session_path();
        let stored = StoredSession {
            api_url: "http://localhost:3000".to_string(),
            session_id: "0192f5a0-0000-7000-8000-000000000001".to_string(),
            saved_at: Utc::now(),
        };
        save_session(&path, &stored).expect("session saves");

        assert_eq!(load_session(&path, "http://localhost:3000"), Some(stored));
        assert_eq!(load_session(&path, "https://fleet.example.com"), None);

        clear_session(&path);
        assert_eq!(load_session(&path, "http://localhost:3000"), None);
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let path = temp_session_path();
        let stored = StoredSession {
            api_url: "http://localhost:3000".to_string(),
            session_id: "id".to_string(),
            saved_at: Utc::now(),
        };
        save_session(&path, &stored).expect("session saves");
        let mode = std::fs::metadata(&path)
            .expect("metadata")
            .permissions()
            .mode();
        clear_session(&path);
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn status_maps_to_exit_code() {
        assert_eq!(exit_code_for(200), 0);
        assert_eq!(exit_code_for(204), 0);
        assert_eq!(exit_code_for(404), 1);
        assert_eq!(exit_code_for(502), 2);
    }
}
