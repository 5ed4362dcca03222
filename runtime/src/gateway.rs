use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use url::Url;

use crate::credentials::AccessCredential;
use crate::tools::{ToolExecutor, ToolFailure, ToolOutcome, local_tool_result};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
const BASE_BACKOFF_MS: u64 = 250;
const MAX_BACKOFF_MS: u64 = 4_000;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Bounded exponential backoff for administrative API calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_attempts(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(BASE_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
        }
    }

    /// Delay before retry number `attempt` (1-based): base, 2*base, 4*base, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Statuses worth retrying: newly created resources answer 404/409 until
/// they propagate, and 429/5xx are transient by definition.
fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || matches!(
            status,
            StatusCode::NOT_FOUND | StatusCode::CONFLICT | StatusCode::TOO_MANY_REQUESTS
        )
}

/// Live tool backend: forwards each call to the administrative tool gateway
/// with the caller's access credential.
#[derive(Clone)]
pub struct GatewayToolExecutor {
    http: reqwest::Client,
    base_url: Url,
    credential: AccessCredential,
    retry: RetryPolicy,
}

impl GatewayToolExecutor {
    pub fn new(
        http: reqwest::Client,
        mut base_url: Url,
        credential: AccessCredential,
        retry: RetryPolicy,
    ) -> Self {
        // `Url::join` replaces the last segment unless the base ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http,
            base_url,
            credential,
            retry,
        }
    }

    fn tool_url(&self, name: &str) -> Result<Url, ToolFailure> {
        self.base_url
            .join(&format!("tools/{name}"))
            .map_err(|e| ToolFailure::new(name, format!("invalid tool gateway URL: {e}")))
    }

    async fn attempt(&self, url: &Url, name: &str, arguments: &Value) -> ToolOutcome {
        let response = self
            .http
            .post(url.clone())
            .bearer_auth(self.credential.token())
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .json(&json!({ "arguments": arguments }))
            .send()
            .await
            .map_err(|e| ToolFailure::retryable(name, format!("request failed: {e}")))?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if status.is_success() {
            return Ok(body);
        }

        let detail = body
            .get("message")
            .or_else(|| body.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string());
        let message = format!("{}: {detail}", status.as_u16());
        if is_retryable_status(status) {
            Err(ToolFailure::retryable(name, message))
        } else {
            Err(ToolFailure::new(name, message))
        }
    }
}

#[async_trait]
impl ToolExecutor for GatewayToolExecutor {
    async fn execute(&self, name: &str, arguments: &Value) -> ToolOutcome {
        if let Some(local) = local_tool_result(name, arguments) {
            return Ok(local);
        }
        let url = self.tool_url(name)?;

        let mut attempt = 1;
        loop {
            match self.attempt(&url, name, arguments).await {
                Ok(data) => return Ok(data),
                Err(failure) if failure.retryable && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::debug!(
                        event = "tool_call_retry",
                        tool = name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure.message,
                        "retrying tool call"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => {
                    tracing::warn!(
                        event = "tool_call_failed",
                        tool = name,
                        attempts = attempt,
                        error = %failure.message,
                        "tool call failed"
                    );
                    return Err(failure);
                }
            }
        }
    }
}
