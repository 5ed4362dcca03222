use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use url::Url;

const MIN_TOKEN_CHARS: usize = 8;
const EXCHANGE_TIMEOUT_SECS: u64 = 15;

/// Credential acquisition failed before any tool ran.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("no access credential was presented")]
    Missing,
    #[error("access credential rejected: {0}")]
    Rejected(String),
    #[error("token exchange failed: {0}")]
    Exchange(String),
}

/// Downstream access token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCredential(String);

impl AccessCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessCredential(<redacted>)")
    }
}

/// Turns the caller's bearer token into the credential tools run with.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn resolve(&self, bearer: &str) -> Result<AccessCredential, AuthFailure>;
}

fn check_token_shape(bearer: &str) -> Result<&str, AuthFailure> {
    let token = bearer.trim();
    if token.is_empty() {
        return Err(AuthFailure::Missing);
    }
    if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(AuthFailure::Rejected(
            "token contains whitespace or control characters".to_string(),
        ));
    }
    if token.chars().count() < MIN_TOKEN_CHARS {
        return Err(AuthFailure::Rejected("token is too short".to_string()));
    }
    Ok(token)
}

/// Uses the bearer token itself as the access credential.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughCredentials;

#[async_trait]
impl CredentialProvider for PassthroughCredentials {
    async fn resolve(&self, bearer: &str) -> Result<AccessCredential, AuthFailure> {
        check_token_shape(bearer).map(AccessCredential::new)
    }
}

#[derive(Deserialize)]
struct ExchangeResponse {
    access_token: String,
}

/// Exchanges the caller's bearer token for a tool-gateway access token.
#[derive(Clone)]
pub struct GatewayCredentialProvider {
    http: reqwest::Client,
    exchange_url: Url,
}

impl GatewayCredentialProvider {
    pub fn new(http: reqwest::Client, exchange_url: Url) -> Self {
        Self { http, exchange_url }
    }
}

#[async_trait]
impl CredentialProvider for GatewayCredentialProvider {
    async fn resolve(&self, bearer: &str) -> Result<AccessCredential, AuthFailure> {
        let subject = check_token_shape(bearer)?;
        let response = self
            .http
            .post(self.exchange_url.clone())
            .timeout(Duration::from_secs(EXCHANGE_TIMEOUT_SECS))
            .json(&json!({
                "grant_type": "urn:ietf:params:oauth:grant-type:token-exchange",
                "subject_token": subject
            }))
            .send()
            .await
            .map_err(|e| AuthFailure::Exchange(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(AuthFailure::Rejected(format!(
                "token endpoint answered {}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(AuthFailure::Exchange(format!(
                "token endpoint answered {}",
                status.as_u16()
            )));
        }
        let body: ExchangeResponse = response
            .json()
            .await
            .map_err(|e| AuthFailure::Exchange(format!("unreadable token response: {e}")))?;
        if body.access_token.trim().is_empty() {
            return Err(AuthFailure::Exchange(
                "token endpoint returned an empty access_token".to_string(),
            ));
        }
        Ok(AccessCredential::new(body.access_token))
    }
}
