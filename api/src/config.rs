use std::path::PathBuf;

use fleet_assist_runtime::agent_loop::DEFAULT_MAX_STEPS;
use fleet_assist_runtime::env::{
    env_var, parse_env_bool_flag, parse_env_list, parse_env_u32_with_bounds,
    parse_env_u64_with_bounds,
};
use fleet_assist_runtime::fixture::FixtureError;
use fleet_assist_runtime::gateway::DEFAULT_MAX_ATTEMPTS;
use fleet_assist_runtime::sessions::DEFAULT_SESSION_TTL_SECS;
use fleet_assist_runtime::signals::{DEFAULT_SILENT_TOOLS, DEFAULT_UI_MARKERS, GuardPolicy};
use url::Url;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CORS_ORIGINS: [&str; 1] = ["http://localhost:3000"];
const MIN_SESSION_TTL_SECS: u64 = 60;
const MAX_SESSION_TTL_SECS: u64 = 86_400;
const MAX_STEPS_CAP: u64 = 32;
const MAX_GATEWAY_ATTEMPTS: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is not a valid URL: {source}")]
    InvalidUrl {
        name: &'static str,
        source: url::ParseError,
    },
    #[error("FLEET_ASSIST_TOOL_MODE must be 'live' or 'fixture', got '{0}'")]
    InvalidToolMode(String),
    #[error("FLEET_ASSIST_TOOL_GATEWAY_URL is required when FLEET_ASSIST_TOOL_MODE=live")]
    MissingGatewayUrl,
    #[error(transparent)]
    Fixture(#[from] FixtureError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolMode {
    Live,
    Fixture,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub tool_mode: ToolMode,
    pub fixture_path: Option<PathBuf>,
    pub tool_gateway_url: Option<Url>,
    pub token_exchange_url: Option<Url>,
    pub model_url: Option<Url>,
    pub session_ttl_secs: u64,
    pub max_steps: usize,
    pub allow_test_bypass: bool,
    pub guard_policy: GuardPolicy,
    pub cors_origins: Vec<String>,
    pub gateway_max_attempts: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_var)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let tool_mode = match lookup("FLEET_ASSIST_TOOL_MODE")
            .map(|raw| raw.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("") | Some("fixture") => ToolMode::Fixture,
            Some("live") => ToolMode::Live,
            Some(other) => return Err(ConfigError::InvalidToolMode(other.to_string())),
        };
        let tool_gateway_url = parse_url(&lookup, "FLEET_ASSIST_TOOL_GATEWAY_URL")?;
        if tool_mode == ToolMode::Live && tool_gateway_url.is_none() {
            return Err(ConfigError::MissingGatewayUrl);
        }

        Ok(Self {
            port: lookup("PORT")
                .and_then(|raw| raw.trim().parse().ok())
                .unwrap_or(DEFAULT_PORT),
            tool_mode,
            fixture_path: lookup("FLEET_ASSIST_FIXTURE_PATH")
                .filter(|raw| !raw.trim().is_empty())
                .map(PathBuf::from),
            tool_gateway_url,
            token_exchange_url: parse_url(&lookup, "FLEET_ASSIST_TOKEN_EXCHANGE_URL")?,
            model_url: parse_url(&lookup, "FLEET_ASSIST_MODEL_URL")?,
            session_ttl_secs: parse_env_u64_with_bounds(
                lookup("FLEET_ASSIST_SESSION_TTL_SECS"),
                MIN_SESSION_TTL_SECS,
                MAX_SESSION_TTL_SECS,
                DEFAULT_SESSION_TTL_SECS as u64,
            ),
            max_steps: parse_env_u64_with_bounds(
                lookup("FLEET_ASSIST_MAX_STEPS"),
                1,
                MAX_STEPS_CAP,
                DEFAULT_MAX_STEPS as u64,
            ) as usize,
            allow_test_bypass: parse_env_bool_flag(
                lookup("FLEET_ASSIST_ALLOW_TEST_BYPASS"),
                false,
            ),
            guard_policy: GuardPolicy::new(
                parse_env_list(lookup("FLEET_ASSIST_SILENT_TOOLS"), &DEFAULT_SILENT_TOOLS),
                parse_env_list(lookup("FLEET_ASSIST_UI_MARKERS"), &DEFAULT_UI_MARKERS),
            ),
            cors_origins: parse_env_list(
                lookup("FLEET_ASSIST_CORS_ORIGINS"),
                &DEFAULT_CORS_ORIGINS,
            ),
            gateway_max_attempts: parse_env_u32_with_bounds(
                lookup("FLEET_ASSIST_GATEWAY_MAX_ATTEMPTS"),
                1,
                MAX_GATEWAY_ATTEMPTS,
                DEFAULT_MAX_ATTEMPTS,
            ),
        })
    }
}

fn parse_url(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<Url>, ConfigError> {
    match lookup(name).filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => Url::parse(raw.trim())
            .map(Some)
            .map_err(|source| ConfigError::InvalidUrl { name, source }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).expect("defaults are valid");
        assert_eq!(config.port, 3000);
        assert_eq!(config.tool_mode, ToolMode::Fixture);
        assert_eq!(config.session_ttl_secs, 1800);
        assert_eq!(config.max_steps, 8);
        assert!(!config.allow_test_bypass);
        assert!(config.guard_policy.is_silent("suggestActions"));
        assert_eq!(config.cors_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.gateway_max_attempts, 4);
    }

    #[test]
    fn numeric_settings_are_clamped() {
        let config = config(&[
            ("FLEET_ASSIST_SESSION_TTL_SECS", "5"),
            ("FLEET_ASSIST_MAX_STEPS", "500"),
            ("FLEET_ASSIST_GATEWAY_MAX_ATTEMPTS", "0"),
        ])
        .expect("valid config");
        assert_eq!(config.session_ttl_secs, 60);
        assert_eq!(config.max_steps, 32);
        assert_eq!(config.gateway_max_attempts, 1);
    }

    #[test]
    fn live_mode_requires_gateway_url() {
        assert!(matches!(
            config(&[("FLEET_ASSIST_TOOL_MODE", "live")]),
            Err(ConfigError::MissingGatewayUrl)
        ));
        let config = config(&[
            ("FLEET_ASSIST_TOOL_MODE", "LIVE"),
            ("FLEET_ASSIST_TOOL_GATEWAY_URL", "https://tools.example.com/v1"),
        ])
        .expect("live config");
        assert_eq!(config.tool_mode, ToolMode::Live);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            config(&[("FLEET_ASSIST_TOOL_MODE", "mock")]),
            Err(ConfigError::InvalidToolMode(_))
        ));
        assert!(matches!(
            config(&[("FLEET_ASSIST_MODEL_URL", "not a url")]),
            Err(ConfigError::InvalidUrl { name: "FLEET_ASSIST_MODEL_URL", .. })
        ));
    }

    #[test]
    fn guard_lists_are_configurable() {
        let config = config(&[
            ("FLEET_ASSIST_SILENT_TOOLS", "suggestActions, noteToSelf"),
            ("FLEET_ASSIST_UI_MARKERS", "ui.confirmation"),
        ])
        .expect("valid config");
        assert!(config.guard_policy.is_silent("noteToSelf"));
        assert_eq!(config.guard_policy.ui_markers.len(), 1);
    }
}
