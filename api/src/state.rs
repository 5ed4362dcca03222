use std::sync::Arc;

use fleet_assist_runtime::agent_loop::AgentLoop;
use fleet_assist_runtime::credentials::{
    AccessCredential, CredentialProvider, GatewayCredentialProvider, PassthroughCredentials,
};
use fleet_assist_runtime::fixture::FixtureToolExecutor;
use fleet_assist_runtime::gateway::{GatewayToolExecutor, RetryPolicy};
use fleet_assist_runtime::model::{ModelClient, OfflineModel, RemoteModelClient};
use fleet_assist_runtime::reference::ReferenceIndex;
use fleet_assist_runtime::sessions::{Clock, SessionRegistry, SystemClock};
use fleet_assist_runtime::tools::ToolExecutor;
use fleet_assist_runtime::transport::AgentTransport;
use url::Url;

use crate::config::{AppConfig, ConfigError, ToolMode};

/// Where a new session's tools run. Live sessions bind the caller's credential.
pub enum ToolBackend {
    Fixture(Arc<FixtureToolExecutor>),
    Gateway {
        http: reqwest::Client,
        base_url: Url,
        retry: RetryPolicy,
    },
}

impl ToolBackend {
    pub fn executor_for(&self, credential: AccessCredential) -> Arc<dyn ToolExecutor> {
        match self {
            Self::Fixture(fixture) => fixture.clone(),
            Self::Gateway {
                http,
                base_url,
                retry,
            } => Arc::new(GatewayToolExecutor::new(
                http.clone(),
                base_url.clone(),
                credential,
                *retry,
            )),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::Fixture(_) => "fixture",
            Self::Gateway { .. } => "live",
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry<AgentTransport>>,
    pub agent: Arc<AgentLoop>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub tools: Arc<ToolBackend>,
    pub references: ReferenceIndex,
    pub allow_test_bypass: bool,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::new();

        let tools = match (config.tool_mode, &config.tool_gateway_url) {
            (ToolMode::Live, Some(base_url)) => ToolBackend::Gateway {
                http: http.clone(),
                base_url: base_url.clone(),
                retry: RetryPolicy::with_attempts(config.gateway_max_attempts),
            },
            (ToolMode::Live, None) => return Err(ConfigError::MissingGatewayUrl),
            (ToolMode::Fixture, _) => {
                let fixture = match &config.fixture_path {
                    Some(path) => FixtureToolExecutor::from_path(path)?,
                    None => FixtureToolExecutor::canned(),
                };
                ToolBackend::Fixture(Arc::new(fixture))
            }
        };

        let credentials: Arc<dyn CredentialProvider> = match &config.token_exchange_url {
            Some(url) => Arc::new(GatewayCredentialProvider::new(http.clone(), url.clone())),
            None => Arc::new(PassthroughCredentials),
        };

        let model: Arc<dyn ModelClient> = match &config.model_url {
            Some(url) => Arc::new(RemoteModelClient::new(http, url.clone())),
            None => {
                tracing::warn!(
                    event = "model_offline",
                    "FLEET_ASSIST_MODEL_URL not set; answering with the offline model"
                );
                Arc::new(OfflineModel)
            }
        };

        Ok(Self::new(
            model,
            config,
            tools,
            credentials,
            Arc::new(SystemClock),
        ))
    }

    pub fn new(
        model: Arc<dyn ModelClient>,
        config: &AppConfig,
        tools: ToolBackend,
        credentials: Arc<dyn CredentialProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let agent = AgentLoop::new(
            model,
            Arc::new(config.guard_policy.clone()),
            config.max_steps,
        );
        let ttl = chrono::Duration::seconds(config.session_ttl_secs as i64);
        Self {
            registry: Arc::new(SessionRegistry::new(clock, ttl)),
            agent: Arc::new(agent),
            credentials,
            tools: Arc::new(tools),
            references: ReferenceIndex,
            allow_test_bypass: config.allow_test_bypass,
        }
    }
}
