use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use fleet_assist_core::step::{ChatMessage, ToolCall, ToolChoice};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::tools::{CHROME_EVENTS_TOOL, CONNECTOR_CONFIG_TOOL, DLP_RULES_TOOL, ToolSpec};

const MODEL_TIMEOUT_SECS: u64 = 120;

/// Envelope sent to the model runtime for one step.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepRequest {
    /// Base system prompt plus any one-shot guard addendum
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
    pub tool_choice: ToolChoice,
}

/// What the model produced for one step.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelStep {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    /// Structured diagnosis, usually only on the final step
    pub output: Option<Value>,
}

impl ModelStep {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Transport(String),
    #[error("model runtime answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("model response could not be decoded: {0}")]
    Decode(String),
    #[error("scripted model has no step left")]
    Exhausted,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn next_step(&self, request: &StepRequest) -> Result<ModelStep, ModelError>;
}

/// Posts each [`StepRequest`] to a model gateway and decodes a [`ModelStep`].
#[derive(Clone)]
pub struct RemoteModelClient {
    http: reqwest::Client,
    url: Url,
}

impl RemoteModelClient {
    pub fn new(http: reqwest::Client, url: Url) -> Self {
        Self { http, url }
    }
}

#[async_trait]
impl ModelClient for RemoteModelClient {
    async fn next_step(&self, request: &StepRequest) -> Result<ModelStep, ModelError> {
        let response = self
            .http
            .post(self.url.clone())
            .timeout(Duration::from_secs(MODEL_TIMEOUT_SECS))
            .json(request)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<ModelStep>()
            .await
            .map_err(|e| ModelError::Decode(e.to_string()))
    }
}

/// Replays a fixed list of steps and records every request it saw.
#[derive(Default)]
pub struct ScriptedModel {
    steps: Mutex<VecDeque<ModelStep>>,
    requests: Mutex<Vec<StepRequest>>,
}

impl ScriptedModel {
    pub fn new(steps: impl IntoIterator<Item = ModelStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<StepRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn next_step(&self, request: &StepRequest) -> Result<ModelStep, ModelError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        self.steps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or(ModelError::Exhausted)
    }
}

/// Stand-in when no model runtime is configured: gathers the core evidence on
/// the first step of a turn, then reports what it collected.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineModel;

const OFFLINE_EVIDENCE_TOOLS: [&str; 3] =
    [CHROME_EVENTS_TOOL, DLP_RULES_TOOL, CONNECTOR_CONFIG_TOOL];

#[async_trait]
impl ModelClient for OfflineModel {
    async fn next_step(&self, request: &StepRequest) -> Result<ModelStep, ModelError> {
        let results_since_user: usize = request
            .messages
            .iter()
            .rev()
            .take_while(|message| !matches!(message, ChatMessage::User { .. }))
            .filter(|message| matches!(message, ChatMessage::Tool { .. }))
            .count();

        if results_since_user == 0 && request.tool_choice == ToolChoice::Auto {
            let calls = OFFLINE_EVIDENCE_TOOLS
                .iter()
                .enumerate()
                .map(|(index, name)| ToolCall {
                    id: format!("offline-{index}"),
                    name: name.to_string(),
                    arguments: Value::Object(Default::default()),
                })
                .collect();
            return Ok(ModelStep::calls(calls));
        }

        Ok(ModelStep::text(format!(
            "Collected {results_since_user} tool results. No model runtime is configured, \
so the evidence below is reported without a written diagnosis. Set FLEET_ASSIST_MODEL_URL \
to enable model-written answers."
        )))
    }
}
