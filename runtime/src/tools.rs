use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};

use crate::signals::SUGGEST_ACTIONS_TOOL;

pub const CHROME_EVENTS_TOOL: &str = "getChromeEvents";
pub const CONNECTOR_CONFIG_TOOL: &str = "getChromeConnectorConfiguration";
pub const DLP_RULES_TOOL: &str = "listDLPRules";
pub const ORG_UNITS_TOOL: &str = "listOrgUnits";
pub const FLEET_OVERVIEW_TOOL: &str = "getFleetOverview";

/// A tool call that did not produce data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{tool}: {message}")]
pub struct ToolFailure {
    pub tool: String,
    pub message: String,
    /// Whether repeating the call could succeed (propagation delay, 5xx)
    pub retryable: bool,
}

impl ToolFailure {
    pub fn new(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            message: message.into(),
            retryable: false,
        }
    }

    pub fn retryable(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            retryable: true,
            ..Self::new(tool, message)
        }
    }

    pub fn unknown_tool(tool: &str) -> Self {
        Self::new(tool, format!("unknown tool '{tool}'"))
    }
}

pub type ToolOutcome = Result<Value, ToolFailure>;

/// Executes a named tool against live services or canned data. Callers never
/// know which.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, name: &str, arguments: &Value) -> ToolOutcome;
}

/// Payload fed back to the model (and into the captured step) for an outcome.
pub fn outcome_payload(outcome: &ToolOutcome) -> Value {
    match outcome {
        Ok(data) => data.clone(),
        Err(failure) => json!({ "error": failure.message }),
    }
}

/// Tools answered in-process regardless of backend. They carry no evidence.
pub fn local_tool_result(name: &str, arguments: &Value) -> Option<Value> {
    if name != SUGGEST_ACTIONS_TOOL {
        return None;
    }
    let actions = arguments
        .get("actions")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    Some(json!({ "actions": actions }))
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

pub fn tool_definitions() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: CHROME_EVENTS_TOOL,
            description: "Fetch recent Chrome audit events (content transfers, malware, login) for the fleet or one user.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "userEmail": { "type": "string" },
                    "eventName": { "type": "string" },
                    "maxResults": { "type": "integer", "minimum": 1, "maximum": 200 }
                }
            }),
        },
        ToolSpec {
            name: CONNECTOR_CONFIG_TOOL,
            description: "Resolve Chrome Enterprise connector policies and the resources they target.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "orgUnitId": { "type": "string" }
                }
            }),
        },
        ToolSpec {
            name: DLP_RULES_TOOL,
            description: "List data loss prevention rules that apply to Chrome.",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolSpec {
            name: ORG_UNITS_TOOL,
            description: "List organizational units in the directory.",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolSpec {
            name: FLEET_OVERVIEW_TOOL,
            description: "Summarize enrolled and active managed browsers.",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolSpec {
            name: SUGGEST_ACTIONS_TOOL,
            description: "Offer follow-up actions to the administrator as clickable suggestions.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "actions": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["actions"]
            }),
        },
    ]
}
