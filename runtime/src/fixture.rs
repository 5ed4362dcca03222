use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::tools::{
    CHROME_EVENTS_TOOL, CONNECTOR_CONFIG_TOOL, DLP_RULES_TOOL, FLEET_OVERVIEW_TOOL, ORG_UNITS_TOOL,
    ToolExecutor, ToolFailure, ToolOutcome, local_tool_result,
};

/// A fixture entry with this key simulates a failing call.
pub const FIXTURE_ERROR_KEY: &str = "$error";

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("failed to read fixture file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid fixture JSON in '{path}': {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("fixture file '{path}' must be a JSON object keyed by tool name")]
    Shape { path: String },
}

/// Deterministic tool backend answering from canned payloads.
#[derive(Clone, Debug)]
pub struct FixtureToolExecutor {
    payloads: HashMap<String, Value>,
}

impl FixtureToolExecutor {
    pub fn new(payloads: HashMap<String, Value>) -> Self {
        Self { payloads }
    }

    /// Load `{ "<toolName>": <payload>, ... }`. Tools missing from the file fall
    /// back to the built-in canned data.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| FixtureError::Read {
            path: display.clone(),
            source,
        })?;
        let parsed: Value = serde_json::from_str(&raw).map_err(|source| FixtureError::Parse {
            path: display.clone(),
            source,
        })?;
        let Value::Object(entries) = parsed else {
            return Err(FixtureError::Shape { path: display });
        };
        let mut executor = Self::canned();
        executor.payloads.extend(entries);
        Ok(executor)
    }

    /// Built-in canned fleet: one content-transfer block, two DLP rules, and a
    /// connector policy set with one customer-level target.
    pub fn canned() -> Self {
        let mut payloads = HashMap::new();
        payloads.insert(
            CHROME_EVENTS_TOOL.to_string(),
            json!({
                "events": [
                    {
                        "id": "evt-1002",
                        "eventType": "CONTENT_TRANSFER",
                        "time": "2026-10-18T16:42:10Z",
                        "userEmail": "dana@example.com",
                        "deviceName": "CB-FIN-0142",
                        "result": "BLOCKED",
                        "triggeredRule": "Block SSN upload"
                    },
                    {
                        "id": "evt-1001",
                        "eventType": "LOGIN_EVENT",
                        "time": "2026-10-18T15:03:55Z",
                        "userEmail": "dana@example.com",
                        "deviceName": "CB-FIN-0142"
                    }
                ]
            }),
        );
        payloads.insert(
            DLP_RULES_TOOL.to_string(),
            json!({
                "rules": [
                    { "name": "policies/dlp-1", "displayName": "Block SSN upload", "action": "BLOCK" },
                    { "name": "policies/dlp-2", "displayName": "Warn on source code paste", "action": "WARN" }
                ]
            }),
        );
        payloads.insert(
            CONNECTOR_CONFIG_TOOL.to_string(),
            json!({
                "policies": [
                    { "targetResource": "orgunits/03ph8a2z1", "policy": "chrome.users.OnFileAttachedEnterpriseConnector" },
                    { "targetResource": "customers/C01b2c3d4", "policy": "chrome.users.OnBulkDataEntryEnterpriseConnector" },
                    { "targetResource": "groups/02et92p0", "policy": "chrome.users.OnPrintEnterpriseConnector" }
                ]
            }),
        );
        payloads.insert(
            ORG_UNITS_TOOL.to_string(),
            json!({
                "orgUnits": [
                    { "orgUnitId": "id:03ph8a2z1", "orgUnitPath": "/Finance" },
                    { "orgUnitId": "id:03ph8a2z2", "orgUnitPath": "/Engineering" }
                ]
            }),
        );
        payloads.insert(
            FLEET_OVERVIEW_TOOL.to_string(),
            json!({ "enrolledBrowsers": 412, "activeBrowsers": 377 }),
        );
        Self { payloads }
    }
}

#[async_trait]
impl ToolExecutor for FixtureToolExecutor {
    async fn execute(&self, name: &str, arguments: &Value) -> ToolOutcome {
        if let Some(local) = local_tool_result(name, arguments) {
            return Ok(local);
        }
        let payload = self
            .payloads
            .get(name)
            .ok_or_else(|| ToolFailure::unknown_tool(name))?;
        if let Some(message) = payload.get(FIXTURE_ERROR_KEY) {
            let message = message.as_str().unwrap_or("fixture error").to_string();
            return Err(ToolFailure::new(name, message));
        }
        Ok(payload.clone())
    }
}

impl Default for FixtureToolExecutor {
    fn default() -> Self {
        Self::canned()
    }
}

impl From<Map<String, Value>> for FixtureToolExecutor {
    fn from(entries: Map<String, Value>) -> Self {
        Self::new(entries.into_iter().collect())
    }
}
