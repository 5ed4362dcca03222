use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// A tool invocation requested by the model within one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Model-assigned call id, echoed back with the result
    pub id: String,
    /// Tool name (e.g. "getChromeEvents")
    pub name: String,
    /// Tool arguments; absent arguments are an empty object
    #[serde(default = "empty_arguments")]
    pub arguments: Value,
}

fn empty_arguments() -> Value {
    Value::Object(serde_json::Map::new())
}

/// One captured model step: the text it produced, the tools it invoked, and the
/// results those tools returned. Results are positionally aligned with calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tool_calls: Vec<String>,
    #[serde(default)]
    pub tool_results: Vec<Value>,
}

/// Signals derived from a single [`Step`]. Carries no memory of prior steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepSignals {
    pub has_tool_results: bool,
    pub has_text: bool,
    pub text_length: usize,
    /// Only meaningful when `has_text` is true; false otherwise.
    pub has_short_response: bool,
    pub has_ui_content: bool,
    pub only_silent_tools: bool,
    pub has_suggest_actions_call: bool,
}

/// Tool-use mode requested for the next model step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
}

/// One-shot steering instruction for the next model step. The empty directive
/// means "no intervention".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuardDirective {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

impl GuardDirective {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self {
            system: Some(message.into()),
            tool_choice: None,
        }
    }

    pub fn stop(message: impl Into<String>) -> Self {
        Self {
            system: Some(message.into()),
            tool_choice: Some(ToolChoice::None),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.system.is_none() && self.tool_choice.is_none()
    }
}

/// Conversation entry exchanged with the model runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "role", rename_all = "camelCase")]
pub enum ChatMessage {
    User {
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    #[serde(rename_all = "camelCase")]
    Tool {
        tool_call_id: String,
        name: String,
        result: Value,
    },
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage::User {
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_deserializes_with_missing_fields() {
        let step: Step = serde_json::from_value(json!({ "toolCalls": ["getChromeEvents"] }))
            .expect("partial step should deserialize");
        assert!(step.text.is_empty());
        assert_eq!(step.tool_calls, vec!["getChromeEvents".to_string()]);
        assert!(step.tool_results.is_empty());
    }

    #[test]
    fn stop_directive_serializes_tool_choice_none() {
        let directive = GuardDirective::stop("done");
        let value = serde_json::to_value(&directive).expect("directive should serialize");
        assert_eq!(value, json!({ "system": "done", "toolChoice": "none" }));
        assert!(GuardDirective::none().is_empty());
    }

    #[test]
    fn chat_message_uses_role_tag() {
        let value = serde_json::to_value(ChatMessage::user("why is DLP not firing?"))
            .expect("message should serialize");
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"], "why is DLP not firing?");
    }
}
