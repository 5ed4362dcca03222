use std::collections::BTreeSet;

use fleet_assist_core::step::{Step, StepSignals};
use serde_json::Value;

/// Responses shorter than this (in characters) read as a placeholder rather
/// than an answer.
pub const SHORT_RESPONSE_THRESHOLD: usize = 50;
pub const SUGGEST_ACTIONS_TOOL: &str = "suggestActions";
/// Discriminant field carried by rich-UI tool payloads.
pub const UI_MARKER_FIELD: &str = "_type";
pub const DEFAULT_SILENT_TOOLS: [&str; 1] = [SUGGEST_ACTIONS_TOOL];
pub const DEFAULT_UI_MARKERS: [&str; 4] = [
    "ui.confirmation",
    "ui.success",
    "ui.manual_steps",
    "ui.error",
];

/// Membership lists the analyzer consults. Both are configuration input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardPolicy {
    pub silent_tools: BTreeSet<String>,
    pub ui_markers: BTreeSet<String>,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SILENT_TOOLS, DEFAULT_UI_MARKERS)
    }
}

impl GuardPolicy {
    pub fn new<S, M>(silent_tools: S, ui_markers: M) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Self {
            silent_tools: silent_tools.into_iter().map(Into::into).collect(),
            ui_markers: ui_markers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_silent(&self, tool: &str) -> bool {
        self.silent_tools.contains(tool)
    }

    fn is_ui_payload(&self, result: &Value) -> bool {
        match result {
            Value::Object(map) => map
                .get(UI_MARKER_FIELD)
                .and_then(Value::as_str)
                .is_some_and(|marker| self.ui_markers.contains(marker)),
            Value::Array(items) => items.iter().any(|item| self.is_ui_payload(item)),
            _ => false,
        }
    }
}

/// Reduce one step to its guard signals.
///
/// A result counts toward `has_tool_results` only when it is non-null and came
/// from a non-silent tool; silent tools produce nothing the user would read.
pub fn analyze_step(step: &Step, policy: &GuardPolicy) -> StepSignals {
    let trimmed = step.text.trim();
    let has_text = !trimmed.is_empty();
    let text_length = trimmed.chars().count();

    let has_tool_results = step
        .tool_results
        .iter()
        .enumerate()
        .any(|(index, result)| {
            let silent = step
                .tool_calls
                .get(index)
                .is_some_and(|name| policy.is_silent(name));
            !silent && !result.is_null()
        });

    let has_ui_content = step
        .tool_results
        .iter()
        .any(|result| policy.is_ui_payload(result));

    let only_silent_tools = !step.tool_calls.is_empty()
        && step.tool_calls.iter().all(|name| policy.is_silent(name));

    StepSignals {
        has_tool_results,
        has_text,
        text_length,
        has_short_response: has_text && text_length < SHORT_RESPONSE_THRESHOLD,
        has_ui_content,
        only_silent_tools,
        has_suggest_actions_call: step
            .tool_calls
            .iter()
            .any(|name| name == SUGGEST_ACTIONS_TOOL),
    }
}
