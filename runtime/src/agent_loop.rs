use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fleet_assist_core::step::{ChatMessage, GuardDirective, Step, ToolCall, ToolChoice};
use futures_util::future::join_all;
use serde_json::Value;

use crate::guard::{GuardState, TurnHistory, select_guard};
use crate::model::{ModelClient, ModelError, StepRequest};
use crate::signals::{GuardPolicy, analyze_step};
use crate::tools::{ToolExecutor, ToolOutcome, outcome_payload, tool_definitions};

pub const DEFAULT_MAX_STEPS: usize = 8;

pub const BASE_SYSTEM_PROMPT: &str = "You are a troubleshooting assistant for a managed Chrome browser fleet. \
Use the available tools to gather evidence before answering: audit events, DLP rules, connector policies, \
org units, and fleet overview. Ground every conclusion in tool results, say which evidence is missing, \
and finish with a structured diagnosis: likely causes with confidence, next steps, and any action that \
needs the administrator's confirmation.";

/// A tool call and what it produced.
#[derive(Debug, Clone)]
pub struct ToolRecord {
    pub call: ToolCall,
    pub outcome: ToolOutcome,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The model finished without requesting more tools
    Completed,
    /// The step budget ran out
    StepBudget,
    /// The session was closed mid-turn
    Cancelled,
}

#[derive(Debug)]
pub struct TurnOutcome {
    /// Messages produced during this turn, in order
    pub messages: Vec<ChatMessage>,
    pub steps: Vec<Step>,
    pub tool_records: Vec<ToolRecord>,
    /// Guard decision per step, aligned with `steps`
    pub decisions: Vec<GuardState>,
    /// Last non-empty text the model produced
    pub final_text: String,
    /// Last structured output the model produced
    pub final_output: Option<Value>,
    pub stop_reason: StopReason,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Drives one turn: model step, concurrent tool calls, signal analysis, guard
/// decision, repeat.
pub struct AgentLoop {
    model: Arc<dyn ModelClient>,
    policy: Arc<GuardPolicy>,
    system_prompt: String,
    max_steps: usize,
}

impl AgentLoop {
    pub fn new(model: Arc<dyn ModelClient>, policy: Arc<GuardPolicy>, max_steps: usize) -> Self {
        Self {
            model,
            policy,
            system_prompt: BASE_SYSTEM_PROMPT.to_string(),
            max_steps: max_steps.max(1),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn policy(&self) -> &GuardPolicy {
        &self.policy
    }

    fn step_request(&self, messages: &[ChatMessage], directive: &GuardDirective) -> StepRequest {
        let system = match &directive.system {
            Some(addendum) => format!("{}\n\n{addendum}", self.system_prompt),
            None => self.system_prompt.clone(),
        };
        StepRequest {
            system,
            messages: messages.to_vec(),
            tools: tool_definitions(),
            tool_choice: directive.tool_choice.unwrap_or(ToolChoice::Auto),
        }
    }

    /// Run one turn over `history` (which already ends with the user's
    /// message). Stops issuing model steps as soon as `cancelled` is set.
    pub async fn run_turn(
        &self,
        tools: &dyn ToolExecutor,
        history: &[ChatMessage],
        cancelled: &AtomicBool,
    ) -> Result<TurnOutcome, AgentError> {
        let mut messages = history.to_vec();
        let turn_start = messages.len();
        let mut steps = Vec::new();
        let mut tool_records = Vec::new();
        let mut decisions = Vec::new();
        let mut final_text = String::new();
        let mut final_output = None;
        let mut directive = GuardDirective::none();
        let mut previous = None;
        let mut stop_reason = StopReason::StepBudget;

        for step_index in 0..self.max_steps {
            if cancelled.load(Ordering::Acquire) {
                stop_reason = StopReason::Cancelled;
                break;
            }

            // The directive applies to exactly one re-invocation.
            let request = self.step_request(&messages, &std::mem::take(&mut directive));
            let model_step = self.model.next_step(&request).await?;

            let outcomes = join_all(
                model_step
                    .tool_calls
                    .iter()
                    .map(|call| tools.execute(&call.name, &call.arguments)),
            )
            .await;

            messages.push(ChatMessage::Assistant {
                content: model_step.text.clone(),
                tool_calls: model_step.tool_calls.clone(),
            });
            let mut step = Step {
                text: model_step.text.clone(),
                ..Step::default()
            };
            for (call, outcome) in model_step.tool_calls.iter().zip(outcomes) {
                let payload = outcome_payload(&outcome);
                messages.push(ChatMessage::Tool {
                    tool_call_id: call.id.clone(),
                    name: call.name.clone(),
                    result: payload.clone(),
                });
                step.tool_calls.push(call.name.clone());
                step.tool_results.push(payload);
                tool_records.push(ToolRecord {
                    call: call.clone(),
                    outcome,
                });
            }

            if !model_step.text.trim().is_empty() {
                final_text = model_step.text.clone();
            }
            if model_step.output.is_some() {
                final_output = model_step.output.clone();
            }

            let signals = analyze_step(&step, &self.policy);
            let decision = select_guard(
                &signals,
                &TurnHistory {
                    step_index,
                    max_steps: self.max_steps,
                    previous,
                },
            );
            tracing::debug!(
                event = "agent_step",
                step = step_index,
                tool_calls = ?step.tool_calls,
                has_text = signals.has_text,
                text_length = signals.text_length,
                has_tool_results = signals.has_tool_results,
                has_ui_content = signals.has_ui_content,
                only_silent_tools = signals.only_silent_tools,
                decision = decision.state.as_str(),
                "agent step evaluated"
            );
            if decision.state != GuardState::Continue {
                tracing::info!(
                    event = "guard_directive",
                    step = step_index,
                    decision = decision.state.as_str(),
                    tool_choice = ?decision.directive.tool_choice,
                    "guard directive issued"
                );
            }

            let requested_tools = !step.tool_calls.is_empty();
            steps.push(step);
            decisions.push(decision.state);
            previous = Some(decision.state);

            if decision.state == GuardState::Continue {
                if !requested_tools {
                    stop_reason = StopReason::Completed;
                    break;
                }
            } else {
                directive = decision.directive;
            }
        }

        Ok(TurnOutcome {
            messages: messages.split_off(turn_start),
            steps,
            tool_records,
            decisions,
            final_text,
            final_output,
            stop_reason,
        })
    }
}
