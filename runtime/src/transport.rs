use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fleet_assist_core::step::ChatMessage;
use tokio::sync::Mutex as TurnGate;

use crate::agent_loop::{AgentError, AgentLoop, TurnOutcome};
use crate::sessions::{SessionTransport, TransportError};
use crate::tools::ToolExecutor;

/// Per-session conversation state: the transcript so far and the tool backend
/// bound to the session's credential. Turns on one session run one at a time.
pub struct AgentTransport {
    history: Mutex<Vec<ChatMessage>>,
    turn_gate: TurnGate<()>,
    tools: Arc<dyn ToolExecutor>,
    closed: AtomicBool,
}

impl AgentTransport {
    pub fn new(tools: Arc<dyn ToolExecutor>) -> Self {
        Self {
            history: Mutex::new(Vec::new()),
            turn_gate: TurnGate::new(()),
            tools,
            closed: AtomicBool::new(false),
        }
    }

    /// Run one turn for `message`. A concurrent turn on the same session waits
    /// for this one, so it sees the messages appended here. The history lock is
    /// released while the loop runs.
    pub async fn run_turn(
        &self,
        agent: &AgentLoop,
        message: &str,
    ) -> Result<TurnOutcome, AgentError> {
        let _turn = self.turn_gate.lock().await;
        let user = ChatMessage::user(message);
        let mut snapshot = self.transcript();
        snapshot.push(user.clone());

        let outcome = agent
            .run_turn(self.tools.as_ref(), &snapshot, &self.closed)
            .await?;

        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.push(user);
        history.extend(outcome.messages.iter().cloned());
        Ok(outcome)
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl SessionTransport for AgentTransport {
    async fn shutdown(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(TransportError("transport already closed".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixtureToolExecutor;
    use crate::model::{ModelStep, ScriptedModel};
    use crate::signals::GuardPolicy;
    use fleet_assist_core::step::ToolCall;
    use serde_json::json;

    fn agent(steps: Vec<ModelStep>) -> (Arc<ScriptedModel>, AgentLoop) {
        let model = Arc::new(ScriptedModel::new(steps));
        let agent = AgentLoop::new(model.clone(), Arc::new(GuardPolicy::default()), 8);
        (model, agent)
    }

    #[tokio::test]
    async fn turns_accumulate_in_the_transcript() {
        let (model, agent) = agent(vec![
            ModelStep::calls(vec![ToolCall {
                id: "c1".to_string(),
                name: "listDLPRules".to_string(),
                arguments: json!({}),
            }]),
            ModelStep::text("Two DLP rules exist and both target the Finance org unit."),
            ModelStep::text("Yes, the block rule fired for the Finance user yesterday."),
        ]);
        let transport = AgentTransport::new(Arc::new(FixtureToolExecutor::canned()));

        transport
            .run_turn(&agent, "Which DLP rules exist?")
            .await
            .expect("first turn");
        assert_eq!(transport.transcript().len(), 4);

        transport
            .run_turn(&agent, "Did one fire?")
            .await
            .expect("second turn");
        let transcript = transport.transcript();
        assert_eq!(transcript.len(), 6);
        assert_eq!(transcript[4], ChatMessage::user("Did one fire?"));

        // The second turn's model request saw the whole conversation.
        let requests = model.requests();
        assert_eq!(requests.last().map(|r| r.messages.len()), Some(5));
    }

    #[tokio::test]
    async fn concurrent_turns_on_one_session_run_in_order() {
        let (model, agent) = agent(vec![
            ModelStep::text("The DLP rule blocked the upload for the Finance org unit."),
            ModelStep::text("It fired once yesterday at 16:00 for the Finance user."),
        ]);
        let transport = AgentTransport::new(Arc::new(FixtureToolExecutor::canned()));

        let (first, second) = tokio::join!(
            transport.run_turn(&agent, "Why was the upload blocked?"),
            transport.run_turn(&agent, "When did it fire?"),
        );
        first.expect("first turn");
        second.expect("second turn");

        let transcript = transport.transcript();
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript[0], ChatMessage::user("Why was the upload blocked?"));
        assert_eq!(transcript[2], ChatMessage::user("When did it fire?"));

        // The later turn was built on top of the earlier one.
        let sizes: Vec<usize> = model.requests().iter().map(|r| r.messages.len()).collect();
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[1], sizes[0] + 2);
    }

    #[tokio::test]
    async fn closed_transport_stops_issuing_steps() {
        let (model, agent) = agent(vec![ModelStep::text("unused")]);
        let transport = AgentTransport::new(Arc::new(FixtureToolExecutor::canned()));
        transport.shutdown().await.expect("first shutdown");
        assert!(transport.is_closed());
        transport
            .run_turn(&agent, "anything")
            .await
            .expect("turn returns");
        assert!(model.requests().is_empty());
    }

    #[tokio::test]
    async fn second_shutdown_reports_an_error() {
        let transport = AgentTransport::new(Arc::new(FixtureToolExecutor::canned()));
        assert!(transport.shutdown().await.is_ok());
        assert!(transport.shutdown().await.is_err());
    }

    #[tokio::test]
    async fn failed_turn_leaves_history_untouched() {
        let (_, agent) = agent(Vec::new());
        let transport = AgentTransport::new(Arc::new(FixtureToolExecutor::canned()));
        assert!(transport.run_turn(&agent, "hello").await.is_err());
        assert!(transport.transcript().is_empty());
    }
}
