use fleet_assist_core::step::{GuardDirective, StepSignals};

pub const FORCE_STOP_DIRECTIVE: &str = "Your response is already complete. Do not call any more tools. \
End the turn now without repeating the answer you already gave.";
pub const NUDGE_COMPLETION_DIRECTIVE: &str = "You called tools but have not explained the results. \
Synthesize the tool results into a user-facing explanation: what the data shows, \
the most likely cause, and the next steps for the administrator.";
pub const NUDGE_ELABORATION_DIRECTIVE: &str = "Your last response was too brief for the evidence you collected. \
Give a fuller explanation: walk through what the tool results show, the most likely cause, \
and concrete next steps.";

/// Guard outcome for one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GuardState {
    Continue,
    NudgeCompletion,
    NudgeElaboration,
    ForceStop,
}

impl GuardState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardState::Continue => "continue",
            GuardState::NudgeCompletion => "nudge_completion",
            GuardState::NudgeElaboration => "nudge_elaboration",
            GuardState::ForceStop => "force_stop",
        }
    }

    fn directive(&self) -> GuardDirective {
        match self {
            GuardState::Continue => GuardDirective::none(),
            GuardState::NudgeCompletion => GuardDirective::system(NUDGE_COMPLETION_DIRECTIVE),
            GuardState::NudgeElaboration => GuardDirective::system(NUDGE_ELABORATION_DIRECTIVE),
            GuardState::ForceStop => GuardDirective::stop(FORCE_STOP_DIRECTIVE),
        }
    }
}

/// What the selector knows about the turn so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TurnHistory {
    /// Zero-based index of the step being judged
    pub step_index: usize,
    pub max_steps: usize,
    /// Decision taken for the previous step of this turn
    pub previous: Option<GuardState>,
}

impl TurnHistory {
    pub fn first(max_steps: usize) -> Self {
        Self {
            step_index: 0,
            max_steps,
            previous: None,
        }
    }

    fn is_final_step(&self) -> bool {
        self.step_index + 1 >= self.max_steps
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardDecision {
    pub state: GuardState,
    pub directive: GuardDirective,
}

/// Rule evaluation, first match wins. UI content and silent-tool detection
/// must precede the completion/elaboration nudges.
pub fn classify(signals: &StepSignals) -> GuardState {
    if signals.has_ui_content {
        return GuardState::Continue;
    }
    if !signals.has_tool_results && signals.has_text && signals.only_silent_tools {
        return GuardState::ForceStop;
    }
    if signals.has_tool_results && !signals.has_text {
        return GuardState::NudgeCompletion;
    }
    if signals.has_tool_results && signals.has_short_response {
        return GuardState::NudgeElaboration;
    }
    GuardState::Continue
}

/// Map step signals plus turn history to the directive for the next step.
///
/// History only ever suppresses an intervention: nothing is issued on the last
/// step of the budget, and the same intervention is not issued twice in a row.
pub fn select_guard(signals: &StepSignals, history: &TurnHistory) -> GuardDecision {
    let mut state = classify(signals);
    if state != GuardState::Continue
        && (history.is_final_step() || history.previous == Some(state))
    {
        state = GuardState::Continue;
    }
    GuardDecision {
        state,
        directive: state.directive(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_assist_core::step::ToolChoice;

    fn fresh() -> TurnHistory {
        TurnHistory::first(8)
    }

    /// Every combination of the boolean signals, with a text length that is
    /// consistent with `has_text` / `has_short_response`.
    fn all_signals() -> Vec<StepSignals> {
        let mut out = Vec::new();
        for bits in 0u8..64 {
            let bit = |n: u8| bits & (1 << n) != 0;
            let has_text = bit(1);
            let short = has_text && bit(2);
            out.push(StepSignals {
                has_tool_results: bit(0),
                has_text,
                text_length: match (has_text, short) {
                    (false, _) => 0,
                    (true, true) => 12,
                    (true, false) => 240,
                },
                has_short_response: short,
                has_ui_content: bit(3),
                only_silent_tools: bit(4),
                has_suggest_actions_call: bit(5),
            });
        }
        out
    }

    #[test]
    fn tool_results_without_text_nudge_completion() {
        for signals in all_signals().into_iter().filter(|s| {
            s.has_tool_results && !s.has_text && !s.has_ui_content
        }) {
            let decision = select_guard(&signals, &fresh());
            assert_eq!(decision.state, GuardState::NudgeCompletion, "{signals:?}");
            assert!(decision.directive.system.as_deref().is_some_and(|s| !s.is_empty()));
            assert_eq!(decision.directive.tool_choice, None);
        }
    }

    #[test]
    fn short_text_after_tool_results_nudges_elaboration() {
        for signals in all_signals().into_iter().filter(|s| {
            s.has_tool_results && s.has_text && s.text_length < 50 && !s.has_ui_content
        }) {
            let decision = select_guard(&signals, &fresh());
            assert_eq!(decision.state, GuardState::NudgeElaboration, "{signals:?}");
            let system = decision.directive.system.expect("elaboration carries system text");
            assert!(system.contains("brief"));
            assert_eq!(decision.directive.tool_choice, None);
        }
    }

    #[test]
    fn ui_content_always_continues() {
        for signals in all_signals().into_iter().filter(|s| s.has_ui_content) {
            let decision = select_guard(&signals, &fresh());
            assert_eq!(decision.state, GuardState::Continue, "{signals:?}");
            assert!(decision.directive.is_empty());
        }
    }

    #[test]
    fn text_with_only_silent_tools_forces_stop() {
        for signals in all_signals().into_iter().filter(|s| {
            !s.has_tool_results && s.has_text && s.only_silent_tools && !s.has_ui_content
        }) {
            let decision = select_guard(&signals, &fresh());
            assert_eq!(decision.state, GuardState::ForceStop, "{signals:?}");
            assert_eq!(decision.directive.tool_choice, Some(ToolChoice::None));
            assert!(
                decision
                    .directive
                    .system
                    .as_deref()
                    .is_some_and(|s| s.contains("already complete"))
            );
        }
    }

    #[test]
    fn empty_step_continues() {
        let decision = select_guard(&StepSignals::default(), &fresh());
        assert_eq!(decision.state, GuardState::Continue);
        assert!(decision.directive.is_empty());
    }

    #[test]
    fn substantive_answer_after_tools_continues() {
        let signals = StepSignals {
            has_tool_results: true,
            has_text: true,
            text_length: 400,
            ..StepSignals::default()
        };
        assert_eq!(select_guard(&signals, &fresh()).state, GuardState::Continue);
    }

    #[test]
    fn selection_is_idempotent() {
        let history = TurnHistory {
            step_index: 2,
            max_steps: 8,
            previous: Some(GuardState::Continue),
        };
        for signals in all_signals() {
            assert_eq!(
                select_guard(&signals, &history),
                select_guard(&signals, &history)
            );
        }
    }

    #[test]
    fn final_step_never_intervenes() {
        let signals = StepSignals {
            has_tool_results: true,
            ..StepSignals::default()
        };
        let history = TurnHistory {
            step_index: 7,
            max_steps: 8,
            previous: None,
        };
        assert_eq!(select_guard(&signals, &history).state, GuardState::Continue);
    }

    #[test]
    fn same_nudge_is_not_repeated_back_to_back() {
        let signals = StepSignals {
            has_tool_results: true,
            ..StepSignals::default()
        };
        let after_nudge = TurnHistory {
            step_index: 1,
            max_steps: 8,
            previous: Some(GuardState::NudgeCompletion),
        };
        assert_eq!(select_guard(&signals, &after_nudge).state, GuardState::Continue);

        let after_other = TurnHistory {
            previous: Some(GuardState::NudgeElaboration),
            ..after_nudge
        };
        assert_eq!(
            select_guard(&signals, &after_other).state,
            GuardState::NudgeCompletion
        );
    }
}
