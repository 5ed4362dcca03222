use fleet_assist_core::diagnosis::{DiagnosisResponse, Hypothesis, ModelDiagnosis, Reference};
use fleet_assist_core::evidence::EvidenceBundle;
use serde_json::Value;

use crate::agent_loop::TurnOutcome;
use crate::credentials::AuthFailure;

pub const AUTH_FALLBACK_CONFIDENCE: f64 = 0.1;

fn decode_output(output: Option<&Value>) -> Option<ModelDiagnosis> {
    let output = output?;
    match serde_json::from_value::<ModelDiagnosis>(output.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!(
                event = "model_output_undecodable",
                error = %e,
                "structured model output ignored"
            );
            None
        }
    }
}

fn clamp_confidence(mut hypothesis: Hypothesis) -> Hypothesis {
    hypothesis.confidence = if hypothesis.confidence.is_finite() {
        hypothesis.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    hypothesis
}

/// Combine collected evidence, at most one reference, and the model's final
/// output into the response contract.
pub fn assemble(
    outcome: &TurnOutcome,
    evidence: EvidenceBundle,
    reference: Option<Reference>,
) -> DiagnosisResponse {
    let parsed = decode_output(outcome.final_output.as_ref()).unwrap_or_default();
    let final_text = outcome.final_text.trim();
    let diagnosis = parsed
        .diagnosis
        .filter(|text| !text.trim().is_empty())
        .or_else(|| (!final_text.is_empty()).then(|| final_text.to_string()));

    DiagnosisResponse {
        diagnosis,
        hypotheses: parsed.hypotheses.into_iter().map(clamp_confidence).collect(),
        next_steps: parsed.next_steps,
        actions_requiring_confirmation: parsed.actions_requiring_confirmation,
        plan_steps: parsed.plan_steps,
        missing_questions: parsed.missing_questions,
        evidence,
        reference,
    }
}

/// Deterministic answer when no credential could be obtained. Nothing was
/// collected, so the evidence bundle stays empty.
pub fn auth_fallback(failure: &AuthFailure) -> DiagnosisResponse {
    DiagnosisResponse {
        diagnosis: Some(
            "Unable to access the administrative APIs with the supplied credentials.".to_string(),
        ),
        hypotheses: vec![Hypothesis {
            cause: failure.to_string(),
            confidence: AUTH_FALLBACK_CONFIDENCE,
            evidence: Vec::new(),
        }],
        next_steps: vec![
            "Sign in again and retry the request.".to_string(),
            "Confirm the account has Chrome management read access.".to_string(),
        ],
        ..DiagnosisResponse::default()
    }
}

/// Fixed synthetic response served to automated UI tests.
pub fn test_bypass_diagnosis() -> DiagnosisResponse {
    DiagnosisResponse {
        diagnosis: Some("Test bypass: synthetic diagnosis, no tools were called.".to_string()),
        hypotheses: vec![Hypothesis {
            cause: "Synthetic hypothesis for end-to-end tests".to_string(),
            confidence: 0.5,
            evidence: Vec::new(),
        }],
        next_steps: vec!["No action required.".to_string()],
        ..DiagnosisResponse::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_loop::StopReason;
    use serde_json::json;

    fn outcome(final_text: &str, final_output: Option<Value>) -> TurnOutcome {
        TurnOutcome {
            messages: Vec::new(),
            steps: Vec::new(),
            tool_records: Vec::new(),
            decisions: Vec::new(),
            final_text: final_text.to_string(),
            final_output,
            stop_reason: StopReason::Completed,
        }
    }

    #[test]
    fn structured_output_fills_the_contract() {
        let response = assemble(
            &outcome(
                "ignored prose",
                Some(json!({
                    "diagnosis": "Connector is customer-scoped",
                    "hypotheses": [
                        { "cause": "Customer-level connector", "confidence": 1.7, "evidence": ["connector_scope"] },
                        { "cause": "Rule disabled", "confidence": -0.2 }
                    ],
                    "nextSteps": ["Re-scope the connector to /Finance"],
                    "actionsRequiringConfirmation": ["Move policy"],
                    "missingQuestions": [{ "question": "Which OU is affected?" }]
                })),
            ),
            EvidenceBundle::default(),
            None,
        );
        assert_eq!(response.diagnosis.as_deref(), Some("Connector is customer-scoped"));
        assert_eq!(response.hypotheses[0].confidence, 1.0);
        assert_eq!(response.hypotheses[1].confidence, 0.0);
        assert_eq!(response.next_steps, vec!["Re-scope the connector to /Finance"]);
        assert_eq!(response.missing_questions[0].question, "Which OU is affected?");
    }

    #[test]
    fn final_text_becomes_diagnosis_without_structured_output() {
        let response = assemble(
            &outcome("  The connector targets the customer.  ", None),
            EvidenceBundle::default(),
            Some(Reference {
                title: "Chrome Enterprise connectors".to_string(),
                url: "https://support.google.com/chrome/a".to_string(),
            }),
        );
        assert_eq!(
            response.diagnosis.as_deref(),
            Some("The connector targets the customer.")
        );
        assert!(response.hypotheses.is_empty());
        assert!(response.reference.is_some());
    }

    #[test]
    fn undecodable_output_falls_back_to_text() {
        let response = assemble(
            &outcome("plain answer", Some(json!({ "hypotheses": "not a list" }))),
            EvidenceBundle::default(),
            None,
        );
        assert_eq!(response.diagnosis.as_deref(), Some("plain answer"));
    }

    #[test]
    fn auth_fallback_is_low_confidence_with_no_evidence() {
        let response = auth_fallback(&AuthFailure::Rejected("token expired".to_string()));
        assert_eq!(response.hypotheses.len(), 1);
        assert_eq!(response.hypotheses[0].confidence, AUTH_FALLBACK_CONFIDENCE);
        assert!(response.hypotheses[0].cause.contains("token expired"));
        assert_eq!(response.evidence, EvidenceBundle::default());
        assert!(response.reference.is_none());
    }

    #[test]
    fn empty_turn_yields_no_diagnosis() {
        let response = assemble(&outcome("", None), EvidenceBundle::default(), None);
        assert!(response.diagnosis.is_none());
    }
}
