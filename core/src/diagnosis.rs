use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::evidence::EvidenceBundle;

/// A candidate root cause with a confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Hypothesis {
    pub cause: String,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
}

/// Something the assistant needs the administrator to answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MissingQuestion {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Reference {
    pub title: String,
    pub url: String,
}

/// Structured output of the model's final step. Every field is optional on the
/// wire so a partial answer still decodes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelDiagnosis {
    pub diagnosis: Option<String>,
    pub hypotheses: Vec<Hypothesis>,
    pub next_steps: Vec<String>,
    pub actions_requiring_confirmation: Vec<String>,
    pub plan_steps: Vec<String>,
    pub missing_questions: Vec<MissingQuestion>,
}

/// The diagnosis payload returned to the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    pub hypotheses: Vec<Hypothesis>,
    pub next_steps: Vec<String>,
    pub actions_requiring_confirmation: Vec<String>,
    pub plan_steps: Vec<String>,
    pub missing_questions: Vec<MissingQuestion>,
    pub evidence: EvidenceBundle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
}
