use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Outcome of a single evidence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Check {
    pub name: String,
    pub status: CheckStatus,
    /// Tool that produced the data behind this check
    pub source: String,
    pub detail: String,
}

/// Evidence that could not be collected, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Gap {
    pub missing: String,
    pub why: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    /// Signal kind (e.g. "recent_event", "dlp_rules", "connector_scope")
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_url: Option<String>,
}

/// Policy target counts per resource bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetCounts {
    pub customer: usize,
    pub org_unit: usize,
    pub group: usize,
    pub unknown: usize,
}

impl TargetCounts {
    pub fn sum(&self) -> usize {
        self.customer + self.org_unit + self.group + self.unknown
    }
}

/// Scope breakdown of connector policies. Constructed only by the classifier,
/// so `by_target` always sums to `total` and `flag == (mis_scoped > 0)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorAnalysis {
    pub total: usize,
    pub by_target: TargetCounts,
    pub mis_scoped: usize,
    pub flag: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_target: Option<String>,
}

/// Normalized evidence for one request. Built fresh, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceBundle {
    pub checks: Vec<Check>,
    pub gaps: Vec<Gap>,
    pub signals: Vec<Signal>,
    /// Tools consulted, in first-use order, without duplicates
    pub sources: Vec<String>,
    pub connector_analysis: ConnectorAnalysis,
}
