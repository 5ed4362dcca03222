use fleet_assist_core::evidence::{ConnectorAnalysis, TargetCounts};
use serde_json::Value;

/// Resource bucket a policy target resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetBucket {
    OrgUnit,
    Group,
    Customer,
    Unknown,
}

const ORG_UNIT_SEGMENT: &str = "orgunits/";
const GROUP_SEGMENT: &str = "groups/";
const CUSTOMER_SEGMENT: &str = "customers/";

fn has_segment(target: &str, segment: &str) -> bool {
    target.starts_with(segment) || target.contains(&format!("/{segment}"))
}

/// Bucket a target resource name. Org units win over groups, groups over
/// customers.
pub fn bucket(target: &str) -> TargetBucket {
    let lowered = target.trim().to_ascii_lowercase();
    if has_segment(&lowered, ORG_UNIT_SEGMENT) {
        TargetBucket::OrgUnit
    } else if has_segment(&lowered, GROUP_SEGMENT) {
        TargetBucket::Group
    } else if has_segment(&lowered, CUSTOMER_SEGMENT) {
        TargetBucket::Customer
    } else {
        TargetBucket::Unknown
    }
}

/// Classify connector policy targets. Customer-level targets are mis-scoped:
/// connector policies must apply to org units or groups.
pub fn classify_targets<I, S>(targets: I) -> ConnectorAnalysis
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut by_target = TargetCounts::default();
    let mut sample_target = None;
    for target in targets {
        let target = target.as_ref();
        match bucket(target) {
            TargetBucket::OrgUnit => by_target.org_unit += 1,
            TargetBucket::Group => by_target.group += 1,
            TargetBucket::Unknown => by_target.unknown += 1,
            TargetBucket::Customer => {
                by_target.customer += 1;
                if sample_target.is_none() {
                    sample_target = Some(target.to_string());
                }
            }
        }
    }
    ConnectorAnalysis {
        total: by_target.sum(),
        by_target,
        mis_scoped: by_target.customer,
        flag: by_target.customer > 0,
        sample_target,
    }
}

/// Extract target resources from a connector configuration payload. Accepts
/// both `targetResource` and `policyTargetKey.targetResource` shapes; entries
/// with neither are counted as unknown.
pub fn policy_targets(payload: &Value) -> Vec<String> {
    let Some(policies) = payload
        .get("policies")
        .or_else(|| payload.get("resolvedPolicies"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };
    policies
        .iter()
        .map(|policy| {
            policy
                .get("targetResource")
                .or_else(|| policy.pointer("/policyTargetKey/targetResource"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}
