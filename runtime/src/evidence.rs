use chrono::{DateTime, Utc};
use fleet_assist_core::evidence::{Check, CheckStatus, EvidenceBundle, Gap, Signal};
use serde_json::Value;

use crate::agent_loop::ToolRecord;
use crate::connectors::{classify_targets, policy_targets};
use crate::signals::GuardPolicy;
use crate::tools::{
    CHROME_EVENTS_TOOL, CONNECTOR_CONFIG_TOOL, DLP_RULES_TOOL, FLEET_OVERVIEW_TOOL, ORG_UNITS_TOOL,
};

pub const CONNECTOR_SCOPE_REFERENCE_URL: &str =
    "https://support.google.com/chrome/a/search?q=chrome+enterprise+connectors+org+unit+scope";

/// What one evidentiary tool contributes to the bundle.
struct EvidenceSource {
    tool: &'static str,
    check: &'static str,
    /// Array fields holding the records, tried in order. Empty when the
    /// payload is a single object.
    list_fields: &'static [&'static str],
    /// Status for successful but empty data
    when_empty: CheckStatus,
    missing: &'static str,
}

const CATALOGUE: [EvidenceSource; 5] = [
    EvidenceSource {
        tool: CHROME_EVENTS_TOOL,
        check: "recent_events",
        list_fields: &["events"],
        when_empty: CheckStatus::Unknown,
        missing: "Chrome audit events",
    },
    EvidenceSource {
        tool: DLP_RULES_TOOL,
        check: "dlp_rules_present",
        list_fields: &["rules"],
        when_empty: CheckStatus::Fail,
        missing: "DLP rule inventory",
    },
    EvidenceSource {
        tool: CONNECTOR_CONFIG_TOOL,
        check: "connector_scope",
        list_fields: &["policies", "resolvedPolicies"],
        when_empty: CheckStatus::Fail,
        missing: "Connector policy configuration",
    },
    EvidenceSource {
        tool: ORG_UNITS_TOOL,
        check: "org_units",
        list_fields: &["orgUnits"],
        when_empty: CheckStatus::Unknown,
        missing: "Org unit hierarchy",
    },
    EvidenceSource {
        tool: FLEET_OVERVIEW_TOOL,
        check: "fleet_overview",
        list_fields: &[],
        when_empty: CheckStatus::Unknown,
        missing: "Fleet enrollment overview",
    },
];

fn source_for(tool: &str) -> Option<&'static EvidenceSource> {
    CATALOGUE.iter().find(|source| source.tool == tool)
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn records<'a>(payload: &'a Value, field: &str) -> &'a [Value] {
    first_records(payload, &[field])
}

/// Records under the first of `fields` present in `payload`, or the payload
/// itself when it is a bare array.
fn first_records<'a>(payload: &'a Value, fields: &[&str]) -> &'a [Value] {
    fields
        .iter()
        .find_map(|field| payload.get(*field))
        .unwrap_or(payload)
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn str_field<'a>(value: &'a Value, field: &str) -> &'a str {
    value.get(field).and_then(Value::as_str).unwrap_or("unknown")
}

fn event_time(event: &Value) -> Option<DateTime<Utc>> {
    event
        .get("time")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|time| time.with_timezone(&Utc))
}

fn events_signal(payload: &Value) -> Option<Signal> {
    let latest = records(payload, "events")
        .iter()
        .max_by_key(|event| event_time(event))?;
    let mut summary = format!(
        "Most recent event: {} for {} on {} at {}",
        str_field(latest, "eventType"),
        str_field(latest, "userEmail"),
        str_field(latest, "deviceName"),
        str_field(latest, "time"),
    );
    if let Some(result) = latest.get("result").and_then(Value::as_str) {
        summary.push_str(&format!(" ({result})"));
    }
    Some(signal("recent_event", CHROME_EVENTS_TOOL, summary))
}

fn dlp_signal(payload: &Value) -> Signal {
    let rules = records(payload, "rules");
    let names: Vec<&str> = rules
        .iter()
        .filter_map(|rule| {
            rule.get("displayName")
                .or_else(|| rule.get("name"))
                .and_then(Value::as_str)
        })
        .take(3)
        .collect();
    let summary = if names.is_empty() {
        format!("{} DLP rules configured", rules.len())
    } else {
        format!("{} DLP rules configured: {}", rules.len(), names.join(", "))
    };
    signal("dlp_rules", DLP_RULES_TOOL, summary)
}

fn org_units_signal(payload: &Value) -> Signal {
    let units = records(payload, "orgUnits");
    let paths: Vec<&str> = units
        .iter()
        .filter_map(|unit| unit.get("orgUnitPath").and_then(Value::as_str))
        .take(5)
        .collect();
    signal(
        "org_units",
        ORG_UNITS_TOOL,
        format!("{} org units: {}", units.len(), paths.join(", ")),
    )
}

fn fleet_signal(payload: &Value) -> Signal {
    let count = |field: &str| payload.get(field).and_then(Value::as_u64).unwrap_or(0);
    signal(
        "fleet_overview",
        FLEET_OVERVIEW_TOOL,
        format!(
            "{} enrolled browsers, {} active",
            count("enrolledBrowsers"),
            count("activeBrowsers")
        ),
    )
}

fn signal(kind: &str, source: &str, summary: String) -> Signal {
    Signal {
        kind: kind.to_string(),
        source: source.to_string(),
        summary,
        reference_url: None,
    }
}

/// Normalize raw tool outcomes into an evidence bundle. Silent tools carry no
/// evidence and are skipped; failures become `unknown` checks plus a gap.
pub fn build_evidence(tool_records: &[ToolRecord], policy: &GuardPolicy) -> EvidenceBundle {
    let mut bundle = EvidenceBundle::default();
    let mut connector_targets = Vec::new();

    for record in tool_records {
        let tool = record.call.name.as_str();
        if policy.is_silent(tool) {
            continue;
        }
        if !bundle.sources.iter().any(|seen| seen == tool) {
            bundle.sources.push(tool.to_string());
        }
        let source = source_for(tool);
        let check_name = source.map_or(tool, |source| source.check).to_string();

        let data = match &record.outcome {
            Ok(data) => data,
            Err(failure) => {
                bundle.checks.push(Check {
                    name: check_name,
                    status: CheckStatus::Unknown,
                    source: tool.to_string(),
                    detail: failure.message.clone(),
                });
                bundle.gaps.push(Gap {
                    missing: source.map_or(tool, |source| source.missing).to_string(),
                    why: failure.message.clone(),
                });
                continue;
            }
        };

        let Some(source) = source else {
            // Uncatalogued tool: record presence only.
            let empty = is_empty_value(data);
            bundle.checks.push(Check {
                name: check_name,
                status: if empty {
                    CheckStatus::Unknown
                } else {
                    CheckStatus::Pass
                },
                source: tool.to_string(),
                detail: if empty { "no data returned" } else { "data returned" }.to_string(),
            });
            continue;
        };

        let count = if source.list_fields.is_empty() {
            usize::from(!is_empty_value(data))
        } else {
            first_records(data, source.list_fields).len()
        };
        if count == 0 {
            bundle.checks.push(Check {
                name: check_name,
                status: source.when_empty,
                source: tool.to_string(),
                detail: format!("{} returned no records", source.missing),
            });
            continue;
        }

        let mut status = CheckStatus::Pass;
        let detail = format!("{count} records");
        match tool {
            CHROME_EVENTS_TOOL => bundle.signals.extend(events_signal(data)),
            DLP_RULES_TOOL => bundle.signals.push(dlp_signal(data)),
            ORG_UNITS_TOOL => bundle.signals.push(org_units_signal(data)),
            FLEET_OVERVIEW_TOOL => bundle.signals.push(fleet_signal(data)),
            CONNECTOR_CONFIG_TOOL => {
                let targets = policy_targets(data);
                if classify_targets(&targets).flag {
                    status = CheckStatus::Fail;
                }
                connector_targets.extend(targets);
            }
            _ => {}
        }
        bundle.checks.push(Check {
            name: check_name,
            status,
            source: tool.to_string(),
            detail,
        });
    }

    let analysis = classify_targets(&connector_targets);
    if analysis.total > 0 {
        let summary = match &analysis.sample_target {
            Some(sample) => format!(
                "{} of {} connector policies target the whole customer (e.g. {sample}); \
connector policies apply only when scoped to org units or groups",
                analysis.mis_scoped, analysis.total
            ),
            None => format!(
                "All {} connector policies are scoped to org units or groups",
                analysis.total
            ),
        };
        bundle.signals.push(Signal {
            kind: "connector_scope".to_string(),
            source: CONNECTOR_CONFIG_TOOL.to_string(),
            summary,
            reference_url: Some(CONNECTOR_SCOPE_REFERENCE_URL.to_string()),
        });
    }
    bundle.connector_analysis = analysis;
    bundle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolFailure;
    use fleet_assist_core::step::ToolCall;
    use serde_json::json;

    fn record(name: &str, outcome: Result<Value, ToolFailure>) -> ToolRecord {
        ToolRecord {
            call: ToolCall {
                id: format!("call-{name}"),
                name: name.to_string(),
                arguments: json!({}),
            },
            outcome,
        }
    }

    fn check<'a>(bundle: &'a EvidenceBundle, name: &str) -> &'a Check {
        bundle
            .checks
            .iter()
            .find(|check| check.name == name)
            .expect("check present")
    }

    #[test]
    fn successful_outcomes_pass_and_summarize() {
        let bundle = build_evidence(
            &[
                record(
                    CHROME_EVENTS_TOOL,
                    Ok(json!({ "events": [
                        { "eventType": "LOGIN_EVENT", "time": "2026-10-18T15:00:00Z", "userEmail": "a@example.com", "deviceName": "d1" },
                        { "eventType": "CONTENT_TRANSFER", "time": "2026-10-18T16:00:00Z", "userEmail": "b@example.com", "deviceName": "d2", "result": "BLOCKED" }
                    ]})),
                ),
                record(DLP_RULES_TOOL, Ok(json!({ "rules": [{ "displayName": "Block SSN" }] }))),
            ],
            &GuardPolicy::default(),
        );
        assert_eq!(check(&bundle, "recent_events").status, CheckStatus::Pass);
        assert_eq!(check(&bundle, "dlp_rules_present").status, CheckStatus::Pass);
        assert!(bundle.gaps.is_empty());
        assert!(bundle.signals[0].summary.contains("CONTENT_TRANSFER"));
        assert!(bundle.signals[0].summary.contains("BLOCKED"));
        assert_eq!(bundle.signals[1].summary, "1 DLP rules configured: Block SSN");
    }

    #[test]
    fn empty_dlp_rules_fail_but_empty_events_are_unknown() {
        let bundle = build_evidence(
            &[
                record(DLP_RULES_TOOL, Ok(json!({ "rules": [] }))),
                record(CHROME_EVENTS_TOOL, Ok(json!({ "events": [] }))),
            ],
            &GuardPolicy::default(),
        );
        assert_eq!(check(&bundle, "dlp_rules_present").status, CheckStatus::Fail);
        assert_eq!(check(&bundle, "recent_events").status, CheckStatus::Unknown);
        assert!(bundle.signals.is_empty());
    }

    #[test]
    fn failures_become_unknown_checks_with_gaps() {
        let bundle = build_evidence(
            &[record(
                DLP_RULES_TOOL,
                Err(ToolFailure::new(DLP_RULES_TOOL, "403: missing scope")),
            )],
            &GuardPolicy::default(),
        );
        let dlp = check(&bundle, "dlp_rules_present");
        assert_eq!(dlp.status, CheckStatus::Unknown);
        assert_eq!(dlp.detail, "403: missing scope");
        assert_eq!(
            bundle.gaps,
            vec![Gap {
                missing: "DLP rule inventory".to_string(),
                why: "403: missing scope".to_string()
            }]
        );
        assert_eq!(bundle.sources, vec![DLP_RULES_TOOL.to_string()]);
    }

    #[test]
    fn mis_scoped_connectors_fail_and_reference_docs() {
        let bundle = build_evidence(
            &[record(
                CONNECTOR_CONFIG_TOOL,
                Ok(json!({ "policies": [
                    { "targetResource": "orgunits/abc" },
                    { "targetResource": "customers/C123" },
                    { "targetResource": "groups/xyz" }
                ]})),
            )],
            &GuardPolicy::default(),
        );
        assert_eq!(check(&bundle, "connector_scope").status, CheckStatus::Fail);
        let analysis = &bundle.connector_analysis;
        assert_eq!(analysis.total, 3);
        assert!(analysis.flag);
        assert_eq!(analysis.sample_target.as_deref(), Some("customers/C123"));
        let connector_signal = bundle
            .signals
            .iter()
            .find(|signal| signal.kind == "connector_scope")
            .expect("connector signal");
        assert_eq!(
            connector_signal.reference_url.as_deref(),
            Some(CONNECTOR_SCOPE_REFERENCE_URL)
        );
    }

    #[test]
    fn resolved_policies_are_classified_like_policies() {
        let bundle = build_evidence(
            &[record(
                CONNECTOR_CONFIG_TOOL,
                Ok(json!({ "resolvedPolicies": [
                    { "targetResource": "orgunits/abc" },
                    { "policyTargetKey": { "targetResource": "customers/C123" } }
                ]})),
            )],
            &GuardPolicy::default(),
        );
        let connector = check(&bundle, "connector_scope");
        assert_eq!(connector.status, CheckStatus::Fail);
        assert_eq!(connector.detail, "2 records");
        assert_eq!(bundle.connector_analysis.total, 2);
        assert!(bundle.connector_analysis.flag);
        assert_eq!(
            bundle.connector_analysis.sample_target.as_deref(),
            Some("customers/C123")
        );
    }

    #[test]
    fn org_unit_scoped_resolved_policies_pass() {
        let bundle = build_evidence(
            &[record(
                CONNECTOR_CONFIG_TOOL,
                Ok(json!({ "resolvedPolicies": [
                    { "policyTargetKey": { "targetResource": "orgunits/finance" } }
                ]})),
            )],
            &GuardPolicy::default(),
        );
        assert_eq!(check(&bundle, "connector_scope").status, CheckStatus::Pass);
        assert_eq!(bundle.connector_analysis.total, 1);
        assert!(!bundle.connector_analysis.flag);
    }

    #[test]
    fn silent_tools_are_skipped_and_sources_deduplicated() {
        let bundle = build_evidence(
            &[
                record("suggestActions", Ok(json!({ "actions": ["x"] }))),
                record(ORG_UNITS_TOOL, Ok(json!({ "orgUnits": [{ "orgUnitPath": "/Finance" }] }))),
                record(ORG_UNITS_TOOL, Ok(json!({ "orgUnits": [] }))),
                record(FLEET_OVERVIEW_TOOL, Ok(json!({ "enrolledBrowsers": 3, "activeBrowsers": 2 }))),
            ],
            &GuardPolicy::default(),
        );
        assert_eq!(
            bundle.sources,
            vec![ORG_UNITS_TOOL.to_string(), FLEET_OVERVIEW_TOOL.to_string()]
        );
        assert_eq!(bundle.checks.len(), 3);
        assert!(bundle
            .signals
            .iter()
            .any(|signal| signal.summary == "3 enrolled browsers, 2 active"));
        assert_eq!(bundle.connector_analysis.total, 0);
        assert!(!bundle.connector_analysis.flag);
    }

    #[test]
    fn uncatalogued_tools_record_presence() {
        let bundle = build_evidence(
            &[record("getDeviceDetails", Ok(json!({ "serial": "X1" })))],
            &GuardPolicy::default(),
        );
        assert_eq!(check(&bundle, "getDeviceDetails").status, CheckStatus::Pass);
    }

    #[test]
    fn no_outcomes_yield_an_empty_bundle() {
        assert_eq!(
            build_evidence(&[], &GuardPolicy::default()),
            EvidenceBundle::default()
        );
    }
}
