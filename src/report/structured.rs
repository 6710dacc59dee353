//! Structured writer output.
//!
//! Writers are asked for markdown, but some return a JSON report instead. Such
//! output is validated against [`report_schema`], repaired when invalid, and
//! rendered deterministically back to markdown so the section parser sees one
//! format.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, warn};

use super::actions::{validate_target_days, validate_target_percent, ActionItem, Level};
use crate::agent::capture_json;

const ACTION_COUNT: usize = 5;
const MAX_EXEC_SUMMARY: usize = 6;
const MAX_FINDINGS: usize = 10;
const MAX_GAPS: usize = 8;
const MAX_SOURCES: usize = 10;
const MAX_BULLET_CHARS: usize = 240;
const MAX_SUMMARY_CHARS: usize = 300;

const SUMMARY_PLACEHOLDER: &str =
    "Insufficient data - expand search scope to generate comprehensive summary.";

/// A cited source in a structured report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredSource {
    #[serde(default)]
    pub url: Option<String>,
    pub citation: String,
}

/// The JSON shape of a complete brief.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub short_summary: String,
    pub actions: Vec<ActionItem>,
    pub exec_summary: Vec<String>,
    pub findings: Vec<String>,
    pub gaps: Vec<String>,
    pub sources: Vec<StructuredSource>,
}

fn default_schema_version() -> String {
    "1.0".to_string()
}

/// JSON schema for [`StructuredReport`].
pub fn report_schema() -> Value {
    json!({
        "type": "object",
        "required": ["short_summary", "actions", "exec_summary", "findings", "gaps", "sources"],
        "properties": {
            "schema_version": { "const": "1.0" },
            "short_summary": { "type": "string", "minLength": 20, "maxLength": MAX_SUMMARY_CHARS },
            "actions": {
                "type": "array", "minItems": ACTION_COUNT, "maxItems": ACTION_COUNT,
                "items": {
                    "type": "object",
                    "required": ["title", "kpi", "target_percent", "target_days", "how_steps", "tools", "effort", "impact"],
                    "properties": {
                        "title": { "type": "string", "minLength": 8, "maxLength": 120 },
                        "kpi": { "type": "string", "minLength": 3, "maxLength": 60 },
                        "target_percent": { "type": "string", "pattern": "^([+-]?\\d+%|complete)$" },
                        "target_days": { "enum": [14, 30, 60, 90] },
                        "how_steps": { "type": "array", "items": { "type": "string" }, "minItems": 3, "maxItems": 3 },
                        "tools": { "type": "array", "items": { "type": "string" }, "minItems": 3, "maxItems": 3 },
                        "effort": { "enum": ["L", "M", "H"] },
                        "impact": { "enum": ["L", "M", "H"] }
                    }
                }
            },
            "exec_summary": { "type": "array", "items": { "type": "string" }, "minItems": 4, "maxItems": MAX_EXEC_SUMMARY },
            "findings": { "type": "array", "items": { "type": "string" }, "minItems": 6, "maxItems": MAX_FINDINGS },
            "gaps": { "type": "array", "items": { "type": "string" }, "minItems": 3, "maxItems": MAX_GAPS },
            "sources": {
                "type": "array", "minItems": 2, "maxItems": MAX_SOURCES,
                "items": {
                    "type": "object",
                    "required": ["citation"],
                    "properties": {
                        "url": { "type": ["string", "null"] },
                        "citation": { "type": "string", "minLength": 3, "maxLength": 200 }
                    }
                }
            }
        }
    })
}

fn schema_validator() -> &'static jsonschema::Validator {
    static VALIDATOR: OnceLock<jsonschema::Validator> = OnceLock::new();
    VALIDATOR.get_or_init(|| {
        jsonschema::validator_for(&report_schema()).expect("report schema must compile")
    })
}

/// Schema violations of a candidate report, as messages.
pub fn schema_errors(value: &Value) -> Vec<String> {
    schema_validator()
        .iter_errors(value)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect()
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(as_text).collect(),
        _ => Vec::new(),
    }
}

/// Trim, truncate, drop empties and exact repeats, cap the count.
fn dedupe_bullets(items: Vec<String>, max_chars: usize, cap: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|s| truncate(s.trim(), max_chars))
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .take(cap)
        .collect()
}

fn padded(mut items: Vec<String>, filler: &str, len: usize) -> Vec<String> {
    items.truncate(len);
    while items.len() < len {
        items.push(filler.to_string());
    }
    items
}

fn placeholder_action(title: String) -> ActionItem {
    ActionItem {
        title,
        kpi: "completion".to_string(),
        target_percent: "+10%".to_string(),
        target_days: 30,
        how_steps: vec![
            "Gather additional data".to_string(),
            "Analyze findings".to_string(),
            "Implement recommendations".to_string(),
        ],
        tools: padded(Vec::new(), "Tool TBD", 3),
        effort: Level::Medium,
        impact: Level::Medium,
    }
}

fn repair_action(index: usize, value: &Value) -> ActionItem {
    let Some(obj) = value.as_object() else {
        return placeholder_action(format!("Action {} - data incomplete", index + 1));
    };

    // Older writers emitted an absolute `target_by` date instead of relative targets.
    let migrated = obj.contains_key("target_by");
    let target_percent = match obj.get("target_percent").and_then(as_text) {
        Some(p) if !migrated => validate_target_percent(&p),
        _ => "+10%".to_string(),
    };
    let target_days = match obj.get("target_days") {
        _ if migrated => 30,
        Some(Value::Number(n)) => validate_target_days(n.as_u64().unwrap_or(0) as u32),
        Some(Value::String(s)) => validate_target_days(s.trim().parse().unwrap_or(0)),
        _ => 30,
    };

    let tools = match (obj.get("tools"), obj.get("tool").and_then(as_text)) {
        (Some(Value::Array(_)), _) => text_list(obj.get("tools")),
        (Some(other), _) => as_text(other).into_iter().collect(),
        (None, Some(single)) => vec![single.clone(), single.clone(), single],
        (None, None) => Vec::new(),
    };
    let tools = padded(
        tools.iter().map(|t| truncate(t, 100)).collect(),
        "Tool TBD",
        3,
    );

    let level = |key: &str| {
        obj.get(key)
            .cloned()
            .and_then(|v| serde_json::from_value::<Level>(v).ok())
            .unwrap_or_default()
    };

    ActionItem {
        title: truncate(
            &obj.get("title")
                .and_then(as_text)
                .unwrap_or_else(|| format!("Action {}", index + 1)),
            120,
        ),
        kpi: truncate(
            &obj.get("kpi")
                .and_then(as_text)
                .unwrap_or_else(|| "metric".to_string()),
            60,
        ),
        target_percent,
        target_days,
        how_steps: padded(text_list(obj.get("how_steps")), "See documentation", 3),
        tools,
        effort: level("effort"),
        impact: level("impact"),
    }
}

fn repair_source(value: &Value) -> Option<StructuredSource> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s.starts_with("http://") || s.starts_with("https://") {
                Some(StructuredSource {
                    url: Some(s.to_string()),
                    citation: truncate(s, 200),
                })
            } else if s.is_empty() {
                None
            } else {
                Some(StructuredSource {
                    url: None,
                    citation: truncate(s, 200),
                })
            }
        }
        Value::Object(obj) => {
            let url = obj
                .get("url")
                .and_then(as_text)
                .filter(|u| u.starts_with("http://") || u.starts_with("https://"));
            let citation = obj
                .get("citation")
                .and_then(as_text)
                .unwrap_or_else(|| "Unknown source".to_string());
            Some(StructuredSource {
                url,
                citation: truncate(&citation, 200),
            })
        }
        _ => None,
    }
}

/// Repair a loosely shaped report object into a [`StructuredReport`].
///
/// Actions are normalised to exactly five. Bullet lists are deduplicated and
/// capped but never padded: filler bullets would be classified like real
/// content downstream.
pub fn repair_fill(value: &Value) -> StructuredReport {
    let summary = value
        .get("short_summary")
        .and_then(as_text)
        .unwrap_or_default();
    let short_summary = if summary.chars().count() < 20 {
        SUMMARY_PLACEHOLDER.to_string()
    } else {
        truncate(&summary, MAX_SUMMARY_CHARS)
    };

    let mut actions: Vec<ActionItem> = match value.get("actions") {
        Some(Value::Array(items)) => items
            .iter()
            .take(ACTION_COUNT)
            .enumerate()
            .map(|(i, v)| repair_action(i, v))
            .collect(),
        _ => Vec::new(),
    };
    while actions.len() < ACTION_COUNT {
        actions.push(placeholder_action(
            "Additional action pending - expand research scope".to_string(),
        ));
    }

    let sources = match value.get("sources") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(repair_source)
            .take(MAX_SOURCES)
            .collect(),
        _ => Vec::new(),
    };

    StructuredReport {
        schema_version: default_schema_version(),
        short_summary,
        actions,
        exec_summary: dedupe_bullets(
            text_list(value.get("exec_summary")),
            MAX_BULLET_CHARS,
            MAX_EXEC_SUMMARY,
        ),
        findings: dedupe_bullets(
            text_list(value.get("findings")),
            MAX_BULLET_CHARS,
            MAX_FINDINGS,
        ),
        gaps: dedupe_bullets(text_list(value.get("gaps")), 200, MAX_GAPS),
        sources,
    }
}

impl StructuredReport {
    /// Render to the markdown layout the section parser expects.
    ///
    /// Deterministic: the same report always yields the same text.
    pub fn to_markdown(&self) -> String {
        let mut lines = vec![self.short_summary.clone(), String::new()];

        lines.push("## Action Board".to_string());
        lines.push(String::new());
        for action in &self.actions {
            lines.push(format!("- {}", action.to_line()));
        }
        lines.push(String::new());

        let mut section = |title: &str, items: &[String]| {
            lines.push(format!("## {}", title));
            lines.push(String::new());
            for item in items {
                lines.push(format!("- {}", item));
            }
            lines.push(String::new());
        };
        section("Executive Summary", &self.exec_summary);
        section("Main Findings", &self.findings);
        section("Dogs Not Barking", &self.gaps);

        lines.push("## Sources".to_string());
        lines.push(String::new());
        for source in &self.sources {
            match &source.url {
                Some(url) if url != &source.citation => {
                    lines.push(format!("- {} - {}", url, source.citation))
                }
                Some(url) => lines.push(format!("- {}", url)),
                None => lines.push(format!("- {}", source.citation)),
            }
        }
        lines.push(String::new());

        lines.join("\n")
    }
}

fn looks_like_report(value: &Value) -> bool {
    ["short_summary", "actions", "findings", "gaps", "exec_summary"]
        .iter()
        .any(|key| value.get(key).is_some())
}

/// Turn writer output into markdown.
///
/// Markdown passes through untouched; a JSON report is validated, repaired if
/// needed, and rendered.
pub fn normalize_writer_output(text: &str) -> String {
    let trimmed = text.trim_start();
    let json_like = trimmed.starts_with('{') || trimmed.starts_with("```");
    if !json_like {
        return text.to_string();
    }
    let Some(value) = capture_json(text).filter(looks_like_report) else {
        return text.to_string();
    };

    let errors = schema_errors(&value);
    let report = if errors.is_empty() {
        match serde_json::from_value::<StructuredReport>(value.clone()) {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "schema-valid report failed to deserialize; repairing");
                repair_fill(&value)
            }
        }
    } else {
        debug!(violations = errors.len(), first = %errors[0], "repairing structured report");
        repair_fill(&value)
    };
    report.to_markdown()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ReportDocument, SectionName};

    fn valid_report() -> Value {
        let action = |i: usize| {
            json!({
                "title": format!("Test action {}", i + 1),
                "kpi": "test metric",
                "target_percent": "+15%",
                "target_days": 30,
                "how_steps": ["step 1", "step 2", "step 3"],
                "tools": ["Test tool 1", "Test tool 2", "Test tool 3"],
                "effort": "M",
                "impact": "H"
            })
        };
        json!({
            "schema_version": "1.0",
            "short_summary": "This is a test summary that is long enough to pass validation",
            "actions": (0..5).map(action).collect::<Vec<_>>(),
            "exec_summary": ["bullet 1", "bullet 2", "bullet 3", "bullet 4"],
            "findings": ["finding 1", "finding 2", "finding 3", "finding 4", "finding 5", "finding 6"],
            "gaps": ["gap 1", "gap 2", "gap 3"],
            "sources": [
                {"url": "https://example.com", "citation": "example.com"},
                {"url": null, "citation": "(local research)"}
            ]
        })
    }

    #[test]
    fn test_valid_report_passes_schema() {
        assert!(schema_errors(&valid_report()).is_empty());
    }

    #[test]
    fn test_repair_fill_minimums() {
        let repaired = repair_fill(&json!({"short_summary": "test"}));
        assert_eq!(repaired.actions.len(), 5);
        assert_eq!(repaired.short_summary, SUMMARY_PLACEHOLDER);
        assert!(repaired.findings.is_empty());
        assert!(repaired.gaps.is_empty());
    }

    #[test]
    fn test_repair_fill_dedupe() {
        let repaired = repair_fill(&json!({
            "short_summary": "test summary that is long enough",
            "exec_summary": ["duplicate", "duplicate", "unique", "another"],
        }));
        assert_eq!(repaired.exec_summary, vec!["duplicate", "unique", "another"]);
    }

    #[test]
    fn test_repair_action_migrations() {
        let repaired = repair_fill(&json!({
            "actions": [
                {"title": "Old style action", "kpi": "leads", "target_by": "2024-05-01", "tool": "Yelp"},
                {"title": "Bad targets here", "target_percent": "lots", "target_days": "45", "effort": "H"},
                "not an object"
            ]
        }));
        let first = &repaired.actions[0];
        assert_eq!(first.target_percent, "+10%");
        assert_eq!(first.target_days, 30);
        assert_eq!(first.tools, vec!["Yelp", "Yelp", "Yelp"]);
        assert_eq!(first.how_steps.len(), 3);

        let second = &repaired.actions[1];
        assert_eq!(second.target_percent, "+10%");
        assert_eq!(second.target_days, 30);
        assert_eq!(second.effort, Level::High);
        assert_eq!(second.tools, vec!["Tool TBD", "Tool TBD", "Tool TBD"]);

        assert_eq!(repaired.actions[2].title, "Action 3 - data incomplete");
    }

    #[test]
    fn test_repair_sources() {
        let repaired = repair_fill(&json!({
            "sources": ["https://a.com/x", "local chamber of commerce", {"url": "ftp://x", "citation": "Old"}]
        }));
        assert_eq!(repaired.sources[0].url.as_deref(), Some("https://a.com/x"));
        assert_eq!(repaired.sources[1].url, None);
        assert_eq!(repaired.sources[2].url, None);
        assert_eq!(repaired.sources[2].citation, "Old");
    }

    #[test]
    fn test_markdown_is_deterministic_and_parseable() {
        let report: StructuredReport = serde_json::from_value(valid_report()).unwrap();
        let first = report.to_markdown();
        assert_eq!(first, report.to_markdown());

        let doc = ReportDocument::parse(first);
        for name in [
            SectionName::ActionBoard,
            SectionName::ExecutiveSummary,
            SectionName::MainFindings,
            SectionName::DogsNotBarking,
            SectionName::Sources,
        ] {
            assert!(doc.section(&name).is_some(), "missing {}", name);
        }
        assert_eq!(crate::report::parse_actions(&doc), report.actions);
    }

    #[test]
    fn test_normalize_passes_markdown_through() {
        let text = "## Main Findings\n- a";
        assert_eq!(normalize_writer_output(text), text);
    }

    #[test]
    fn test_normalize_renders_json_report() {
        let text = format!("```json\n{}\n```", valid_report());
        let markdown = normalize_writer_output(&text);
        assert!(markdown.contains("## Dogs Not Barking"));
        assert!(markdown.contains("- gap 1"));
        assert!(markdown.contains("- https://example.com - example.com"));
    }

    #[test]
    fn test_normalize_repairs_invalid_json_report() {
        let markdown = normalize_writer_output(r#"{"findings": ["Few firms offer X"],}"#);
        assert!(markdown.contains("## Action Board"));
        assert!(markdown.contains("- Few firms offer X"));
    }
}
