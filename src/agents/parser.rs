//! Provider response parsing.
//!
//! Turns raw completion text into findings. The result is always one of
//! two explicit branches: structured findings, or the raw text plus the
//! reason it could not be used. The parser never invents findings; the
//! analyzer decides what to do with a fallback.

use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer};

use crate::models::{Finding, FindingCategory, Severity};

/// Maximum length of response text kept in diagnostics.
pub const RAW_PREVIEW_LEN: usize = 2000;

/// Outcome of parsing one provider response.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// Structured findings. `dropped` lists records rejected for missing fields.
    Parsed {
        findings: Vec<Finding>,
        dropped: Vec<String>,
    },
    /// Nothing usable. `raw` is retained for diagnostics.
    Fallback { raw: String, reason: String },
}

/// Shape of one record the provider is asked to return.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FindingRecord {
    /// Short issue kind, e.g. "SQL Injection".
    #[serde(rename = "type", alias = "kind", default)]
    pub kind: Option<String>,
    /// One of low, medium, high, critical.
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(alias = "message", default)]
    pub description: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    /// 1-based line number.
    #[serde(default, deserialize_with = "lenient_line")]
    pub line: Option<u32>,
    /// Between 0 and 1.
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub rule_id: Option<String>,
    #[serde(alias = "fix", default)]
    pub suggestion: Option<String>,
}

/// Accept `12`, `"12"`, `"L12"`, `null` or a negative number.
fn lenient_line<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().map(|n| n.min(u32::MAX as u64) as u32),
        Some(serde_json::Value::String(s)) => {
            let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        }
        _ => None,
    })
}

/// Regex for extracting content inside markdown code fences.
///
/// The closing ``` must appear at the start of a line to avoid matching
/// triple-backticks embedded inside JSON string values.
static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*\n(.*?)\n```").expect("static fence regex"));

/// Free-text "nothing found" answers, accepted as an empty result.
static NO_ISSUES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bno\s+(?:\w+\s+)?(?:issues|vulnerabilities|problems)\s+(?:were\s+)?(?:found|detected)\b")
        .expect("static no-issues regex")
});

/// Wrapper keys providers commonly put around the findings array.
const WRAPPER_KEYS: [&str; 4] = ["findings", "issues", "vulnerabilities", "results"];

/// JSON schema of the expected response, embedded into prompts.
pub fn response_schema() -> String {
    let schema = schemars::schema_for!(Vec<FindingRecord>);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// Parse raw provider text into findings for one snippet.
///
/// Candidates are tried in order: fenced blocks, the whole text, then
/// the outermost `[` .. `]` slice. The first candidate that yields an
/// array of records (bare or inside a `{"findings": [...]}` wrapper) wins.
pub fn parse_response(raw: &str, category: FindingCategory, default_file: &str) -> ParseOutcome {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ParseOutcome::Fallback {
            raw: String::new(),
            reason: "empty response".to_string(),
        };
    }

    let records = extract_json_candidates(trimmed)
        .iter()
        .find_map(|candidate| records_from(candidate));

    let Some(records) = records else {
        if NO_ISSUES_RE.is_match(trimmed) {
            return ParseOutcome::Parsed {
                findings: Vec::new(),
                dropped: Vec::new(),
            };
        }
        return ParseOutcome::Fallback {
            raw: preview(trimmed),
            reason: "response contains no structured findings".to_string(),
        };
    };

    let mut findings = Vec::new();
    let mut dropped = Vec::new();
    for (index, value) in records.into_iter().enumerate() {
        match to_finding(value, category, default_file) {
            Ok(finding) => findings.push(finding),
            Err(reason) => dropped.push(format!("record {index}: {reason}")),
        }
    }

    ParseOutcome::Parsed { findings, dropped }
}

fn preview(text: &str) -> String {
    text.chars().take(RAW_PREVIEW_LEN).collect()
}

/// Extract candidate JSON strings from a response, in priority order.
fn extract_json_candidates(text: &str) -> Vec<String> {
    let mut candidates = Vec::new();

    for cap in FENCE_RE.captures_iter(text) {
        if let Some(inner) = cap.get(1) {
            let inner_trimmed = inner.as_str().trim();
            if !inner_trimmed.is_empty() {
                candidates.push(inner_trimmed.to_string());
            }
        }
    }

    candidates.push(text.to_string());

    // Bracket extraction handles prose around an unfenced array.
    if let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) {
        if start < end {
            candidates.push(text[start..=end].to_string());
        }
    }

    candidates
}

/// The array of records in a candidate, if it has one.
fn records_from(candidate: &str) -> Option<Vec<serde_json::Value>> {
    match serde_json::from_str::<serde_json::Value>(candidate).ok()? {
        serde_json::Value::Array(items) => Some(items),
        serde_json::Value::Object(map) => WRAPPER_KEYS.iter().find_map(|key| match map.get(*key) {
            Some(serde_json::Value::Array(items)) => Some(items.clone()),
            _ => None,
        }),
        _ => None,
    }
}

fn to_finding(
    value: serde_json::Value,
    category: FindingCategory,
    default_file: &str,
) -> Result<Finding, String> {
    if !value.is_object() {
        return Err("not an object".to_string());
    }
    let record: FindingRecord =
        serde_json::from_value(value).map_err(|e| format!("invalid record: {e}"))?;

    let kind = non_empty(record.kind).ok_or("missing required field `type`")?;
    let description = non_empty(record.description).ok_or("missing required field `description`")?;

    let mut finding = Finding::new(
        category,
        kind,
        record.severity.unwrap_or(category.default_severity()),
        description,
        non_empty(record.file).unwrap_or_else(|| default_file.to_string()),
        record.line.unwrap_or(0),
    );
    if let Some(confidence) = record.confidence {
        finding.confidence = confidence.clamp(0.0, 1.0);
    }
    finding.rule_id = non_empty(record.rule_id);
    finding.suggestion = non_empty(record.suggestion);
    Ok(finding)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
