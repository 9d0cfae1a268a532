//! Finding types produced by the analyzers.

use clap::ValueEnum;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence assigned to a finding when the provider omits one.
pub const DEFAULT_CONFIDENCE: f32 = 0.8;

/// Severity level of a finding, ordered `low < medium < high < critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ValueEnum, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Custom deserializer for Severity that accepts common LLM variations.
///
/// Providers return values like "CRITICAL", "Major", "warning" or "info"
/// instead of the four canonical levels. Unrecognised values map to
/// `medium` rather than failing the whole record.
impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Severity::lenient(&s))
    }
}

impl Severity {
    /// All levels, lowest first.
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Map a free-form severity label onto the canonical scale.
    pub fn lenient(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "low" | "info" | "note" | "minor" | "trivial" | "style" | "suggestion" => Severity::Low,
            "medium" | "moderate" | "warning" | "warn" => Severity::Medium,
            "high" | "major" | "error" | "severe" => Severity::High,
            "critical" | "blocker" | "fatal" => Severity::Critical,
            _ => Severity::Medium,
        }
    }

    /// One level up, capped at `critical`.
    pub fn escalate(self) -> Self {
        match self {
            Severity::Low => Severity::Medium,
            Severity::Medium => Severity::High,
            Severity::High | Severity::Critical => Severity::Critical,
        }
    }

    /// One level down, floored at `low`.
    pub fn de_escalate(self) -> Self {
        match self {
            Severity::Low | Severity::Medium => Severity::Low,
            Severity::High => Severity::Medium,
            Severity::Critical => Severity::High,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Which analyzer a finding belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FindingCategory {
    Security,
    Quality,
    Logic,
}

impl FindingCategory {
    pub const ALL: [FindingCategory; 3] = [
        FindingCategory::Security,
        FindingCategory::Quality,
        FindingCategory::Logic,
    ];

    /// Prefix used when assigning finding ids.
    pub fn id_prefix(self) -> &'static str {
        match self {
            FindingCategory::Security => "sec",
            FindingCategory::Quality => "qual",
            FindingCategory::Logic => "logic",
        }
    }

    /// Severity used when a provider record does not carry one.
    pub fn default_severity(self) -> Severity {
        match self {
            FindingCategory::Security => Severity::Medium,
            FindingCategory::Quality => Severity::Low,
            FindingCategory::Logic => Severity::Medium,
        }
    }
}

impl fmt::Display for FindingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingCategory::Security => write!(f, "security"),
            FindingCategory::Quality => write!(f, "quality"),
            FindingCategory::Logic => write!(f, "logic"),
        }
    }
}

/// Whether a finding came from the reasoning provider or the fallback scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSource {
    #[default]
    Provider,
    Heuristic,
}

/// A single detected issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Run-unique id, e.g. `sec-2`. Empty until the analyzer assigns one.
    #[serde(default)]
    pub id: String,
    pub category: FindingCategory,
    /// Short kind label such as "Hardcoded Secret".
    pub kind: String,
    pub severity: Severity,
    pub description: String,
    pub file: String,
    /// 1-based line number, `0` when unknown.
    #[serde(default)]
    pub line: u32,
    /// Only meaningful for security findings.
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub source: FindingSource,
}

fn default_confidence() -> f32 {
    DEFAULT_CONFIDENCE
}

impl Finding {
    /// Build a finding with default confidence and no id.
    pub fn new(
        category: FindingCategory,
        kind: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
        file: impl Into<String>,
        line: u32,
    ) -> Self {
        Self {
            id: String::new(),
            category,
            kind: kind.into(),
            severity,
            description: description.into(),
            file: file.into(),
            line,
            confidence: DEFAULT_CONFIDENCE,
            rule_id: None,
            suggestion: None,
            source: FindingSource::Provider,
        }
    }

    /// `file:line`, or just `file` when the line is unknown.
    pub fn location(&self) -> String {
        if self.line == 0 {
            self.file.clone()
        } else {
            format!("{}:{}", self.file, self.line)
        }
    }
}

/// Assign `<prefix>-<n>` ids in generation order.
pub fn assign_ids(category: FindingCategory, findings: &mut [Finding]) {
    for (i, finding) in findings.iter_mut().enumerate() {
        finding.id = format!("{}-{}", category.id_prefix(), i + 1);
    }
}

/// Per-severity counts over a set of findings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    /// Count severities from any iterator of levels.
    pub fn from_severities(levels: impl IntoIterator<Item = Severity>) -> Self {
        let mut s = SeverityCounts::default();
        for level in levels {
            s.total += 1;
            match level {
                Severity::Critical => s.critical += 1,
                Severity::High => s.high += 1,
                Severity::Medium => s.medium += 1,
                Severity::Low => s.low += 1,
            }
        }
        s
    }
}
