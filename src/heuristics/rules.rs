//! Heuristic rule loader.
//!
//! Loads rules from the embedded catalogue and optional user-provided
//! TOML files in the same format.

use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{FindingCategory, Severity};

/// Embedded default rules.
const EMBEDDED_RULES_TOML: &str = include_str!("rules.toml");

/// Errors while loading a rule file.
#[derive(Debug, Error)]
pub enum HeuristicsError {
    #[error("failed to read rules file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse rules file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// A single fallback rule with a pre-compiled regex.
#[derive(Debug, Clone)]
pub struct HeuristicRule {
    pub id: String,
    pub category: FindingCategory,
    pub kind: String,
    pub severity: Severity,
    pub description: String,
    pub compiled_regex: Regex,
    /// Keywords for prefiltering (at least one must appear in the line).
    pub keywords: Vec<String>,
    pub allowlist_regexes: Vec<Regex>,
    /// Capture group checked against `entropy_threshold`.
    pub secret_group: Option<usize>,
    /// Minimum Shannon entropy threshold (0.0 to disable).
    pub entropy_threshold: f64,
    pub confidence: f32,
    pub suggestion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    id: String,
    category: FindingCategory,
    kind: String,
    severity: Severity,
    #[serde(default)]
    description: String,
    regex: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    allowlist: Vec<String>,
    #[serde(default)]
    secret_group: Option<usize>,
    #[serde(default)]
    entropy: f64,
    #[serde(default = "default_rule_confidence")]
    confidence: f32,
    #[serde(default)]
    suggestion: Option<String>,
}

fn default_rule_confidence() -> f32 {
    0.5
}

/// Compile rules, skipping invalid regexes with a warning.
fn compile(file: RuleFile) -> Vec<HeuristicRule> {
    file.rules
        .into_iter()
        .filter_map(|r| {
            let compiled_regex = match Regex::new(&r.regex) {
                Ok(re) => re,
                Err(e) => {
                    tracing::warn!(rule = %r.id, error = %e, "skipping heuristic rule: invalid regex");
                    return None;
                }
            };
            let allowlist_regexes = r
                .allowlist
                .iter()
                .filter_map(|p| match Regex::new(p) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        tracing::warn!(rule = %r.id, error = %e, "skipping allowlist pattern");
                        None
                    }
                })
                .collect();

            Some(HeuristicRule {
                id: r.id,
                category: r.category,
                kind: r.kind,
                severity: r.severity,
                description: r.description,
                compiled_regex,
                keywords: r.keywords.into_iter().map(|k| k.to_lowercase()).collect(),
                allowlist_regexes,
                secret_group: r.secret_group,
                entropy_threshold: r.entropy,
                confidence: r.confidence.clamp(0.0, 1.0),
                suggestion: r.suggestion,
            })
        })
        .collect()
}

/// Load the built-in rules from the embedded TOML catalogue.
pub fn default_rules() -> Vec<HeuristicRule> {
    match toml::from_str::<RuleFile>(EMBEDDED_RULES_TOML) {
        Ok(file) => compile(file),
        Err(e) => {
            tracing::error!(error = %e, "embedded heuristic rules are invalid");
            Vec::new()
        }
    }
}

/// Load additional rules from a user-provided TOML file.
pub fn load_rules_file(path: &Path) -> Result<Vec<HeuristicRule>, HeuristicsError> {
    let content = std::fs::read_to_string(path).map_err(|e| HeuristicsError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    let file: RuleFile = toml::from_str(&content).map_err(|e| HeuristicsError::ParseFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(compile(file))
}
