//! Merge decision and patch types.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::finding::{Severity, SeverityCounts};

/// Merge verdict, ordered by strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Approve,
    RequestChanges,
    Block,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Approve => write!(f, "APPROVE"),
            Verdict::RequestChanges => write!(f, "REQUEST_CHANGES"),
            Verdict::Block => write!(f, "BLOCK"),
        }
    }
}

/// Output of the decision stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub verdict: Verdict,
    pub risk_level: Severity,
    pub summary: String,
    pub recommendations: Vec<String>,
    /// Counts over effective (post-enrichment) severities.
    pub counts: SeverityCounts,
}

/// Finding kinds the patch generator knows how to fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatchKind {
    HardcodedSecret,
    InsecureComparison,
    SqlInjection,
    WeakHash,
}

impl PatchKind {
    /// Recognise a finding kind label. Matching is on normalised words so
    /// "Hardcoded Secret", "hardcoded_password" and "hard-coded credential"
    /// all resolve to the same kind.
    pub fn recognize(kind: &str) -> Option<Self> {
        let normalized: String = kind
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
            .collect();
        let compact = normalized.replace(' ', "");

        let secret_word = ["secret", "password", "credential", "apikey", "token"]
            .iter()
            .any(|w| compact.contains(w));
        if compact.contains("hardcoded") && secret_word {
            return Some(PatchKind::HardcodedSecret);
        }
        if compact.contains("sqlinjection") || compact.contains("unparameterized") {
            return Some(PatchKind::SqlInjection);
        }
        if compact.contains("insecurecomparison") || compact.contains("timingattack") {
            return Some(PatchKind::InsecureComparison);
        }
        if compact.contains("weakhash") || compact.contains("insecurehash") {
            return Some(PatchKind::WeakHash);
        }
        None
    }
}

impl fmt::Display for PatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchKind::HardcodedSecret => write!(f, "hardcoded-secret"),
            PatchKind::InsecureComparison => write!(f, "insecure-comparison"),
            PatchKind::SqlInjection => write!(f, "sql-injection"),
            PatchKind::WeakHash => write!(f, "weak-hash"),
        }
    }
}

/// A proposed, not-yet-applied fix for one finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub finding_id: String,
    pub kind: PatchKind,
    pub file: String,
    /// 1-based line the transform rewrote.
    pub line: u32,
    /// Unified diff text.
    pub diff: String,
    /// `true` when the reported line matched the transform exactly.
    /// `false` when the generator had to search the file for the pattern.
    pub applicable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_ordering_is_strictness() {
        assert!(Verdict::Approve < Verdict::RequestChanges);
        assert!(Verdict::RequestChanges < Verdict::Block);
    }

    #[test]
    fn verdict_serializes_screaming() {
        let json = serde_json::to_string(&Verdict::RequestChanges).unwrap();
        assert_eq!(json, "\"REQUEST_CHANGES\"");
        assert_eq!(Verdict::RequestChanges.to_string(), "REQUEST_CHANGES");
    }

    #[test]
    fn recognize_patch_kinds() {
        assert_eq!(PatchKind::recognize("Hardcoded Secret"), Some(PatchKind::HardcodedSecret));
        assert_eq!(PatchKind::recognize("hard-coded password"), Some(PatchKind::HardcodedSecret));
        assert_eq!(PatchKind::recognize("Hardcoded API Key"), Some(PatchKind::HardcodedSecret));
        assert_eq!(PatchKind::recognize("SQL Injection"), Some(PatchKind::SqlInjection));
        assert_eq!(PatchKind::recognize("Insecure Comparison"), Some(PatchKind::InsecureComparison));
        assert_eq!(PatchKind::recognize("weak_hash"), Some(PatchKind::WeakHash));
        assert_eq!(PatchKind::recognize("Missing Docstring"), None);
    }
}
