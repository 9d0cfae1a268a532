//! Deterministic fallback analysis.
//!
//! When the reasoning provider is unavailable or returns something the
//! parser cannot use, analyzers scan the snippet text with these rules
//! instead. Results are low-confidence findings.

pub mod entropy;
pub mod rules;
pub mod scanner;

use std::path::Path;

use crate::constants::HEURISTIC_CONFIDENCE_CAP;
use crate::models::{CodeSnippet, Finding, FindingCategory, FindingSource};

pub use rules::{HeuristicRule, HeuristicsError};

/// The compiled rule catalogue shared by all analyzers.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<HeuristicRule>,
}

impl RuleSet {
    /// The embedded rules only.
    pub fn builtin() -> Self {
        Self {
            rules: rules::default_rules(),
        }
    }

    /// Built-in rules plus an optional user rule file. A user rule whose
    /// id matches a built-in one replaces it in place.
    pub fn load(additional: Option<&Path>) -> Result<Self, HeuristicsError> {
        let mut set = Self::builtin();
        if let Some(path) = additional {
            for rule in rules::load_rules_file(path)? {
                set.insert(rule);
            }
        }
        Ok(set)
    }

    fn insert(&mut self, rule: HeuristicRule) {
        match self.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => {
                tracing::debug!(rule = %rule.id, "user rule overrides built-in rule");
                *existing = rule;
            }
            None => self.rules.push(rule),
        }
    }

    pub fn rules(&self) -> &[HeuristicRule] {
        &self.rules
    }

    pub fn for_category(&self, category: FindingCategory) -> impl Iterator<Item = &HeuristicRule> {
        self.rules.iter().filter(move |r| r.category == category)
    }

    /// Scan one snippet with the rules of one category.
    ///
    /// Findings are ordered by line, then by rule order, and carry no id.
    pub fn scan(&self, snippet: &CodeSnippet, category: FindingCategory) -> Vec<Finding> {
        let mut matches = scanner::scan_content(&snippet.content, self.for_category(category));
        matches.sort_by_key(|m| m.line_number);

        matches
            .into_iter()
            .map(|m| {
                let rule = m.rule;
                Finding {
                    id: String::new(),
                    category,
                    kind: rule.kind.clone(),
                    severity: rule.severity,
                    description: rule.description.clone(),
                    file: snippet.path.clone(),
                    line: m.line_number,
                    confidence: rule.confidence.min(HEURISTIC_CONFIDENCE_CAP),
                    rule_id: Some(rule.id.clone()),
                    suggestion: rule.suggestion.clone(),
                    source: FindingSource::Heuristic,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    fn snippet(content: &str) -> CodeSnippet {
        CodeSnippet::new("app/auth.py", content)
    }

    #[test]
    fn hardcoded_secret_and_insecure_comparison() {
        let rules = RuleSet::builtin();
        let code = "admin_pass = \"superSecret123\"\nif password == admin_pass:\n    login()\n";
        let findings = rules.scan(&snippet(code), FindingCategory::Security);

        let secret = findings
            .iter()
            .find(|f| f.kind == "Hardcoded Secret")
            .expect("hardcoded secret finding");
        assert_eq!(secret.line, 1);
        assert!(secret.severity >= Severity::High);
        assert_eq!(secret.source, FindingSource::Heuristic);
        assert!(secret.confidence <= HEURISTIC_CONFIDENCE_CAP);

        let comparison = findings
            .iter()
            .find(|f| f.kind == "Insecure Comparison")
            .expect("insecure comparison finding");
        assert_eq!(comparison.line, 2);
        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn environment_lookup_is_not_a_secret() {
        let rules = RuleSet::builtin();
        let code = "admin_pass = os.environ.get(\"ADMIN_PASS\")\n";
        assert!(rules.scan(&snippet(code), FindingCategory::Security).is_empty());
    }

    #[test]
    fn sql_injection_detected() {
        let rules = RuleSet::builtin();
        let code = "cursor.execute(f\"SELECT * FROM users WHERE id = {user_id}\")\n";
        let findings = rules.scan(&snippet(code), FindingCategory::Security);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, "SQL Injection");
    }

    #[test]
    fn quality_and_logic_rules_are_separate() {
        let rules = RuleSet::builtin();
        let code = "def add(x, items=[]):\n    # TODO handle overflow\n    if x == None:\n        return x / 0\n";
        let quality = rules.scan(&snippet(code), FindingCategory::Quality);
        let logic = rules.scan(&snippet(code), FindingCategory::Logic);

        let quality_kinds: Vec<&str> = quality.iter().map(|f| f.kind.as_str()).collect();
        assert_eq!(quality_kinds, vec!["Unresolved TODO"]);

        let logic_kinds: Vec<&str> = logic.iter().map(|f| f.kind.as_str()).collect();
        assert_eq!(
            logic_kinds,
            vec!["Mutable Default Argument", "None Comparison", "Division By Zero"]
        );
    }

    #[test]
    fn clean_code_yields_nothing() {
        let rules = RuleSet::builtin();
        let code = "def add(a, b):\n    return a + b\n";
        for category in FindingCategory::ALL {
            assert!(rules.scan(&snippet(code), category).is_empty());
        }
    }

    #[test]
    fn load_merges_additional_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extra.toml");
        std::fs::write(
            &path,
            r#"
[[rules]]
id = "no-sleep"
category = "quality"
kind = "Sleep Call"
severity = "low"
regex = '''time\.sleep\('''
"#,
        )
        .unwrap();

        let builtin = RuleSet::builtin().rules().len();
        let set = RuleSet::load(Some(&path)).unwrap();
        assert_eq!(set.rules().len(), builtin + 1);
        let findings = set.scan(&snippet("time.sleep(5)\n"), FindingCategory::Quality);
        assert_eq!(findings[0].kind, "Sleep Call");
    }

    #[test]
    fn user_rule_with_builtin_id_replaces_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extra.toml");
        std::fs::write(
            &path,
            r#"
[[rules]]
id = "todo-marker"
category = "quality"
kind = "Team Marker"
severity = "high"
regex = '''XXX'''
"#,
        )
        .unwrap();

        let builtin = RuleSet::builtin().rules().len();
        let set = RuleSet::load(Some(&path)).unwrap();
        assert_eq!(set.rules().len(), builtin);

        let findings = set.scan(&snippet("# XXX\n"), FindingCategory::Quality);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, "Team Marker");
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].rule_id.as_deref(), Some("todo-marker"));
    }
}
