//! Line-oriented pattern scan.
//!
//! Regex + keyword prefilter + allowlist + entropy, one match per rule per line.

use super::entropy;
use super::rules::HeuristicRule;

/// A match found by the scanner.
#[derive(Debug, Clone)]
pub struct RuleMatch<'a> {
    pub rule: &'a HeuristicRule,
    /// 1-based.
    pub line_number: u32,
    pub matched: String,
}

/// Scan content against a set of rules. Matches are ordered by rule, then line.
pub fn scan_content<'a>(
    content: &str,
    rules: impl IntoIterator<Item = &'a HeuristicRule>,
) -> Vec<RuleMatch<'a>> {
    let mut matches = Vec::new();

    for rule in rules {
        for (line_idx, line) in content.lines().enumerate() {
            if !rule.keywords.is_empty() {
                let lower = line.to_lowercase();
                if !rule.keywords.iter().any(|kw| lower.contains(kw.as_str())) {
                    continue;
                }
            }

            if rule.allowlist_regexes.iter().any(|re| re.is_match(line)) {
                continue;
            }

            let hit = rule.compiled_regex.captures_iter(line).find(|caps| {
                let secret = rule
                    .secret_group
                    .and_then(|g| caps.get(g))
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str())
                    .unwrap_or("");
                entropy::looks_random(secret, rule.entropy_threshold)
            });

            if let Some(caps) = hit {
                let matched = caps.get(0).map(|m| m.as_str()).unwrap_or("").to_string();
                matches.push(RuleMatch {
                    rule,
                    line_number: line_idx as u32 + 1,
                    matched,
                });
            }
        }
    }

    matches
}
