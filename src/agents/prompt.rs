//! Prompt templates for the three analyzers.

use crate::models::{AnalysisContext, CodeSnippet, Finding, FindingCategory};

use super::parser::response_schema;

/// Maximum number of prior findings included in the security prompt.
const MAX_PRIOR_FINDINGS: usize = 10;

/// System preamble for an analyzer.
pub fn system_prompt(category: FindingCategory) -> &'static str {
    match category {
        FindingCategory::Security => {
            "You are a security expert reviewing code for vulnerabilities. Look for:\n\
             1. Hardcoded secrets, passwords and API keys\n\
             2. SQL, command and template injection\n\
             3. Insecure comparisons of secrets\n\
             4. Weak cryptography and hashing\n\
             5. Unsafe deserialization and dynamic code execution\n\
             6. Missing authentication or authorization checks\n\
             Report only issues you can point to in the code."
        }
        FindingCategory::Quality => {
            "You are a code quality expert. Look for:\n\
             1. Style violations and naming problems\n\
             2. Code complexity (long functions, deep nesting)\n\
             3. Missing documentation\n\
             4. Code duplication\n\
             5. Error handling issues\n\
             6. Performance and maintainability problems"
        }
        FindingCategory::Logic => {
            "You are a logic analysis expert. Look for:\n\
             1. Bugs and logical errors\n\
             2. Race conditions\n\
             3. Resource leaks\n\
             4. Null or None dereferences\n\
             5. Infinite loops and off-by-one errors\n\
             6. Unhandled edge cases and API contract violations"
        }
    }
}

/// Build the user prompt for one snippet.
pub fn build_prompt(
    category: FindingCategory,
    snippet: &CodeSnippet,
    context: &AnalysisContext,
) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "## Change\n\nRepository: {}\nChange: {}\n\n",
        context.repo, context.change_id
    ));

    if !context.commit_history.is_empty() {
        prompt.push_str("## Recent Commits\n\n");
        for commit in context.commit_history.iter().take(5) {
            prompt.push_str(&format!("- {commit}\n"));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "## File: {path}\n\n```{lang}\n{content}\n```\n\n",
        path = snippet.path,
        lang = snippet.language(),
        content = snippet.content,
    ));

    if category == FindingCategory::Security {
        let prior: Vec<&Finding> = context
            .prior_findings
            .iter()
            .filter(|f| f.file == snippet.path)
            .take(MAX_PRIOR_FINDINGS)
            .collect();
        if !prior.is_empty() {
            prompt.push_str(&format_prior_findings_section(&prior));
        }
    }

    prompt.push_str(&format!(
        "## Instructions\n\n\
        Review `{path}` for {category} issues.\n\n\
        Return your findings as a JSON array inside a ```json fenced block. \
        For each finding include:\n\
        - \"type\": short issue kind, e.g. \"SQL Injection\"\n\
        - \"severity\": exactly one of \"low\", \"medium\", \"high\", \"critical\"\n\
        - \"description\": detailed explanation\n\
        - \"file\": \"{path}\"\n\
        - \"line\": the 1-based line number\n\
        - \"confidence\": a number between 0 and 1\n\
        - \"suggestion\": (optional) suggested fix\n\n\
        The response must match this JSON schema:\n\n```json\n{schema}\n```\n\n\
        If there are no issues, return an empty array: []\n",
        path = snippet.path,
        schema = response_schema(),
    ));

    prompt
}

/// Format the "Previous Findings" prompt section.
fn format_prior_findings_section(findings: &[&Finding]) -> String {
    let json = serde_json::to_string_pretty(findings).unwrap_or_else(|_| "[]".to_string());
    format!(
        "## Previous Findings\n\n\
        The following findings were reported in an earlier review of this file.\n\n\
        - **Re-raise** any findings that still apply.\n\
        - **Drop** any findings that have been resolved.\n\n\
        ```json\n{json}\n```\n\n"
    )
}
