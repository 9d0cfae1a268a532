//! Analysis request types.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::finding::Finding;

/// Errors for malformed analysis requests.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("analysis context contains no code snippets")]
    NoSnippets,

    #[error("code snippet #{index} has an empty path")]
    EmptyPath { index: usize },

    #[error("analysis context has an empty repository id")]
    EmptyRepo,
}

/// One file's content under review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeSnippet {
    pub path: String,
    pub content: String,
    /// Language tag. Inferred from the extension when absent.
    #[serde(default)]
    pub language: String,
}

impl CodeSnippet {
    /// Build a snippet, inferring the language from the path.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        let language = language_for_path(&path).to_string();
        Self {
            path,
            content: content.into(),
            language,
        }
    }

    /// The language tag, falling back to extension inference.
    pub fn language(&self) -> &str {
        if self.language.is_empty() {
            language_for_path(&self.path)
        } else {
            &self.language
        }
    }
}

/// Map a file extension to a language tag, `"text"` when unknown.
pub fn language_for_path(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
    match ext.to_lowercase().as_str() {
        "py" => "python",
        "rs" => "rust",
        "js" | "mjs" | "cjs" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "rb" => "ruby",
        "php" => "php",
        "c" | "h" => "c",
        "cc" | "cpp" | "hpp" | "cxx" => "cpp",
        "cs" => "csharp",
        "sh" | "bash" => "shell",
        "sql" => "sql",
        _ => "text",
    }
}

/// One review request. Read-only once a run starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    pub repo: String,
    #[serde(default)]
    pub change_id: String,
    #[serde(default)]
    pub author: String,
    pub snippets: Vec<CodeSnippet>,
    /// Findings from earlier reviews of the same change.
    #[serde(default)]
    pub prior_findings: Vec<Finding>,
    /// Commit summaries, newest first.
    #[serde(default)]
    pub commit_history: Vec<String>,
    #[serde(default)]
    pub memory: IndexMap<String, serde_json::Value>,
}

impl AnalysisContext {
    pub fn new(repo: impl Into<String>, change_id: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            change_id: change_id.into(),
            author: author.into(),
            ..Default::default()
        }
    }

    pub fn with_snippet(mut self, snippet: CodeSnippet) -> Self {
        self.snippets.push(snippet);
        self
    }

    /// Check the request before any analysis starts.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.repo.trim().is_empty() {
            return Err(ValidationError::EmptyRepo);
        }
        if self.snippets.is_empty() {
            return Err(ValidationError::NoSnippets);
        }
        if let Some(index) = self.snippets.iter().position(|s| s.path.trim().is_empty()) {
            return Err(ValidationError::EmptyPath { index });
        }
        Ok(())
    }

    /// Find a snippet by path.
    pub fn snippet(&self, path: &str) -> Option<&CodeSnippet> {
        self.snippets.iter().find(|s| s.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_inferred_from_extension() {
        assert_eq!(CodeSnippet::new("app/main.py", "").language(), "python");
        assert_eq!(CodeSnippet::new("src/lib.rs", "").language(), "rust");
        assert_eq!(CodeSnippet::new("README", "").language(), "text");
    }

    #[test]
    fn explicit_language_wins() {
        let snippet = CodeSnippet {
            path: "script".into(),
            content: String::new(),
            language: "shell".into(),
        };
        assert_eq!(snippet.language(), "shell");
    }

    #[test]
    fn validate_rejects_empty_snippets() {
        let ctx = AnalysisContext::new("org/repo", "42", "alice");
        assert_eq!(ctx.validate(), Err(ValidationError::NoSnippets));
    }

    #[test]
    fn validate_rejects_empty_path() {
        let ctx = AnalysisContext::new("org/repo", "42", "alice")
            .with_snippet(CodeSnippet::new("a.py", "x = 1"))
            .with_snippet(CodeSnippet::new("  ", "y = 2"));
        assert_eq!(ctx.validate(), Err(ValidationError::EmptyPath { index: 1 }));
    }

    #[test]
    fn validate_rejects_empty_repo() {
        let ctx = AnalysisContext::new("", "42", "alice").with_snippet(CodeSnippet::new("a.py", ""));
        assert_eq!(ctx.validate(), Err(ValidationError::EmptyRepo));
    }

    #[test]
    fn deserialize_minimal_context() {
        let json = r#"{"repo": "org/repo", "snippets": [{"path": "a.py", "content": "x = 1"}]}"#;
        let ctx: AnalysisContext = serde_json::from_str(json).unwrap();
        assert!(ctx.validate().is_ok());
        assert_eq!(ctx.snippets[0].language(), "python");
        assert!(ctx.prior_findings.is_empty());
    }
}
