//! Shared types used across all modules.
//!
//! This module defines the core data structures for findings, analysis
//! requests, pipeline state and decisions. Other modules import from
//! here rather than reaching into each other's internals.

pub mod agent;
pub mod context;
pub mod decision;
pub mod finding;
pub mod state;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use agent::AgentRole;
pub use context::{AnalysisContext, CodeSnippet, ValidationError};
pub use decision::{Decision, Patch, PatchKind, Verdict};
pub use finding::{Finding, FindingCategory, FindingSource, Severity, SeverityCounts};
pub use state::{AgentResponse, Enrichment, RunReport, Stage, WorkflowState};

/// The resolved input mode for an analysis.
#[derive(Debug, Clone)]
pub enum InputMode {
    /// Read a serialized `AnalysisContext` from a JSON file.
    ContextFile(PathBuf),
    /// Build snippets from a file or directory.
    DirectPath(PathBuf),
}

/// Reasoning backends reachable through rig-core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAI,
    Cohere,
    #[default]
    Gemini,
    Perplexity,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "xai")]
    XAI,
    Groq,
    /// Any OpenAI-compatible endpoint (Ollama, vLLM, local servers).
    #[serde(rename = "openai-compatible")]
    OpenAICompatible,
}

/// Config name and API key variable of every backend.
/// Name, config label, API key variable, default model.
const PROVIDERS: [(ProviderName, &str, &str, &str); 9] = [
    (ProviderName::Anthropic, "anthropic", "ANTHROPIC_API_KEY", "claude-3-5-sonnet-latest"),
    (ProviderName::OpenAI, "openai", "OPENAI_API_KEY", "gpt-4o-mini"),
    (ProviderName::Cohere, "cohere", "COHERE_API_KEY", "command-r"),
    (ProviderName::Gemini, "gemini", "GEMINI_API_KEY", "gemini-1.5-flash"),
    (ProviderName::Perplexity, "perplexity", "PERPLEXITY_API_KEY", "sonar"),
    (ProviderName::DeepSeek, "deepseek", "DEEPSEEK_API_KEY", "deepseek-chat"),
    (ProviderName::XAI, "xai", "XAI_API_KEY", "grok-2-latest"),
    (ProviderName::Groq, "groq", "GROQ_API_KEY", "llama-3.1-8b-instant"),
    (ProviderName::OpenAICompatible, "openai-compatible", "OPENAI_API_KEY", "gpt-4o-mini"),
];

impl ProviderName {
    fn entry(self) -> (ProviderName, &'static str, &'static str, &'static str) {
        PROVIDERS
            .into_iter()
            .find(|(name, ..)| *name == self)
            .unwrap_or(PROVIDERS[3])
    }

    /// Name used in config files and `PATCHPILOT_PROVIDER`.
    pub fn as_str(self) -> &'static str {
        self.entry().1
    }

    /// Provider-specific API key variable, as read by rig-core's `from_env()`.
    pub fn api_key_env_var(self) -> &'static str {
        self.entry().2
    }

    /// Model used when neither `provider.model` nor a role override is set.
    pub fn default_model(self) -> &'static str {
        self.entry().3
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        PROVIDERS
            .iter()
            .find(|(_, label, ..)| *label == wanted)
            .map(|(name, ..)| *name)
            .ok_or_else(|| {
                let supported: Vec<&str> = PROVIDERS.iter().map(|(_, label, ..)| *label).collect();
                format!("unsupported provider: '{s}'. Supported: {}", supported.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_display_and_serialize_alike() {
        for (name, label, ..) in PROVIDERS {
            assert_eq!(name.to_string(), label);
            assert_eq!(label.parse::<ProviderName>().unwrap(), name);
            assert_eq!(serde_json::to_string(&name).unwrap(), format!("\"{label}\""));
        }
        assert_eq!("Gemini".parse::<ProviderName>().unwrap(), ProviderName::Gemini);
    }

    #[test]
    fn unknown_provider_lists_supported() {
        let err = "bard".parse::<ProviderName>().unwrap_err();
        assert!(err.contains("'bard'"));
        assert!(err.contains("openai-compatible"));
    }

    #[test]
    fn compatible_endpoints_share_the_openai_key() {
        assert_eq!(ProviderName::OpenAICompatible.api_key_env_var(), "OPENAI_API_KEY");
        assert_eq!(ProviderName::default().api_key_env_var(), "GEMINI_API_KEY");
    }

    #[test]
    fn default_models_belong_to_their_provider() {
        assert_eq!(ProviderName::Gemini.default_model(), "gemini-1.5-flash");
        assert!(ProviderName::Anthropic.default_model().starts_with("claude"));
        assert!(ProviderName::Groq.default_model().starts_with("llama"));
    }
}
