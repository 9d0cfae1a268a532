//! rig-core integration for LLM completions.
//!
//! Uses rig-core's provider clients and Agent abstraction for multi-provider
//! support. Currently supports: Anthropic, OpenAI, Cohere, Gemini, Perplexity,
//! DeepSeek, xAI, Groq, and any OpenAI-compatible API.

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers;

use crate::config::ProviderConfig;
use crate::models::ProviderName;

use super::{CompletionRequest, ProviderError, ReasoningProvider};

/// Maximum tokens per LLM completion response.
///
/// Without it some providers (e.g. Gemini) default to a low limit that
/// truncates the findings array.
const MAX_TOKENS: u64 = 8192;

/// Build a simple agent from a rig-core client and prompt it.
macro_rules! prompt_simple {
    ($client:expr, $request:expr, $label:expr) => {{
        let agent = $client
            .agent(&$request.model)
            .preamble(&$request.system)
            .temperature($request.temperature)
            .max_tokens(MAX_TOKENS)
            .build();
        agent
            .prompt($request.prompt.as_str())
            .await
            .map_err(|e| map_rig_error($label, &e.to_string()))
    }};
}

/// Create a rig-core client using the `Client::new(api_key)` convention.
macro_rules! new_client {
    ($provider_mod:path, $api_key:expr, $label:expr) => {{
        <$provider_mod>::new($api_key).map_err(|e| {
            ProviderError::ApiError(format!("failed to create {} client: {e}", $label))
        })
    }};
}

/// Turn rig-core error text into a provider error, surfacing rate limits.
fn map_rig_error(label: &str, message: &str) -> ProviderError {
    let lower = message.to_lowercase();
    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests")
    {
        ProviderError::RateLimited(format!("{label}: {message}"))
    } else {
        ProviderError::ApiError(format!("{label} API error: {message}"))
    }
}

/// rig-core based reasoning provider.
///
/// The provider name in config selects which rig-core client to use.
pub struct RigProvider {
    config: ProviderConfig,
}

impl RigProvider {
    /// Create a new RigProvider with the given configuration.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        if config.api_key.is_none() {
            return Err(ProviderError::NotConfigured(format!(
                "no API key found for provider '{}'. Set {} or {}.",
                config.name,
                crate::constants::ENV_API_KEY,
                config.name.api_key_env_var()
            )));
        }
        if config.name == ProviderName::OpenAICompatible && config.base_url.is_none() {
            return Err(ProviderError::NotConfigured(
                "openai-compatible provider requires base_url to be set".to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// Build an OpenAI-style client, optionally with a custom base URL.
    fn build_openai_client(
        &self,
        api_key: &str,
    ) -> Result<providers::openai::CompletionsClient, ProviderError> {
        let mut builder = providers::openai::CompletionsClient::builder().api_key(api_key);
        if let Some(ref base_url) = self.config.base_url {
            builder = builder.base_url(base_url);
        }
        let client: providers::openai::CompletionsClient = builder
            .build()
            .map_err(|e| ProviderError::ApiError(format!("failed to create OpenAI client: {e}")))?;
        Ok(client)
    }

    /// Get the API key or return an error.
    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("missing API key".to_string()))
    }
}

#[async_trait]
impl ReasoningProvider for RigProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let api_key = self.api_key()?;

        match self.config.name {
            ProviderName::Anthropic => {
                let client: providers::anthropic::Client = providers::anthropic::Client::builder()
                    .api_key(api_key)
                    .build()
                    .map_err(|e| {
                        ProviderError::ApiError(format!("failed to create Anthropic client: {e}"))
                    })?;
                prompt_simple!(client, request, "Anthropic")
            }
            ProviderName::OpenAI | ProviderName::OpenAICompatible => {
                let client = self.build_openai_client(api_key)?;
                prompt_simple!(client, request, "OpenAI")
            }
            ProviderName::Cohere => {
                let client = new_client!(providers::cohere::Client, api_key, "Cohere")?;
                prompt_simple!(client, request, "Cohere")
            }
            ProviderName::Gemini => {
                let client = new_client!(providers::gemini::Client, api_key, "Gemini")?;
                prompt_simple!(client, request, "Gemini")
            }
            ProviderName::Perplexity => {
                let client = new_client!(providers::perplexity::Client, api_key, "Perplexity")?;
                prompt_simple!(client, request, "Perplexity")
            }
            ProviderName::DeepSeek => {
                let client = new_client!(providers::deepseek::Client, api_key, "DeepSeek")?;
                prompt_simple!(client, request, "DeepSeek")
            }
            ProviderName::XAI => {
                let client = new_client!(providers::xai::Client, api_key, "xAI")?;
                prompt_simple!(client, request, "xAI")
            }
            ProviderName::Groq => {
                let client = new_client!(providers::groq::Client, api_key, "Groq")?;
                prompt_simple!(client, request, "Groq")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: ProviderName, api_key: Option<&str>, base_url: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            name,
            model: Some("model".to_string()),
            base_url: base_url.map(str::to_string),
            api_key: api_key.map(str::to_string),
        }
    }

    #[test]
    fn new_provider_missing_api_key() {
        let result = RigProvider::new(config(ProviderName::Gemini, None, None));
        match result {
            Err(e) => {
                let msg = e.to_string();
                assert!(msg.contains("API key"), "got: {msg}");
                assert!(msg.contains("GEMINI_API_KEY"), "got: {msg}");
            }
            Ok(_) => panic!("expected error for missing API key"),
        }
    }

    #[test]
    fn new_provider_with_api_key() {
        assert!(RigProvider::new(config(ProviderName::Anthropic, Some("sk-test"), None)).is_ok());
    }

    #[test]
    fn openai_compatible_requires_base_url() {
        let result = RigProvider::new(config(ProviderName::OpenAICompatible, Some("k"), None));
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
        let ok = RigProvider::new(config(
            ProviderName::OpenAICompatible,
            Some("k"),
            Some("http://localhost:11434/v1"),
        ));
        assert!(ok.is_ok());
    }

    #[test]
    fn rig_errors_surface_rate_limits() {
        let err = map_rig_error("Gemini", "HttpError: Invalid status code 429 Too Many Requests");
        assert!(matches!(err, ProviderError::RateLimited(_)));
        assert!(err.is_retryable());

        let err = map_rig_error("Gemini", "HttpError: 401 Unauthorized");
        assert!(matches!(err, ProviderError::ApiError(_)));
        assert!(!err.is_retryable());
    }
}
