//! Config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables
//! 3. `.patchpilot.toml` in repo root
//! 4. `~/.config/patchpilot/config.toml` (global defaults)
//! 5. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::env::Env;
use crate::models::{AgentRole, ProviderName};
use crate::providers::RetryPolicy;

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub agents: AgentsConfig,
    pub retry: RetryConfig,
    pub enrichment: EnrichmentConfig,
    pub workers: WorkersConfig,
    pub heuristics: HeuristicsConfig,
    pub memory: MemoryConfig,
}

/// LLM provider configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub name: ProviderName,
    /// Unset means the provider's default model.
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ProviderConfig {
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(self.name.default_model())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: ProviderName::Gemini,
            model: None,
            base_url: None,
            api_key: None,
        }
    }
}

/// Per-role model and sampling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTuning {
    /// Overrides `provider.model` for this role.
    #[serde(default)]
    pub model: Option<String>,
    pub temperature: f64,
}

impl AgentTuning {
    fn with_temperature(temperature: f64) -> Self {
        Self {
            model: None,
            temperature,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub security: AgentTuning,
    pub quality: AgentTuning,
    pub logic: AgentTuning,
    pub context: AgentTuning,
    pub decision: AgentTuning,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            security: AgentTuning::with_temperature(0.2),
            quality: AgentTuning::with_temperature(0.3),
            logic: AgentTuning::with_temperature(0.4),
            context: AgentTuning::with_temperature(0.1),
            decision: AgentTuning::with_temperature(0.1),
        }
    }
}

impl AgentsConfig {
    pub fn tuning(&self, role: AgentRole) -> &AgentTuning {
        match role {
            AgentRole::Security => &self.security,
            AgentRole::Quality => &self.quality,
            AgentRole::Logic => &self.logic,
            AgentRole::Context => &self.context,
            AgentRole::Decision => &self.decision,
        }
    }

    fn tuning_mut(&mut self, role: AgentRole) -> &mut AgentTuning {
        match role {
            AgentRole::Security => &mut self.security,
            AgentRole::Quality => &mut self.quality,
            AgentRole::Logic => &mut self.logic,
            AgentRole::Context => &mut self.context,
            AgentRole::Decision => &mut self.decision,
        }
    }
}

/// Provider call retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub attempt_timeout_secs: u64,
    pub retry_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            attempt_timeout_secs: 60,
            retry_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

/// Severity adjustment from similarity memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub top_k: usize,
    /// Minimum similarity score for a memory record to count as a match.
    pub similarity_threshold: f64,
    /// Escalate when non-false-positive matches exceed this count.
    pub recurrence_threshold: usize,
    /// De-escalate when the false-positive share of matches exceeds this.
    pub false_positive_rate: f64,
    pub query_timeout_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_threshold: 0.5,
            recurrence_threshold: 2,
            false_positive_rate: 0.5,
            query_timeout_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    /// Concurrent runs.
    pub pool_size: usize,
    /// Concurrent outbound provider calls across all runs.
    pub max_concurrent_calls: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            max_concurrent_calls: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    /// Extra TOML rule file merged into the built-in catalogue.
    pub additional_rules: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// JSON file the memory store is loaded from and saved to.
    pub path: Option<String>,
    /// Append each completed run's findings to memory.
    pub record_findings: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            record_findings: true,
        }
    }
}

impl Config {
    /// Load configuration with proper layering.
    ///
    /// Reads from global config, repo-local config, then applies
    /// environment variable overrides.
    pub fn load(repo_root: Option<&Path>, env: &Env) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Layer 4: global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                config.merge(global);
            }
        }

        // Layer 3: repo-local config
        if let Some(root) = repo_root {
            let local_path = root.join(crate::constants::CONFIG_FILENAME);
            if local_path.exists() {
                let local = Self::load_file(&local_path)?;
                config.merge(local);
            }
        }

        // Layer 2: environment variables
        config.apply_env_vars(env);

        Ok(config)
    }

    /// Load a config from a specific file.
    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the global config file path.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(crate::constants::CONFIG_DIR).join("config.toml"))
    }

    /// Merge another config into this one (other takes precedence for non-default values).
    fn merge(&mut self, other: Config) {
        // Provider settings
        let default_provider = ProviderConfig::default();
        if other.provider.name != default_provider.name {
            self.provider.name = other.provider.name;
        }
        if other.provider.model.is_some() {
            self.provider.model = other.provider.model;
        }
        if other.provider.base_url.is_some() {
            self.provider.base_url = other.provider.base_url;
        }
        if other.provider.api_key.is_some() {
            self.provider.api_key = other.provider.api_key;
        }

        // Per-role tuning
        let default_agents = AgentsConfig::default();
        for role in AgentRole::ALL {
            let theirs = other.agents.tuning(role);
            if theirs.model.is_some() {
                self.agents.tuning_mut(role).model = theirs.model.clone();
            }
            if theirs.temperature != default_agents.tuning(role).temperature {
                self.agents.tuning_mut(role).temperature = theirs.temperature;
            }
        }

        // Retry budget
        let default_retry = RetryConfig::default();
        if other.retry.max_retries != default_retry.max_retries {
            self.retry.max_retries = other.retry.max_retries;
        }
        if other.retry.attempt_timeout_secs != default_retry.attempt_timeout_secs {
            self.retry.attempt_timeout_secs = other.retry.attempt_timeout_secs;
        }
        if other.retry.retry_delay_ms != default_retry.retry_delay_ms {
            self.retry.retry_delay_ms = other.retry.retry_delay_ms;
        }
        if other.retry.max_delay_ms != default_retry.max_delay_ms {
            self.retry.max_delay_ms = other.retry.max_delay_ms;
        }

        // Enrichment
        let default_enrichment = EnrichmentConfig::default();
        if other.enrichment.top_k != default_enrichment.top_k {
            self.enrichment.top_k = other.enrichment.top_k;
        }
        if other.enrichment.similarity_threshold != default_enrichment.similarity_threshold {
            self.enrichment.similarity_threshold = other.enrichment.similarity_threshold;
        }
        if other.enrichment.recurrence_threshold != default_enrichment.recurrence_threshold {
            self.enrichment.recurrence_threshold = other.enrichment.recurrence_threshold;
        }
        if other.enrichment.false_positive_rate != default_enrichment.false_positive_rate {
            self.enrichment.false_positive_rate = other.enrichment.false_positive_rate;
        }
        if other.enrichment.query_timeout_ms != default_enrichment.query_timeout_ms {
            self.enrichment.query_timeout_ms = other.enrichment.query_timeout_ms;
        }

        // Workers
        let default_workers = WorkersConfig::default();
        if other.workers.pool_size != default_workers.pool_size {
            self.workers.pool_size = other.workers.pool_size;
        }
        if other.workers.max_concurrent_calls != default_workers.max_concurrent_calls {
            self.workers.max_concurrent_calls = other.workers.max_concurrent_calls;
        }

        if other.heuristics.additional_rules.is_some() {
            self.heuristics.additional_rules = other.heuristics.additional_rules;
        }

        // Memory (disabled recording overrides enabled)
        if other.memory.path.is_some() {
            self.memory.path = other.memory.path;
        }
        if !other.memory.record_findings {
            self.memory.record_findings = false;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_vars(&mut self, env: &Env) {
        use crate::constants::{
            ENV_API_KEY, ENV_BASE_URL, ENV_MAX_CONCURRENT, ENV_MAX_RETRIES, ENV_MODEL,
            ENV_PROVIDER, ENV_WORKERS,
        };

        if let Ok(val) = env.var(ENV_PROVIDER) {
            if let Ok(name) = val.parse::<ProviderName>() {
                self.provider.name = name;
            } else {
                tracing::warn!(var = ENV_PROVIDER, value = %val, "ignoring invalid provider");
            }
        }
        if let Ok(val) = env.var(ENV_MODEL) {
            self.provider.model = Some(val);
        }
        if let Ok(val) = env.var(ENV_BASE_URL) {
            self.provider.base_url = Some(val);
        }

        // Provider-specific API key resolution
        let api_key = env
            .var(ENV_API_KEY)
            .or_else(|_| env.var(self.provider.name.api_key_env_var()))
            .ok();
        if api_key.is_some() {
            self.provider.api_key = api_key;
        }

        if let Some(n) = parse_env_number::<usize>(env, ENV_WORKERS) {
            self.workers.pool_size = n;
        }
        if let Some(n) = parse_env_number::<usize>(env, ENV_MAX_CONCURRENT) {
            self.workers.max_concurrent_calls = n;
        }
        if let Some(n) = parse_env_number::<u32>(env, ENV_MAX_RETRIES) {
            self.retry.max_retries = n;
        }
    }

    /// Retry policy handed to the analyzers.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            attempt_timeout: Duration::from_secs(self.retry.attempt_timeout_secs),
            initial_delay: Duration::from_millis(self.retry.retry_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    /// Model id for a role, falling back to the provider default.
    pub fn model_for(&self, role: AgentRole) -> &str {
        self.agents
            .tuning(role)
            .model
            .as_deref()
            .unwrap_or_else(|| self.provider.model())
    }
}

fn parse_env_number<T: std::str::FromStr>(env: &Env, name: &str) -> Option<T> {
    let val = env.var(name).ok()?;
    match val.trim().parse::<T>() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(var = name, value = %val, "ignoring non-numeric value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.provider.name, ProviderName::Gemini);
        assert_eq!(config.provider.model(), "gemini-1.5-flash");
        assert_eq!(config.agents.security.temperature, 0.2);
        assert_eq!(config.agents.logic.temperature, 0.4);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.workers.pool_size, 4);
        assert!(config.memory.record_findings);
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[provider]
name = "openai"
model = "gpt-4o"

[agents.logic]
model = "gpt-4o-mini"
temperature = 0.5

[retry]
max_retries = 4
attempt_timeout_secs = 10

[enrichment]
recurrence_threshold = 3

[workers]
pool_size = 2
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.provider.name, ProviderName::OpenAI);
        assert_eq!(config.agents.logic.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.agents.logic.temperature, 0.5);
        // untouched roles keep their defaults
        assert_eq!(config.agents.quality.temperature, 0.3);
        assert_eq!(config.retry.max_retries, 4);
        assert_eq!(config.retry.retry_delay_ms, 1_000);
        assert_eq!(config.enrichment.recurrence_threshold, 3);
        assert_eq!(config.workers.pool_size, 2);
    }

    #[test]
    fn merge_overrides_non_default_values() {
        let mut base = Config::default();
        let mut other = Config::default();

        other.provider.name = ProviderName::Groq;
        other.provider.model = Some("llama3-70b-8192".to_string());
        other.provider.api_key = Some("gsk-test".to_string());
        other.agents.security.model = Some("llama3-8b-8192".to_string());
        other.agents.decision.temperature = 0.0;
        other.retry.max_retries = 5;
        other.enrichment.false_positive_rate = 0.25;
        other.workers.max_concurrent_calls = 1;
        other.heuristics.additional_rules = Some("rules.toml".to_string());
        other.memory.record_findings = false;

        base.merge(other);

        assert_eq!(base.provider.name, ProviderName::Groq);
        assert_eq!(base.provider.model(), "llama3-70b-8192");
        assert_eq!(base.provider.api_key, Some("gsk-test".to_string()));
        assert_eq!(base.model_for(AgentRole::Security), "llama3-8b-8192");
        assert_eq!(base.model_for(AgentRole::Quality), "llama3-70b-8192");
        assert_eq!(base.agents.decision.temperature, 0.0);
        assert_eq!(base.retry.max_retries, 5);
        assert_eq!(base.enrichment.false_positive_rate, 0.25);
        assert_eq!(base.workers.max_concurrent_calls, 1);
        assert_eq!(base.heuristics.additional_rules, Some("rules.toml".to_string()));
        assert!(!base.memory.record_findings);
    }

    #[test]
    fn merge_keeps_base_when_other_is_default() {
        let mut base = Config::default();
        base.provider.name = ProviderName::OpenAI;
        base.retry.max_retries = 7;

        base.merge(Config::default());

        assert_eq!(base.provider.name, ProviderName::OpenAI);
        assert_eq!(base.retry.max_retries, 7);
    }

    #[test]
    fn load_file_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not valid {{ toml").unwrap();

        let result = Config::load_file(&path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("parse"));
    }

    #[test]
    fn load_file_not_found() {
        let result = Config::load_file(Path::new("/tmp/patchpilot_not_exist_config.toml"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read"));
    }

    #[test]
    fn load_from_repo_root() {
        let env = Env::mock(Vec::<(&str, &str)>::new());

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".patchpilot.toml"),
            r#"
[provider]
name = "anthropic"
model = "claude-sonnet-4-20250514"

[workers]
pool_size = 8
"#,
        )
        .unwrap();

        let config = Config::load(Some(dir.path()), &env).unwrap();
        assert_eq!(config.provider.name, ProviderName::Anthropic);
        assert_eq!(config.workers.pool_size, 8);
    }

    #[test]
    fn apply_env_vars_provider_and_api_key() {
        let env = Env::mock([
            ("PATCHPILOT_PROVIDER", "openai"),
            ("PATCHPILOT_API_KEY", "sk-env-test"),
            ("PATCHPILOT_WORKERS", "3"),
            ("PATCHPILOT_MAX_RETRIES", "0"),
        ]);
        let mut config = Config::default();
        config.apply_env_vars(&env);
        assert_eq!(config.provider.name, ProviderName::OpenAI);
        assert_eq!(config.provider.api_key, Some("sk-env-test".to_string()));
        assert_eq!(config.workers.pool_size, 3);
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn switching_provider_without_model_uses_its_default() {
        let env = Env::mock([("PATCHPILOT_PROVIDER", "anthropic")]);
        let mut config = Config::default();
        config.apply_env_vars(&env);
        assert_eq!(config.provider.model, None);
        assert_eq!(config.model_for(AgentRole::Security), ProviderName::Anthropic.default_model());

        let env = Env::mock([("PATCHPILOT_PROVIDER", "anthropic"), ("PATCHPILOT_MODEL", "claude-custom")]);
        config.apply_env_vars(&env);
        assert_eq!(config.model_for(AgentRole::Logic), "claude-custom");
    }

    #[test]
    fn apply_env_vars_provider_specific_api_key_fallback() {
        let env = Env::mock([("GEMINI_API_KEY", "gm-test")]);
        let mut config = Config::default();
        config.apply_env_vars(&env);
        assert_eq!(config.provider.api_key, Some("gm-test".to_string()));
    }

    #[test]
    fn apply_env_vars_ignores_invalid_values() {
        let env = Env::mock([
            ("PATCHPILOT_PROVIDER", "not-a-provider"),
            ("PATCHPILOT_WORKERS", "many"),
        ]);
        let mut config = Config::default();
        config.apply_env_vars(&env);
        assert_eq!(config.provider.name, ProviderName::Gemini);
        assert_eq!(config.workers.pool_size, 4);
    }

    #[test]
    fn retry_policy_from_config() {
        let mut config = Config::default();
        config.retry.attempt_timeout_secs = 5;
        config.retry.retry_delay_ms = 250;
        let policy = config.retry_policy();
        assert_eq!(policy.attempt_timeout, Duration::from_secs(5));
        assert_eq!(policy.initial_delay, Duration::from_millis(250));
        assert_eq!(policy.max_retries, 2);
    }
}
