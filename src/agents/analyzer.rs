//! Security, Quality and Logic analyzers.
//!
//! The three analyzers share one implementation parameterized by category.
//! Each snippet gets its own provider call; a snippet whose call exhausts
//! its retries, or whose response cannot be parsed, is scanned with the
//! heuristic rules instead. `analyze` never fails.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::{sleep, timeout};

use super::parser::{ParseOutcome, parse_response};
use super::prompt::{build_prompt, system_prompt};
use super::{Agent, AgentError, StateUpdate};
use crate::heuristics::RuleSet;
use crate::models::finding::assign_ids;
use crate::models::{
    AgentResponse, AgentRole, AnalysisContext, CodeSnippet, Finding, FindingCategory,
    WorkflowState,
};
use crate::providers::{
    CompletionRequest, ProviderError, ReasoningProvider, RetryPolicy, classify_error,
};

/// One analyzer node.
pub struct Analyzer {
    category: FindingCategory,
    provider: Arc<dyn ReasoningProvider>,
    model: String,
    temperature: f64,
    policy: RetryPolicy,
    rules: Arc<RuleSet>,
}

/// Result of analyzing a single snippet.
struct SnippetOutcome {
    findings: Vec<Finding>,
    errors: Vec<String>,
    fell_back: bool,
    raw_preview: Option<String>,
}

impl Analyzer {
    pub fn new(
        category: FindingCategory,
        provider: Arc<dyn ReasoningProvider>,
        model: impl Into<String>,
        temperature: f64,
        policy: RetryPolicy,
        rules: Arc<RuleSet>,
    ) -> Self {
        Self {
            category,
            provider,
            model: model.into(),
            temperature,
            policy,
            rules,
        }
    }

    /// Analyze every snippet of `context`.
    pub async fn analyze(&self, context: &AnalysisContext) -> AgentResponse {
        let mut response = AgentResponse {
            success: true,
            ..Default::default()
        };
        let mut fallback_snippets = 0usize;
        let mut raw_preview = None;

        for snippet in &context.snippets {
            let outcome = self.analyze_snippet(snippet, context).await;
            if outcome.fell_back {
                response.success = false;
                fallback_snippets += 1;
            }
            if outcome.raw_preview.is_some() {
                raw_preview = outcome.raw_preview;
            }
            response.findings.extend(outcome.findings);
            response.errors.extend(outcome.errors);
        }

        assign_ids(self.category, &mut response.findings);

        response
            .metadata
            .insert("files_analyzed".into(), context.snippets.len().into());
        response
            .metadata
            .insert("issues_found".into(), response.findings.len().into());
        response
            .metadata
            .insert("fallback_snippets".into(), fallback_snippets.into());
        if let Some(raw) = raw_preview {
            response.metadata.insert("raw_response".into(), raw.into());
        }

        tracing::debug!(
            category = %self.category,
            findings = response.findings.len(),
            fallback_snippets,
            "analyzer finished"
        );

        response
    }

    async fn analyze_snippet(
        &self,
        snippet: &CodeSnippet,
        context: &AnalysisContext,
    ) -> SnippetOutcome {
        let request = CompletionRequest {
            system: system_prompt(self.category).to_string(),
            prompt: build_prompt(self.category, snippet, context),
            model: self.model.clone(),
            temperature: self.temperature,
            timeout: self.policy.attempt_timeout,
        };

        let raw = match self.complete_with_retry(&request, &snippet.path).await {
            Ok(raw) => raw,
            Err(e) => {
                return self.fallback(
                    snippet,
                    format!(
                        "{}: provider failed after {} attempt(s): {e}",
                        snippet.path,
                        self.policy.attempts()
                    ),
                    None,
                );
            }
        };

        match parse_response(&raw, self.category, &snippet.path) {
            ParseOutcome::Parsed { findings, dropped } => {
                let mut errors: Vec<String> = dropped
                    .iter()
                    .map(|d| format!("{}: dropped {d}", snippet.path))
                    .collect();
                if findings.is_empty() && !dropped.is_empty() {
                    let mut outcome = self.fallback(
                        snippet,
                        format!("{}: every record in the response was invalid", snippet.path),
                        None,
                    );
                    errors.append(&mut outcome.errors);
                    outcome.errors = errors;
                    return outcome;
                }
                SnippetOutcome {
                    findings,
                    errors,
                    fell_back: false,
                    raw_preview: None,
                }
            }
            ParseOutcome::Fallback { raw, reason } => self.fallback(
                snippet,
                format!("{}: parse error: {reason}", snippet.path),
                Some(raw),
            ),
        }
    }

    fn fallback(&self, snippet: &CodeSnippet, error: String, raw: Option<String>) -> SnippetOutcome {
        tracing::warn!(category = %self.category, file = %snippet.path, %error, "falling back to heuristics");
        SnippetOutcome {
            findings: self.rules.scan(snippet, self.category),
            errors: vec![error],
            fell_back: true,
            raw_preview: raw,
        }
    }

    /// Call the provider with per-attempt timeout and exponential backoff.
    async fn complete_with_retry(
        &self,
        request: &CompletionRequest,
        file: &str,
    ) -> Result<String, ProviderError> {
        let attempts = self.policy.attempts();
        let mut attempt = 0;
        loop {
            let result = match timeout(self.policy.attempt_timeout, self.provider.complete(request)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.policy.attempt_timeout)),
            };

            match result {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        category = %self.category,
                        file,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        reason = classify_error(&e).unwrap_or("transient error"),
                        error = %e,
                        "provider call failed, retrying in {}ms",
                        delay.as_millis()
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl Agent for Analyzer {
    fn role(&self) -> AgentRole {
        AgentRole::from(self.category)
    }

    async fn run(&self, state: Arc<WorkflowState>) -> Result<StateUpdate, AgentError> {
        let response = self.analyze(&state.context).await;
        Ok(StateUpdate::Findings {
            category: self.category,
            response,
        })
    }
}
