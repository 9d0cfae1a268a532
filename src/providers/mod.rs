//! ReasoningProvider trait and LLM integration.
//!
//! Provides an abstraction layer over rig-core to decouple the
//! pipeline from the specific LLM library. The pipeline only relies on
//! latency and failure-mode contracts: a call returns text or an error.

pub mod rig;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Errors from a reasoning provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("LLM API error: {0}")]
    ApiError(String),

    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Check whether an error is transient and worth retrying.
    ///
    /// Timeouts and rate limits are always retried. API errors are retried
    /// when their message looks like a transient HTTP failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout(_) | ProviderError::RateLimited(_) => true,
            ProviderError::ApiError(_) => classify_error(self).is_some(),
            ProviderError::NotConfigured(_) => false,
        }
    }
}

/// Classifies a provider error into a short, user-friendly message.
///
/// Returns `Some(message)` for transient/retryable errors, `None` otherwise.
pub fn classify_error(err: &ProviderError) -> Option<&'static str> {
    match err {
        ProviderError::ApiError(msg) => {
            let msg_lower = msg.to_lowercase();
            if msg_lower.contains("429")
                || msg_lower.contains("rate limit")
                || msg_lower.contains("too many requests")
            {
                Some("Rate limited by API")
            } else if msg_lower.contains("503")
                || msg_lower.contains("service unavailable")
                || msg_lower.contains("high demand")
            {
                Some("High model load")
            } else if msg_lower.contains("529") || msg_lower.contains("overloaded") {
                Some("API overloaded")
            } else if msg_lower.contains("502") {
                Some("API gateway error")
            } else if msg_lower.contains("timeout") || msg_lower.contains("timed out") {
                Some("Request timed out")
            } else if msg_lower.contains("connection") {
                Some("Connection error")
            } else if msg_lower.contains("temporarily") || msg_lower.contains("try again") {
                Some("Temporary API error")
            } else {
                None
            }
        }
        ProviderError::Timeout(_) => Some("Request timed out"),
        ProviderError::RateLimited(_) => Some("Rate limited by API"),
        ProviderError::NotConfigured(_) => None,
    }
}

/// One completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub model: String,
    pub temperature: f64,
    pub timeout: Duration,
}

/// Trait for an external text-completion service.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Complete a prompt and return the raw response text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}

/// Retry budget for provider calls. All values come from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Bound on a single attempt, including the wait for a provider slot.
    pub attempt_timeout: Duration,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            attempt_timeout: Duration::from_secs(60),
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Compute the backoff duration for a retry attempt using exponential backoff.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let backoff = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        backoff.min(self.max_delay)
    }

    /// Total attempts including the first.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Bounds concurrent outbound calls across every run sharing this handle.
pub struct RateLimitedProvider {
    inner: Arc<dyn ReasoningProvider>,
    permits: Arc<Semaphore>,
}

impl RateLimitedProvider {
    pub fn new(inner: Arc<dyn ReasoningProvider>, max_concurrent: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Calls currently allowed to start.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl ReasoningProvider for RateLimitedProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ProviderError::RateLimited("provider semaphore closed".to_string()))?;
        self.inner.complete(request).await
    }
}

/// Provider used when no backend is configured or offline mode is requested.
///
/// Every call fails immediately, so analyzers go straight to their
/// heuristic fallback.
pub struct UnavailableProvider {
    reason: String,
}

impl UnavailableProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ReasoningProvider for UnavailableProvider {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
        Err(ProviderError::NotConfigured(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "sys".into(),
            prompt: "p".into(),
            model: "m".into(),
            temperature: 0.2,
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn retryable_429_rate_limit() {
        let err = ProviderError::ApiError(
            "Gemini API error: HttpError: Invalid status code 429 Too Many Requests".into(),
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn retryable_503_unavailable() {
        let err = ProviderError::ApiError(
            "Gemini API error: HttpError: Invalid status code 503 Service Unavailable".into(),
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn retryable_timeout_and_rate_limit_variants() {
        assert!(ProviderError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(ProviderError::RateLimited("slow down".into()).is_retryable());
    }

    #[test]
    fn classify_error_names_the_transient_cause() {
        let api = |msg: &str| classify_error(&ProviderError::ApiError(msg.into()));
        assert_eq!(api("status 429 Too Many Requests"), Some("Rate limited by API"));
        assert_eq!(api("503 Service Unavailable"), Some("High model load"));
        assert_eq!(api("529 overloaded_error"), Some("API overloaded"));
        assert_eq!(api("502 Bad Gateway"), Some("API gateway error"));
        assert_eq!(api("connection reset by peer"), Some("Connection error"));
        assert_eq!(api("401 Unauthorized"), None);
        assert_eq!(
            classify_error(&ProviderError::Timeout(Duration::from_secs(1))),
            Some("Request timed out")
        );
        assert_eq!(classify_error(&ProviderError::NotConfigured("x".into())), None);
    }

    #[test]
    fn not_retryable_auth_error() {
        let err = ProviderError::ApiError("Invalid API key: 401 Unauthorized".into());
        assert!(!err.is_retryable());
    }

    #[test]
    fn not_retryable_not_configured() {
        let err = ProviderError::NotConfigured("missing key".into());
        assert!(!err.is_retryable());
    }

    #[test]
    fn backoff_is_exponential() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(60),
            ..Default::default()
        };
        assert_eq!(policy.backoff(0), Duration::from_secs(10));
        assert_eq!(policy.backoff(1), Duration::from_secs(20));
        assert_eq!(policy.backoff(2), Duration::from_secs(40));
        assert_eq!(policy.backoff(10), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn unavailable_provider_always_fails() {
        let provider = UnavailableProvider::new("offline");
        let err = provider.complete(&request()).await.unwrap_err();
        assert_eq!(err, ProviderError::NotConfigured("offline".into()));
    }

    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ReasoningProvider for Gauge {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok("[]".into())
        }
    }

    #[tokio::test]
    async fn rate_limited_provider_bounds_concurrency() {
        let gauge = Arc::new(Gauge {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let limited = Arc::new(RateLimitedProvider::new(gauge.clone(), 2));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let limited = limited.clone();
            handles.push(tokio::spawn(async move {
                limited.complete(&request()).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "[]");
        }

        assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(limited.available_permits(), 2);
    }
}
