//! Provider port
//!
//! Defines the single capability the engine needs from an inference
//! provider. How the provider is reached (CLI spawn, HTTP, RPC) is an
//! adapter concern.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use wallbounce_domain::{ExecutionOptions, ProviderDescriptor, TokenUsage};

/// Errors a provider call can fail with
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The request itself was rejected; retrying cannot help
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider failed: {0}")]
    Failed(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::InvalidInput(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout(_))
    }
}

/// Successful provider answer
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply {
    pub content: String,
    /// Self-reported confidence in [0, 1], when the provider gives one
    pub confidence: Option<f64>,
    pub tokens: TokenUsage,
    /// Provider-reported latency; zero when unknown
    pub latency: Duration,
    /// Provider-reported cost; zero means "derive from the descriptor"
    pub cost: f64,
}

impl ProviderReply {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            confidence: None,
            tokens: TokenUsage::default(),
            latency: Duration::ZERO,
            cost: 0.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_tokens(mut self, tokens: TokenUsage) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }
}

/// An inference provider
///
/// Implementations must be cancellation safe: dropping the `execute`
/// future abandons the call (and should release any child process or
/// connection it holds).
#[async_trait]
pub trait Provider: Send + Sync {
    fn descriptor(&self) -> &ProviderDescriptor;

    async fn execute(
        &self,
        prompt: &str,
        options: &ExecutionOptions,
    ) -> Result<ProviderReply, ProviderError>;

    /// Cheap liveness probe used at startup and by `--check-providers`.
    async fn health_check(&self) -> bool {
        true
    }
}
