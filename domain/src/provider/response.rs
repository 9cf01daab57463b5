//! Provider responses (one per dispatch attempt)

use super::descriptor::ProviderId;
use crate::util::current_timestamp_ms;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of a single provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Timeout,
    Error,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Ok => "ok",
            ResponseStatus::Timeout => "timeout",
            ResponseStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Token accounting for one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u32,
    pub output: u32,
}

impl TokenUsage {
    pub fn new(input: u32, output: u32) -> Self {
        Self { input, output }
    }

    pub fn total(&self) -> u32 {
        self.input.saturating_add(self.output)
    }
}

/// A provider's answer (or the stub recorded when it failed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub provider: ProviderId,
    pub content: String,
    /// Self-reported confidence in [0, 1], if the provider gave one
    pub confidence: Option<f64>,
    pub tokens: TokenUsage,
    pub latency: Duration,
    pub cost: f64,
    /// Milliseconds since epoch
    pub timestamp: u64,
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of attempts made (including retries)
    pub attempts: u32,
}

impl ProviderResponse {
    /// Creates a successful response.
    pub fn ok(provider: impl Into<ProviderId>, content: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            content: content.into(),
            confidence: None,
            tokens: TokenUsage::default(),
            latency: Duration::ZERO,
            cost: 0.0,
            timestamp: current_timestamp_ms(),
            status: ResponseStatus::Ok,
            error: None,
            attempts: 1,
        }
    }

    /// Creates the stub recorded when a provider timed out.
    pub fn timeout(provider: impl Into<ProviderId>, latency: Duration) -> Self {
        Self {
            latency,
            status: ResponseStatus::Timeout,
            error: Some("timed out".to_string()),
            ..Self::ok(provider, String::new())
        }
    }

    /// Creates the stub recorded when a provider failed.
    pub fn error(provider: impl Into<ProviderId>, error: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            error: Some(error.into()),
            ..Self::ok(provider, String::new())
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
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

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }
}
