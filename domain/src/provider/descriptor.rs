//! Provider descriptor (long-lived, configured at start-up)

use serde::{Deserialize, Serialize};

/// Stable provider identifier (e.g. "claude", "gemini", "codex").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ProviderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Static description of an inference provider.
///
/// `tier` is a priority rank (lower is asked first); `weight` is the
/// capability weight used when combining confidences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    pub tier: u32,
    pub cost_per_token: f64,
    pub weight: f64,
}

impl ProviderDescriptor {
    pub fn new(id: impl Into<ProviderId>) -> Self {
        Self {
            id: id.into(),
            tier: 0,
            cost_per_token: 0.0,
            weight: 1.0,
        }
    }

    pub fn with_tier(mut self, tier: u32) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_cost_per_token(mut self, cost: f64) -> Self {
        self.cost_per_token = cost.max(0.0);
        self
    }

    /// Weights are kept strictly positive so that no provider is silently
    /// removed from the vote.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = if weight.is_finite() && weight > 0.0 {
            weight
        } else {
            f64::EPSILON
        };
        self
    }

    /// Cost of a call that consumed `tokens` tokens.
    pub fn cost_for(&self, tokens: u32) -> f64 {
        self.cost_per_token * f64::from(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let descriptor = ProviderDescriptor::new("claude");
        assert_eq!(descriptor.id.as_str(), "claude");
        assert_eq!(descriptor.tier, 0);
        assert_eq!(descriptor.weight, 1.0);
    }

    #[test]
    fn test_non_positive_weight_is_clamped() {
        let descriptor = ProviderDescriptor::new("x").with_weight(-2.0);
        assert!(descriptor.weight > 0.0);
        let descriptor = ProviderDescriptor::new("x").with_weight(f64::NAN);
        assert!(descriptor.weight > 0.0);
    }

    #[test]
    fn test_cost_for() {
        let descriptor = ProviderDescriptor::new("x").with_cost_per_token(0.002);
        assert!((descriptor.cost_for(500) - 1.0).abs() < 1e-9);
    }
}
