//! Engine-wide, dispatch and circuit settings (`[engine]`, `[dispatch]`, `[circuit]`)

use serde::{Deserialize, Serialize};
use std::time::Duration;
use wallbounce_application::DispatchParams;
use wallbounce_domain::{CircuitPolicy, ConfigIssue, ProbeFailurePolicy};

/// Raw engine configuration from TOML
///
/// # Example
///
/// ```toml
/// [engine]
/// version = 3                  # bump when thresholds change; logged per request
/// request_timeout_secs = 900   # overall deadline; must exceed a blocking review_timeout_secs
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEngineConfig {
    pub version: u64,
    pub request_timeout_secs: u64,
}

impl Default for FileEngineConfig {
    fn default() -> Self {
        Self {
            version: 1,
            request_timeout_secs: 900,
        }
    }
}

/// Raw dispatch configuration from TOML
///
/// # Example
///
/// ```toml
/// [dispatch]
/// provider_timeout_secs = 120
/// max_retries = 1
/// retry_backoff_ms = 500
/// max_concurrency = 8
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDispatchConfig {
    pub provider_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub max_concurrency: usize,
}

impl Default for FileDispatchConfig {
    fn default() -> Self {
        let params = DispatchParams::default();
        Self {
            provider_timeout_secs: params.provider_timeout.as_secs(),
            max_retries: params.max_retries,
            retry_backoff_ms: params.retry_backoff.as_millis() as u64,
            max_concurrency: params.max_concurrency,
        }
    }
}

impl FileDispatchConfig {
    pub fn to_params(&self) -> DispatchParams {
        DispatchParams {
            provider_timeout: Duration::from_secs(self.provider_timeout_secs),
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            max_concurrency: self.max_concurrency,
        }
    }
}

/// Raw circuit breaker configuration from TOML
///
/// # Example
///
/// ```toml
/// [circuit]
/// failure_threshold = 5
/// failure_window_secs = 60
/// cooldown_secs = 30
/// probe_failure = "reset"        # "reset" or "exponential"
/// probe_backoff_factor = 2       # exponential only
/// max_cooldown_secs = 600        # exponential only
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCircuitConfig {
    pub failure_threshold: u32,
    pub failure_window_secs: u64,
    pub cooldown_secs: u64,
    pub probe_failure: String,
    pub probe_backoff_factor: u32,
    pub max_cooldown_secs: u64,
}

impl Default for FileCircuitConfig {
    fn default() -> Self {
        let policy = CircuitPolicy::default();
        Self {
            failure_threshold: policy.failure_threshold,
            failure_window_secs: policy.failure_window.as_secs(),
            cooldown_secs: policy.cooldown.as_secs(),
            probe_failure: "reset".to_string(),
            probe_backoff_factor: 2,
            max_cooldown_secs: 600,
        }
    }
}

impl FileCircuitConfig {
    /// Parse probe_failure, falling back to `reset` with a warning.
    pub fn parse_probe_failure(&self) -> (ProbeFailurePolicy, Vec<ConfigIssue>) {
        match self.probe_failure.trim().to_lowercase().as_str() {
            "reset" => (ProbeFailurePolicy::ResetCooldown, vec![]),
            "exponential" => (
                ProbeFailurePolicy::Exponential {
                    factor: self.probe_backoff_factor.max(1),
                    max: Duration::from_secs(self.max_cooldown_secs),
                },
                vec![],
            ),
            _ => {
                let issue = ConfigIssue::invalid_enum(
                    "circuit.probe_failure",
                    &self.probe_failure,
                    &["reset", "exponential"],
                )
                .with_fallback("reset");
                (ProbeFailurePolicy::ResetCooldown, vec![issue])
            }
        }
    }

    pub fn to_policy(&self) -> CircuitPolicy {
        CircuitPolicy {
            failure_threshold: self.failure_threshold,
            failure_window: Duration::from_secs(self.failure_window_secs),
            cooldown: Duration::from_secs(self.cooldown_secs),
            probe_failure: self.parse_probe_failure().0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_probe_policy() {
        let config: FileCircuitConfig = toml::from_str(
            r#"
probe_failure = "exponential"
probe_backoff_factor = 3
max_cooldown_secs = 300
"#,
        )
        .unwrap();
        let (policy, issues) = config.parse_probe_failure();
        assert!(issues.is_empty());
        assert_eq!(
            policy,
            ProbeFailurePolicy::Exponential {
                factor: 3,
                max: Duration::from_secs(300)
            }
        );
    }

    #[test]
    fn test_unknown_probe_policy_warns() {
        let config = FileCircuitConfig {
            probe_failure: "forever".to_string(),
            ..FileCircuitConfig::default()
        };
        let (policy, issues) = config.parse_probe_failure();
        assert_eq!(policy, ProbeFailurePolicy::ResetCooldown);
        assert_eq!(issues.len(), 1);
        assert!(!issues[0].is_error());
    }

    #[test]
    fn test_dispatch_defaults_match_engine() {
        assert_eq!(
            FileDispatchConfig::default().to_params(),
            DispatchParams::default()
        );
    }
}
