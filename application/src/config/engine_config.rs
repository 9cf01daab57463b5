//! Engine configuration — thresholds, limits and policies for one engine.
//!
//! Grouped by the component that consumes each slice:
//!
//! | Slice | Consumer |
//! |-------|----------|
//! | [`DispatchParams`] | `ProviderDispatcher` |
//! | `CircuitPolicy` | `CircuitBreakerRegistry` |
//! | [`ConsensusParams`] + `TaskProfiles` | `ConsensusEngine` |
//! | [`AdmissionParams`] | `AdmissionController` |
//! | `RolloutPlan` | `RolloutController` |
//! | [`CacheParams`] | `RunAnalysisUseCase` |

use serde::{Deserialize, Serialize};
use std::time::Duration;
use wallbounce_domain::{
    ApprovalPolicy, CircuitPolicy, ConfigIssue, ConfigIssueCode, QualityGate, RolloutPlan,
    TaskProfiles, TaskType,
};

/// Per-call dispatch limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchParams {
    /// Default per-provider timeout (a request option may override it)
    pub provider_timeout: Duration,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Backoff before the first retry; doubles on each further retry
    pub retry_backoff: Duration,
    /// Upper bound on provider calls running at once for one request
    pub max_concurrency: usize,
}

impl Default for DispatchParams {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(120),
            max_retries: 1,
            retry_backoff: Duration::from_millis(500),
            max_concurrency: 8,
        }
    }
}

impl DispatchParams {
    /// Backoff before retry number `retry` (1-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.retry_backoff.saturating_mul(factor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusParams {
    pub gate: QualityGate,
    /// Upper bound on dispatch rounds for one request
    pub max_rounds: u32,
    pub centroid_tolerance: f64,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            gate: QualityGate::default(),
            max_rounds: 5,
            centroid_tolerance: 0.05,
        }
    }
}

/// How `pending_review` is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewMode {
    /// The caller waits for the verdict (or the review timeout)
    #[default]
    Blocking,
    /// The caller gets `pending` at once; the verdict is audited later
    Deferred,
}

impl ReviewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewMode::Blocking => "blocking",
            ReviewMode::Deferred => "deferred",
        }
    }
}

impl std::str::FromStr for ReviewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "blocking" => Ok(ReviewMode::Blocking),
            "deferred" => Ok(ReviewMode::Deferred),
            other => Err(format!("unknown review mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissionParams {
    pub policy: ApprovalPolicy,
    pub review_timeout: Duration,
    pub review_mode: ReviewMode,
    /// Content bytes included in the summary sent to reviewers
    pub summary_bytes: usize,
}

impl Default for AdmissionParams {
    fn default() -> Self {
        Self {
            policy: ApprovalPolicy::default(),
            review_timeout: Duration::from_secs(300),
            review_mode: ReviewMode::Blocking,
            summary_bytes: 2000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheParams {
    pub enabled: bool,
    pub ttl: Duration,
}

impl Default for CacheParams {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Immutable configuration of one engine instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Bumped whenever a new configuration is built; logged with each request
    pub version: u64,
    /// Overall deadline for one request, review wait included
    pub request_timeout: Duration,
    pub dispatch: DispatchParams,
    pub circuit: CircuitPolicy,
    pub consensus: ConsensusParams,
    pub tasks: TaskProfiles,
    pub admission: AdmissionParams,
    pub rollout: RolloutPlan,
    pub cache: CacheParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: 1,
            request_timeout: Duration::from_secs(900),
            dispatch: DispatchParams::default(),
            circuit: CircuitPolicy::default(),
            consensus: ConsensusParams::default(),
            tasks: TaskProfiles::default(),
            admission: AdmissionParams::default(),
            rollout: RolloutPlan::default(),
            cache: CacheParams::default(),
        }
    }
}

impl EngineConfig {
    // ==================== Builder Methods ====================

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchParams) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_circuit(mut self, circuit: CircuitPolicy) -> Self {
        self.circuit = circuit;
        self
    }

    pub fn with_consensus(mut self, consensus: ConsensusParams) -> Self {
        self.consensus = consensus;
        self
    }

    pub fn with_tasks(mut self, tasks: TaskProfiles) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn with_admission(mut self, admission: AdmissionParams) -> Self {
        self.admission = admission;
        self
    }

    pub fn with_rollout(mut self, rollout: RolloutPlan) -> Self {
        self.rollout = rollout;
        self
    }

    pub fn with_cache(mut self, cache: CacheParams) -> Self {
        self.cache = cache;
        self
    }

    // ==================== Validation ====================

    /// Check thresholds, limits and policy tables.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        let gate = &self.consensus.gate;
        for (field, value) in [
            ("consensus.min_confidence", gate.min_confidence),
            ("consensus.min_agreement", gate.min_agreement),
            ("consensus.centroid_tolerance", self.consensus.centroid_tolerance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                issues.push(ConfigIssue::threshold_out_of_range(field, value));
            }
        }
        if self.consensus.max_rounds == 0 {
            issues.push(ConfigIssue::non_positive("consensus.max_rounds"));
        }
        if self.dispatch.max_concurrency == 0 {
            issues.push(ConfigIssue::non_positive("dispatch.max_concurrency"));
        }
        if self.dispatch.provider_timeout.is_zero() {
            issues.push(ConfigIssue::non_positive("dispatch.provider_timeout_secs"));
        }
        if self.request_timeout.is_zero() {
            issues.push(ConfigIssue::non_positive("engine.request_timeout_secs"));
        }
        if self.admission.review_mode == ReviewMode::Blocking
            && self.request_timeout <= self.admission.review_timeout
        {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ReviewOutlastsRequest,
                format!(
                    "engine.request_timeout_secs ({}s) must exceed admission.review_timeout_secs ({}s) \
                     in blocking review mode",
                    self.request_timeout.as_secs(),
                    self.admission.review_timeout.as_secs()
                ),
            ));
        }
        if self.circuit.failure_threshold == 0 {
            issues.push(ConfigIssue::non_positive("circuit.failure_threshold"));
        }

        for task in TaskType::all() {
            let profile = self.tasks.for_task(*task);
            if profile.required(usize::MAX) <= 1 {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::SingleProviderMinimum {
                        task: task.to_string(),
                    },
                    format!(
                        "tasks.{}.min_providers = {}: single responses are never verified \
                         and always go to review",
                        task, profile.min_providers
                    ),
                ));
            }
        }

        issues.extend(self.admission.policy.validate());
        issues.extend(self.rollout.validate());
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallbounce_domain::config::validation::has_errors;
    use wallbounce_domain::{PolicyAction, ProviderQuota, TaskProfile};

    #[test]
    fn test_default_is_valid() {
        assert!(EngineConfig::default().validate().is_empty());
    }

    #[test]
    fn test_backoff_doubles() {
        let params = DispatchParams::default();
        assert_eq!(params.backoff_for(1), Duration::from_millis(500));
        assert_eq!(params.backoff_for(2), Duration::from_millis(1000));
        assert_eq!(params.backoff_for(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_threshold_out_of_range_is_error() {
        let config = EngineConfig::default().with_consensus(ConsensusParams {
            gate: QualityGate {
                min_confidence: 1.2,
                min_agreement: 0.6,
            },
            ..ConsensusParams::default()
        });
        let issues = config.validate();
        assert!(has_errors(&issues));
        assert!(issues.iter().any(|i| matches!(
            &i.code,
            ConfigIssueCode::ThresholdOutOfRange { field, .. } if field == "consensus.min_confidence"
        )));
    }

    #[test]
    fn test_single_provider_minimum_is_warning() {
        let mut tasks = TaskProfiles::default();
        tasks.basic = TaskProfile::new(ProviderQuota::Count(1), ProviderQuota::Count(1));
        let issues = EngineConfig::default().with_tasks(tasks).validate();
        assert_eq!(issues.len(), 1);
        assert!(!has_errors(&issues));
    }

    #[test]
    fn test_critical_auto_approve_rejected() {
        let mut admission = AdmissionParams::default();
        admission.policy.critical = PolicyAction::AutoApprove;
        let issues = EngineConfig::default().with_admission(admission).validate();
        assert!(
            issues
                .iter()
                .any(|i| i.code == ConfigIssueCode::CriticalAutoApprove)
        );
    }

    #[test]
    fn test_blocking_review_must_fit_request_timeout() {
        let config = EngineConfig::default().with_request_timeout(Duration::from_secs(300));
        let issues = config.validate();
        assert!(has_errors(&issues));
        assert!(
            issues
                .iter()
                .any(|i| i.code == ConfigIssueCode::ReviewOutlastsRequest)
        );

        // Deferred review never holds the request open.
        let deferred = config.with_admission(AdmissionParams {
            review_mode: ReviewMode::Deferred,
            ..AdmissionParams::default()
        });
        assert!(deferred.validate().is_empty());
    }

    #[test]
    fn test_review_mode_parse() {
        assert_eq!("Deferred".parse::<ReviewMode>().unwrap(), ReviewMode::Deferred);
        assert!("later".parse::<ReviewMode>().is_err());
    }
}
