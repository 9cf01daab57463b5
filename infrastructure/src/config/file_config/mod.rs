//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! Enum-like settings are kept as strings and parsed on conversion, so a
//! typo becomes a warning with a fallback instead of a load failure.

mod admission;
mod consensus;
mod engine;
mod providers;
mod rollout;
mod storage;

pub use admission::FileAdmissionConfig;
pub use consensus::{FileConsensusConfig, FileQuota, FileTaskConfig, FileTasksConfig};
pub use engine::{FileCircuitConfig, FileDispatchConfig, FileEngineConfig};
pub use providers::{FileProviderConfig, ProviderKind};
pub use rollout::FileRolloutConfig;
pub use storage::{FileAuditConfig, FileCacheConfig};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use wallbounce_application::EngineConfig;
use wallbounce_domain::{ConfigIssue, ConfigIssueCode};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub engine: FileEngineConfig,
    pub dispatch: FileDispatchConfig,
    pub circuit: FileCircuitConfig,
    pub consensus: FileConsensusConfig,
    pub tasks: FileTasksConfig,
    pub admission: FileAdmissionConfig,
    pub rollout: FileRolloutConfig,
    pub cache: FileCacheConfig,
    pub audit: FileAuditConfig,
    pub providers: Vec<FileProviderConfig>,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// This is the single entry point for config validation. It checks:
    /// 1. The provider list (present, unique ids, kind-specific fields)
    /// 2. Enum parse failures (fall back with a warning)
    /// 3. Thresholds, limits and policies of the resulting engine config
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        // 1. Providers
        if self.providers.is_empty() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::NoProviders,
                "no [[providers]] configured",
            ));
        }
        let mut seen = HashSet::new();
        for provider in &self.providers {
            if !seen.insert(provider.id.as_str()) {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::DuplicateProvider {
                        id: provider.id.clone(),
                    },
                    format!("provider id '{}' is configured more than once", provider.id),
                ));
            }
            issues.extend(provider.validate());
        }

        // 2. Enum parse validation
        issues.extend(self.circuit.parse_probe_failure().1);
        issues.extend(self.tasks.to_profiles().1);
        issues.extend(self.admission.to_params().1);
        issues.extend(self.rollout.parse_floor().1);

        // 3. Engine-level checks
        issues.extend(self.to_engine_config().validate());

        issues
    }

    /// Build the immutable engine configuration.
    ///
    /// Unparseable enum values take their fallbacks; call
    /// [`validate`](Self::validate) first to surface them.
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_version(self.engine.version)
            .with_request_timeout(Duration::from_secs(self.engine.request_timeout_secs))
            .with_dispatch(self.dispatch.to_params())
            .with_circuit(self.circuit.to_policy())
            .with_consensus(self.consensus.to_params())
            .with_tasks(self.tasks.to_profiles().0)
            .with_admission(self.admission.to_params().0)
            .with_rollout(self.rollout.to_plan().0)
            .with_cache(self.cache.to_params())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallbounce_application::ReviewMode;
    use wallbounce_domain::config::validation::has_errors;
    use wallbounce_domain::{PolicyAction, ProviderQuota, RollbackFloor};

    const FULL: &str = r#"
[engine]
version = 7
request_timeout_secs = 600

[dispatch]
provider_timeout_secs = 90
max_retries = 2

[circuit]
failure_threshold = 3
probe_failure = "exponential"

[consensus]
min_confidence = 0.75
min_agreement = 0.65

[tasks.basic]
min_providers = 2
initial_fanout = 2

[tasks.critical]
min_providers = "all"
initial_fanout = "all"

[admission]
medium = "review"
review_mode = "deferred"

[rollout]
steps = [10, 50, 100]
floor = "last_known_good"

[cache]
ttl_secs = 120

[[providers]]
id = "claude"
command = "claude"
args = ["-p"]

[[providers]]
id = "gemini"
command = "gemini"
tier = 1
"#;

    #[test]
    fn test_deserialize_full_config() {
        let config: FileConfig = toml::from_str(FULL).unwrap();
        assert!(config.validate().is_empty(), "{:?}", config.validate());

        let engine = config.to_engine_config();
        assert_eq!(engine.version, 7);
        assert_eq!(engine.request_timeout, Duration::from_secs(600));
        assert_eq!(engine.dispatch.max_retries, 2);
        assert_eq!(engine.circuit.failure_threshold, 3);
        assert_eq!(engine.consensus.gate.min_confidence, 0.75);
        assert_eq!(engine.tasks.basic.initial_fanout, ProviderQuota::Count(2));
        assert_eq!(engine.tasks.critical.min_providers, ProviderQuota::All);
        assert_eq!(engine.admission.policy.medium, PolicyAction::Review);
        assert_eq!(engine.admission.review_mode, ReviewMode::Deferred);
        assert_eq!(engine.rollout.steps, vec![10, 50, 100]);
        assert_eq!(engine.rollout.floor, RollbackFloor::LastKnownGood);
        assert_eq!(engine.cache.ttl, Duration::from_secs(120));
        assert_eq!(config.providers.len(), 2);
    }

    #[test]
    fn test_empty_config_has_no_providers() {
        let config: FileConfig = toml::from_str("").unwrap();
        let issues = config.validate();
        assert!(has_errors(&issues));
        assert!(issues.iter().any(|i| i.code == ConfigIssueCode::NoProviders));
        assert_eq!(config.to_engine_config(), EngineConfig::default());
    }

    #[test]
    fn test_duplicate_provider_ids() {
        let config: FileConfig = toml::from_str(
            r#"
[[providers]]
id = "claude"
command = "claude"

[[providers]]
id = "claude"
command = "claude-beta"
"#,
        )
        .unwrap();
        let issues = config.validate();
        assert!(issues.iter().any(|i| matches!(
            &i.code,
            ConfigIssueCode::DuplicateProvider { id } if id == "claude"
        )));
    }

    #[test]
    fn test_critical_auto_approve_is_error() {
        let mut config: FileConfig = toml::from_str(FULL).unwrap();
        config.admission.critical = "auto_approve".to_string();
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.code == ConfigIssueCode::CriticalAutoApprove));
        assert!(has_errors(&issues));
    }

    #[test]
    fn test_enum_typos_are_warnings() {
        let mut config: FileConfig = toml::from_str(FULL).unwrap();
        config.rollout.floor = "halfway".to_string();
        config.admission.review_mode = "later".to_string();
        let issues = config.validate();
        assert_eq!(issues.len(), 2);
        assert!(!has_errors(&issues));
    }

    #[test]
    fn test_threshold_out_of_range() {
        let mut config: FileConfig = toml::from_str(FULL).unwrap();
        config.consensus.min_agreement = 1.5;
        assert!(has_errors(&config.validate()));
    }
}
