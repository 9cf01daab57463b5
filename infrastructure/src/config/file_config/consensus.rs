//! Consensus and task settings (`[consensus]`, `[tasks.*]`)

use serde::{Deserialize, Serialize};
use wallbounce_application::ConsensusParams;
use wallbounce_domain::{ConfigIssue, ProviderQuota, QualityGate, TaskProfile, TaskProfiles};

/// Raw consensus configuration from TOML
///
/// # Example
///
/// ```toml
/// [consensus]
/// min_confidence = 0.7
/// min_agreement = 0.6
/// max_rounds = 5
/// centroid_tolerance = 0.05
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConsensusConfig {
    pub min_confidence: f64,
    pub min_agreement: f64,
    pub max_rounds: u32,
    pub centroid_tolerance: f64,
}

impl Default for FileConsensusConfig {
    fn default() -> Self {
        let params = ConsensusParams::default();
        Self {
            min_confidence: params.gate.min_confidence,
            min_agreement: params.gate.min_agreement,
            max_rounds: params.max_rounds,
            centroid_tolerance: params.centroid_tolerance,
        }
    }
}

impl FileConsensusConfig {
    /// Thresholds are copied as-is; range checks happen on the engine config.
    pub fn to_params(&self) -> ConsensusParams {
        ConsensusParams {
            gate: QualityGate {
                min_confidence: self.min_confidence,
                min_agreement: self.min_agreement,
            },
            max_rounds: self.max_rounds,
            centroid_tolerance: self.centroid_tolerance,
        }
    }
}

/// A provider count: a number, or `"all"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileQuota {
    Count(usize),
    Named(String),
}

impl FileQuota {
    fn to_quota(&self) -> Option<ProviderQuota> {
        match self {
            FileQuota::Count(n) => Some(ProviderQuota::Count(*n)),
            FileQuota::Named(s) => s.parse().ok(),
        }
    }

    fn from_quota(quota: ProviderQuota) -> Self {
        match quota {
            ProviderQuota::Count(n) => FileQuota::Count(n),
            ProviderQuota::All => FileQuota::Named("all".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTaskConfig {
    pub min_providers: FileQuota,
    pub initial_fanout: FileQuota,
}

impl From<TaskProfile> for FileTaskConfig {
    fn from(profile: TaskProfile) -> Self {
        Self {
            min_providers: FileQuota::from_quota(profile.min_providers),
            initial_fanout: FileQuota::from_quota(profile.initial_fanout),
        }
    }
}

/// Raw task profiles from TOML
///
/// # Example
///
/// ```toml
/// [tasks.basic]
/// min_providers = 2
/// initial_fanout = 3
///
/// [tasks.critical]
/// min_providers = "all"
/// initial_fanout = "all"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTasksConfig {
    pub basic: FileTaskConfig,
    pub premium: FileTaskConfig,
    pub critical: FileTaskConfig,
}

impl Default for FileTasksConfig {
    fn default() -> Self {
        let profiles = TaskProfiles::default();
        Self {
            basic: profiles.basic.into(),
            premium: profiles.premium.into(),
            critical: profiles.critical.into(),
        }
    }
}

impl FileTasksConfig {
    /// Parse every profile; an unreadable quota keeps that task's default.
    pub fn to_profiles(&self) -> (TaskProfiles, Vec<ConfigIssue>) {
        let defaults = TaskProfiles::default();
        let mut issues = Vec::new();
        let profiles = TaskProfiles {
            basic: parse_profile("basic", &self.basic, defaults.basic, &mut issues),
            premium: parse_profile("premium", &self.premium, defaults.premium, &mut issues),
            critical: parse_profile("critical", &self.critical, defaults.critical, &mut issues),
        };
        (profiles, issues)
    }
}

fn parse_profile(
    task: &str,
    raw: &FileTaskConfig,
    default: TaskProfile,
    issues: &mut Vec<ConfigIssue>,
) -> TaskProfile {
    TaskProfile::new(
        parse_quota(task, "min_providers", &raw.min_providers, default.min_providers, issues),
        parse_quota(task, "initial_fanout", &raw.initial_fanout, default.initial_fanout, issues),
    )
}

fn parse_quota(
    task: &str,
    field: &str,
    value: &FileQuota,
    fallback: ProviderQuota,
    issues: &mut Vec<ConfigIssue>,
) -> ProviderQuota {
    if let Some(quota) = value.to_quota() {
        return quota;
    }
    let shown = match value {
        FileQuota::Count(n) => n.to_string(),
        FileQuota::Named(s) => s.clone(),
    };
    issues.push(
        ConfigIssue::invalid_enum(&format!("tasks.{}.{}", task, field), &shown, &["all", "<count>"])
            .with_fallback(&fallback.to_string()),
    );
    fallback
}
