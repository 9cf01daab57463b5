//! Task classification and per-task provider quotas

use super::error::DomainError;
use serde::{Deserialize, Serialize};

/// Classification of an incoming request.
///
/// The task type decides how many providers must answer before a consensus
/// is considered at all, and feeds directly into risk assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Everyday technical questions
    #[default]
    Basic,
    /// Deeper analysis that warrants more opinions
    Premium,
    /// Decisions with operational impact; never auto-approved
    Critical,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Basic => "basic",
            TaskType::Premium => "premium",
            TaskType::Critical => "critical",
        }
    }

    pub fn all() -> &'static [TaskType] {
        &[TaskType::Basic, TaskType::Premium, TaskType::Critical]
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(TaskType::Basic),
            "premium" => Ok(TaskType::Premium),
            "critical" => Ok(TaskType::Critical),
            other => Err(DomainError::InvalidTaskType(other.to_string())),
        }
    }
}

/// A provider count that is either fixed or "every configured provider".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderQuota {
    Count(usize),
    All,
}

impl ProviderQuota {
    /// Resolve the quota against the number of configured providers.
    pub fn resolve(&self, configured: usize) -> usize {
        match self {
            ProviderQuota::Count(n) => *n,
            ProviderQuota::All => configured,
        }
    }
}

impl std::fmt::Display for ProviderQuota {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderQuota::Count(n) => write!(f, "{}", n),
            ProviderQuota::All => write!(f, "all"),
        }
    }
}

impl std::str::FromStr for ProviderQuota {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(ProviderQuota::All);
        }
        s.parse::<usize>()
            .map(ProviderQuota::Count)
            .map_err(|_| DomainError::invalid_value("provider quota", s))
    }
}

/// How many providers a task type needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskProfile {
    /// Successful responses required before synthesis is attempted
    pub min_providers: ProviderQuota,
    /// Providers dispatched in the first round
    pub initial_fanout: ProviderQuota,
}

impl TaskProfile {
    pub fn new(min_providers: ProviderQuota, initial_fanout: ProviderQuota) -> Self {
        Self {
            min_providers,
            initial_fanout,
        }
    }

    /// Required successful responses, given `configured` providers.
    pub fn required(&self, configured: usize) -> usize {
        self.min_providers.resolve(configured)
    }

    /// First-round fan-out; never below the minimum.
    pub fn fanout(&self, configured: usize) -> usize {
        self.initial_fanout
            .resolve(configured)
            .max(self.required(configured))
    }
}

/// Task profiles for every task type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskProfiles {
    pub basic: TaskProfile,
    pub premium: TaskProfile,
    pub critical: TaskProfile,
}

impl TaskProfiles {
    pub fn for_task(&self, task_type: TaskType) -> &TaskProfile {
        match task_type {
            TaskType::Basic => &self.basic,
            TaskType::Premium => &self.premium,
            TaskType::Critical => &self.critical,
        }
    }
}

impl Default for TaskProfiles {
    fn default() -> Self {
        Self {
            basic: TaskProfile::new(ProviderQuota::Count(2), ProviderQuota::Count(3)),
            premium: TaskProfile::new(ProviderQuota::Count(4), ProviderQuota::Count(4)),
            critical: TaskProfile::new(ProviderQuota::All, ProviderQuota::All),
        }
    }
}
