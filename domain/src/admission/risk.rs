//! Risk assessment

use crate::consensus::ConsensusTag;
use crate::core::error::DomainError;
use crate::core::request::SensitiveOperation;
use crate::core::task::TaskType;
use serde::{Deserialize, Serialize};

/// Risk of returning a result without a human looking at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    /// One level up, saturating at `Critical`.
    pub fn raised(self) -> Self {
        match self {
            RiskLevel::Low => RiskLevel::Medium,
            RiskLevel::Medium => RiskLevel::High,
            RiskLevel::High | RiskLevel::Critical => RiskLevel::Critical,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(DomainError::InvalidRiskLevel(other.to_string())),
        }
    }
}

/// Risk level plus the reasons that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub reasons: Vec<String>,
}

impl RiskAssessment {
    pub fn reason_text(&self) -> String {
        self.reasons.join("; ")
    }
}

/// Assess the risk of a synthesized result.
///
/// - task type sets the baseline: basic → low, premium → medium, critical → critical
/// - `below_threshold` raises the level by one
/// - `unverified` forces at least high (human review)
/// - any sensitive operation forces at least high; irreversible ones force critical
pub fn assess_risk(
    task_type: TaskType,
    tags: &[ConsensusTag],
    sensitive: &[SensitiveOperation],
) -> RiskAssessment {
    let mut reasons = Vec::new();

    let mut level = match task_type {
        TaskType::Basic => RiskLevel::Low,
        TaskType::Premium => RiskLevel::Medium,
        TaskType::Critical => RiskLevel::Critical,
    };
    reasons.push(format!("task type {}", task_type));

    if tags.contains(&ConsensusTag::BelowThreshold) {
        level = level.raised();
        reasons.push("consensus below threshold".to_string());
    }

    if tags.contains(&ConsensusTag::Unverified) {
        level = level.max(RiskLevel::High);
        reasons.push("single unverified response".to_string());
    }

    if !sensitive.is_empty() {
        let floor = if sensitive.iter().any(|op| op.is_critical()) {
            RiskLevel::Critical
        } else {
            RiskLevel::High
        };
        level = level.max(floor);
        reasons.push(format!(
            "sensitive operations: {}",
            sensitive
                .iter()
                .map(|op| op.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    RiskAssessment { level, reasons }
}
