//! Approval policy table

use super::risk::RiskLevel;
use crate::config::{ConfigIssue, ConfigIssueCode, Severity};
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// What the policy says to do at a given risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    AutoApprove,
    /// Auto-approve when confidence reaches the policy threshold, otherwise review
    AutoApproveIfConfident,
    Review,
    Deny,
}

impl PolicyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyAction::AutoApprove => "auto_approve",
            PolicyAction::AutoApproveIfConfident => "auto_approve_if_confident",
            PolicyAction::Review => "review",
            PolicyAction::Deny => "deny",
        }
    }

    pub fn can_auto_approve(&self) -> bool {
        matches!(
            self,
            PolicyAction::AutoApprove | PolicyAction::AutoApproveIfConfident
        )
    }
}

impl std::fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PolicyAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "auto_approve" | "approve" => Ok(PolicyAction::AutoApprove),
            "auto_approve_if_confident" | "confident" => Ok(PolicyAction::AutoApproveIfConfident),
            "review" | "pending_review" => Ok(PolicyAction::Review),
            "deny" => Ok(PolicyAction::Deny),
            _ => Err(DomainError::invalid_value("policy action", s)),
        }
    }
}

/// Concrete verdict for one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyVerdict {
    AutoApprove,
    Review,
    Deny,
}

/// Risk level → action table.
///
/// `critical` can never auto-approve: a table configured that way is
/// reported by [`ApprovalPolicy::validate`] and overridden to review.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApprovalPolicy {
    pub low: PolicyAction,
    pub medium: PolicyAction,
    pub high: PolicyAction,
    pub critical: PolicyAction,
    /// Confidence required by [`PolicyAction::AutoApproveIfConfident`]
    pub auto_approve_confidence: f64,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            low: PolicyAction::AutoApprove,
            medium: PolicyAction::AutoApproveIfConfident,
            high: PolicyAction::Review,
            critical: PolicyAction::Review,
            auto_approve_confidence: 0.85,
        }
    }
}

impl ApprovalPolicy {
    /// Effective action for a level.
    pub fn action_for(&self, level: RiskLevel) -> PolicyAction {
        match level {
            RiskLevel::Low => self.low,
            RiskLevel::Medium => self.medium,
            RiskLevel::High => self.high,
            RiskLevel::Critical if self.critical.can_auto_approve() => PolicyAction::Review,
            RiskLevel::Critical => self.critical,
        }
    }

    pub fn decide(&self, level: RiskLevel, confidence: f64) -> PolicyVerdict {
        match self.action_for(level) {
            PolicyAction::AutoApprove => PolicyVerdict::AutoApprove,
            PolicyAction::AutoApproveIfConfident if confidence >= self.auto_approve_confidence => {
                PolicyVerdict::AutoApprove
            }
            PolicyAction::AutoApproveIfConfident | PolicyAction::Review => PolicyVerdict::Review,
            PolicyAction::Deny => PolicyVerdict::Deny,
        }
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.critical.can_auto_approve() {
            issues.push(ConfigIssue {
                severity: Severity::Error,
                code: ConfigIssueCode::CriticalAutoApprove,
                message: format!(
                    "admission.policy.critical = '{}': critical results can never be auto-approved",
                    self.critical
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.auto_approve_confidence) {
            issues.push(ConfigIssue::threshold_out_of_range(
                "admission.auto_approve_confidence",
                self.auto_approve_confidence,
            ));
        }
        issues
    }
}
