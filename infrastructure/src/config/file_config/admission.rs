//! Admission configuration from TOML (`[admission]` section)

use serde::{Deserialize, Serialize};
use std::time::Duration;
use wallbounce_application::{AdmissionParams, ReviewMode};
use wallbounce_domain::{ApprovalPolicy, ConfigIssue, PolicyAction};

const POLICY_ACTIONS: &[&str] = &[
    "auto_approve",
    "auto_approve_if_confident",
    "review",
    "deny",
];

/// Raw admission configuration from TOML
///
/// # Example
///
/// ```toml
/// [admission]
/// low = "auto_approve"
/// medium = "auto_approve_if_confident"
/// high = "review"
/// critical = "review"              # auto-approve is rejected for critical
/// auto_approve_confidence = 0.85
/// review_timeout_secs = 300
/// review_mode = "blocking"         # "blocking" or "deferred"
/// summary_bytes = 2000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAdmissionConfig {
    pub low: String,
    pub medium: String,
    pub high: String,
    pub critical: String,
    pub auto_approve_confidence: f64,
    pub review_timeout_secs: u64,
    pub review_mode: String,
    pub summary_bytes: usize,
}

impl Default for FileAdmissionConfig {
    fn default() -> Self {
        let params = AdmissionParams::default();
        Self {
            low: params.policy.low.as_str().to_string(),
            medium: params.policy.medium.as_str().to_string(),
            high: params.policy.high.as_str().to_string(),
            critical: params.policy.critical.as_str().to_string(),
            auto_approve_confidence: params.policy.auto_approve_confidence,
            review_timeout_secs: params.review_timeout.as_secs(),
            review_mode: params.review_mode.as_str().to_string(),
            summary_bytes: params.summary_bytes,
        }
    }
}

impl FileAdmissionConfig {
    /// Parse the policy table. An unknown action falls back to `review`,
    /// which never lets a result through unseen.
    pub fn parse_policy(&self) -> (ApprovalPolicy, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let mut action = |level: &str, raw: &str| match raw.parse::<PolicyAction>() {
            Ok(action) => action,
            Err(_) => {
                issues.push(
                    ConfigIssue::invalid_enum(
                        &format!("admission.{}", level),
                        raw,
                        POLICY_ACTIONS,
                    )
                    .with_fallback("review"),
                );
                PolicyAction::Review
            }
        };

        let policy = ApprovalPolicy {
            low: action("low", &self.low),
            medium: action("medium", &self.medium),
            high: action("high", &self.high),
            critical: action("critical", &self.critical),
            auto_approve_confidence: self.auto_approve_confidence,
        };
        (policy, issues)
    }

    pub fn parse_review_mode(&self) -> (ReviewMode, Vec<ConfigIssue>) {
        match self.review_mode.parse::<ReviewMode>() {
            Ok(mode) => (mode, vec![]),
            Err(_) => {
                let issue = ConfigIssue::invalid_enum(
                    "admission.review_mode",
                    &self.review_mode,
                    &["blocking", "deferred"],
                )
                .with_fallback("blocking");
                (ReviewMode::default(), vec![issue])
            }
        }
    }

    pub fn to_params(&self) -> (AdmissionParams, Vec<ConfigIssue>) {
        let (policy, mut issues) = self.parse_policy();
        let (review_mode, mode_issues) = self.parse_review_mode();
        issues.extend(mode_issues);
        let params = AdmissionParams {
            policy,
            review_timeout: Duration::from_secs(self.review_timeout_secs),
            review_mode,
            summary_bytes: self.summary_bytes,
        };
        (params, issues)
    }
}
