//! Rollout configuration from TOML (`[rollout]` section)

use serde::{Deserialize, Serialize};
use std::time::Duration;
use wallbounce_domain::{ConfigIssue, RollbackFloor, RolloutPlan};

/// Raw rollout configuration from TOML
///
/// # Example
///
/// ```toml
/// [rollout]
/// steps = [5, 10, 25, 50, 100]
/// dwell_secs = 600
/// tick_interval_secs = 30
/// error_rate_threshold = 0.05
/// p95_latency_threshold_secs = 150
/// floor = "zero"                 # "zero" or "last_known_good"
/// window_secs = 300
/// min_samples = 20
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRolloutConfig {
    pub steps: Vec<u32>,
    pub dwell_secs: u64,
    pub tick_interval_secs: u64,
    pub error_rate_threshold: f64,
    pub p95_latency_threshold_secs: u64,
    pub floor: String,
    pub window_secs: u64,
    pub min_samples: usize,
}

impl Default for FileRolloutConfig {
    fn default() -> Self {
        let plan = RolloutPlan::default();
        Self {
            steps: plan.steps.iter().map(|&s| u32::from(s)).collect(),
            dwell_secs: plan.dwell.as_secs(),
            tick_interval_secs: plan.tick_interval.as_secs(),
            error_rate_threshold: plan.error_rate_threshold,
            p95_latency_threshold_secs: plan.p95_latency_threshold.as_secs(),
            floor: plan.floor.as_str().to_string(),
            window_secs: plan.window.as_secs(),
            min_samples: plan.min_samples,
        }
    }
}

impl FileRolloutConfig {
    pub fn parse_floor(&self) -> (RollbackFloor, Vec<ConfigIssue>) {
        match self.floor.parse::<RollbackFloor>() {
            Ok(floor) => (floor, vec![]),
            Err(_) => {
                let issue = ConfigIssue::invalid_enum(
                    "rollout.floor",
                    &self.floor,
                    &["zero", "last_known_good"],
                )
                .with_fallback("zero");
                (RollbackFloor::Zero, vec![issue])
            }
        }
    }

    /// Step values are range-checked by [`RolloutPlan::validate`]; anything
    /// too large for a percentage is kept out of range so it is reported.
    pub fn to_plan(&self) -> (RolloutPlan, Vec<ConfigIssue>) {
        let (floor, issues) = self.parse_floor();
        let plan = RolloutPlan {
            steps: self
                .steps
                .iter()
                .map(|&s| u8::try_from(s).unwrap_or(u8::MAX))
                .collect(),
            dwell: Duration::from_secs(self.dwell_secs),
            error_rate_threshold: self.error_rate_threshold,
            p95_latency_threshold: Duration::from_secs(self.p95_latency_threshold_secs),
            floor,
            window: Duration::from_secs(self.window_secs),
            min_samples: self.min_samples,
            tick_interval: Duration::from_secs(self.tick_interval_secs),
        };
        (plan, issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallbounce_domain::ConfigIssueCode;

    #[test]
    fn test_defaults_match_plan() {
        let (plan, issues) = FileRolloutConfig::default().to_plan();
        assert!(issues.is_empty());
        assert_eq!(plan, RolloutPlan::default());
    }

    #[test]
    fn test_parse_rollout_section() {
        let config: FileRolloutConfig = toml::from_str(
            r#"
steps = [25, 100]
dwell_secs = 60
floor = "last_known_good"
"#,
        )
        .unwrap();
        let (plan, issues) = config.to_plan();
        assert!(issues.is_empty());
        assert_eq!(plan.steps, vec![25, 100]);
        assert_eq!(plan.dwell, Duration::from_secs(60));
        assert_eq!(plan.floor, RollbackFloor::LastKnownGood);
    }

    #[test]
    fn test_oversized_step_is_reported() {
        let config = FileRolloutConfig {
            steps: vec![50, 300],
            ..FileRolloutConfig::default()
        };
        let (plan, _) = config.to_plan();
        assert!(
            plan.validate()
                .iter()
                .any(|i| i.code == ConfigIssueCode::InvalidRolloutPlan)
        );
    }
}
