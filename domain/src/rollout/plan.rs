//! Rollout plan: ramp steps and breach thresholds

use crate::config::{ConfigIssue, ConfigIssueCode};
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where traffic goes when a breach triggers a rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackFloor {
    /// All traffic back to the legacy path
    #[default]
    Zero,
    /// The last step that completed its dwell without a breach
    LastKnownGood,
}

impl RollbackFloor {
    pub fn as_str(&self) -> &'static str {
        match self {
            RollbackFloor::Zero => "zero",
            RollbackFloor::LastKnownGood => "last_known_good",
        }
    }
}

impl std::fmt::Display for RollbackFloor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RollbackFloor {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "zero" | "0" => Ok(RollbackFloor::Zero),
            "last_known_good" | "lkg" => Ok(RollbackFloor::LastKnownGood),
            _ => Err(DomainError::invalid_value("rollout floor", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RolloutPlan {
    /// Traffic percentages, strictly increasing, each in 1..=100
    pub steps: Vec<u8>,
    /// Minimum time a step must hold without a breach before advancing
    pub dwell: Duration,
    /// Error rate above which the rollout is rolled back
    pub error_rate_threshold: f64,
    /// p95 latency above which the rollout is rolled back
    pub p95_latency_threshold: Duration,
    pub floor: RollbackFloor,
    /// Length of the rolling metrics window
    pub window: Duration,
    /// Samples required in the window before a breach can be declared
    pub min_samples: usize,
    /// How often the controller re-evaluates the window
    pub tick_interval: Duration,
}

impl Default for RolloutPlan {
    fn default() -> Self {
        Self {
            steps: vec![5, 10, 25, 50, 100],
            dwell: Duration::from_secs(600),
            error_rate_threshold: 0.05,
            p95_latency_threshold: Duration::from_secs(150),
            floor: RollbackFloor::Zero,
            window: Duration::from_secs(300),
            min_samples: 20,
            tick_interval: Duration::from_secs(30),
        }
    }
}

impl RolloutPlan {
    pub fn with_steps(mut self, steps: Vec<u8>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_dwell(mut self, dwell: Duration) -> Self {
        self.dwell = dwell;
        self
    }

    pub fn with_floor(mut self, floor: RollbackFloor) -> Self {
        self.floor = floor;
        self
    }

    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if let Err(e) = self.check_steps() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvalidRolloutPlan,
                format!("rollout.steps {:?}: {}", self.steps, e),
            ));
        }
        if !(0.0..=1.0).contains(&self.error_rate_threshold) {
            issues.push(ConfigIssue::threshold_out_of_range(
                "rollout.error_rate_threshold",
                self.error_rate_threshold,
            ));
        }
        if self.p95_latency_threshold.is_zero() {
            issues.push(ConfigIssue::non_positive("rollout.p95_latency_threshold_secs"));
        }
        if self.window.is_zero() {
            issues.push(ConfigIssue::non_positive("rollout.window_secs"));
        }
        if self.tick_interval.is_zero() {
            issues.push(ConfigIssue::non_positive("rollout.tick_interval_secs"));
        }
        issues
    }

    /// Strictly increasing, non-empty, each step in 1..=100.
    pub fn check_steps(&self) -> Result<(), DomainError> {
        if self.steps.is_empty() {
            return Err(DomainError::InvalidRolloutPlan(
                "at least one step is required".to_string(),
            ));
        }
        if let Some(bad) = self.steps.iter().find(|&&s| s == 0 || s > 100) {
            return Err(DomainError::InvalidRolloutPlan(format!(
                "step {} is outside 1..=100",
                bad
            )));
        }
        if self.steps.windows(2).any(|w| w[0] >= w[1]) {
            return Err(DomainError::InvalidRolloutPlan(
                "steps must be strictly increasing".to_string(),
            ));
        }
        Ok(())
    }

    pub fn final_step(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan_is_valid() {
        assert!(RolloutPlan::default().validate().is_empty());
    }

    #[test]
    fn test_rejects_bad_steps() {
        for steps in [vec![], vec![10, 10], vec![50, 25], vec![0, 50], vec![50, 101]] {
            let plan = RolloutPlan::default().with_steps(steps.clone());
            assert!(plan.check_steps().is_err(), "steps {:?} accepted", steps);
            assert!(
                plan.validate()
                    .iter()
                    .any(|i| i.code == ConfigIssueCode::InvalidRolloutPlan)
            );
        }
    }

    #[test]
    fn test_parse_floor() {
        assert_eq!(
            "last-known-good".parse::<RollbackFloor>().unwrap(),
            RollbackFloor::LastKnownGood
        );
        assert_eq!("zero".parse::<RollbackFloor>().unwrap(), RollbackFloor::Zero);
        assert!("half".parse::<RollbackFloor>().is_err());
    }
}
