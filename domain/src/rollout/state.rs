//! Rollout state machine

use super::plan::{RollbackFloor, RolloutPlan};
use super::window::WindowStats;
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutPhase {
    Ramping,
    /// Final step reached
    Steady,
    RolledBack,
    Paused,
}

impl RolloutPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RolloutPhase::Ramping => "ramping",
            RolloutPhase::Steady => "steady",
            RolloutPhase::RolledBack => "rolled_back",
            RolloutPhase::Paused => "paused",
        }
    }
}

impl std::fmt::Display for RolloutPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time view of the rollout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RolloutState {
    pub percentage: u8,
    pub phase: RolloutPhase,
    /// Index into the plan's steps; `None` while at 0% below the first step
    pub step_index: Option<usize>,
    pub last_known_good: u8,
    pub rollback_triggered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_reason: Option<String>,
    /// Window aggregates from the most recent evaluation
    pub last_window: WindowStats,
}

/// What one evaluation did.
#[derive(Debug, Clone, PartialEq)]
pub enum RolloutTransition {
    Hold,
    Advanced { from: u8, to: u8 },
    RolledBack { from: u8, to: u8, reason: String },
}

#[derive(Debug, Clone)]
pub struct RolloutMachine {
    plan: RolloutPlan,
    phase: RolloutPhase,
    step_index: Option<usize>,
    last_good_index: Option<usize>,
    step_entered_at: Instant,
    paused_from: Option<RolloutPhase>,
    rollback_reason: Option<String>,
    last_window: WindowStats,
}

impl RolloutMachine {
    /// Start ramping at the first step.
    pub fn new(plan: RolloutPlan, now: Instant) -> Result<Self, DomainError> {
        plan.check_steps()?;
        let phase = if plan.steps.len() == 1 {
            RolloutPhase::Steady
        } else {
            RolloutPhase::Ramping
        };
        Ok(Self {
            plan,
            phase,
            step_index: Some(0),
            last_good_index: None,
            step_entered_at: now,
            paused_from: None,
            rollback_reason: None,
            last_window: WindowStats::default(),
        })
    }

    pub fn plan(&self) -> &RolloutPlan {
        &self.plan
    }

    pub fn phase(&self) -> RolloutPhase {
        self.phase
    }

    pub fn percentage(&self) -> u8 {
        self.percentage_at(self.step_index)
    }

    pub fn state(&self) -> RolloutState {
        RolloutState {
            percentage: self.percentage(),
            phase: self.phase,
            step_index: self.step_index,
            last_known_good: self.percentage_at(self.last_good_index),
            rollback_triggered: self.phase == RolloutPhase::RolledBack,
            rollback_reason: self.rollback_reason.clone(),
            last_window: self.last_window,
        }
    }

    /// One tick: roll back on a breach, otherwise advance one step once the
    /// dwell has elapsed.
    ///
    /// Breaches are checked in every phase except `rolled_back`, so a paused
    /// rollout still protects itself. Ramping only happens in `ramping`.
    pub fn evaluate(&mut self, now: Instant, stats: &WindowStats) -> RolloutTransition {
        self.last_window = *stats;
        if self.phase == RolloutPhase::RolledBack {
            return RolloutTransition::Hold;
        }

        if let Some(reason) = self.breach(stats) {
            return self.roll_back(now, reason);
        }

        if self.phase != RolloutPhase::Ramping {
            return RolloutTransition::Hold;
        }
        if now.saturating_duration_since(self.step_entered_at) < self.plan.dwell {
            return RolloutTransition::Hold;
        }

        let from = self.percentage();
        self.last_good_index = self.step_index;
        let next = self.step_index.map_or(0, |i| i + 1);
        self.step_index = Some(next.min(self.plan.final_step()));
        self.step_entered_at = now;
        if next >= self.plan.final_step() {
            self.phase = RolloutPhase::Steady;
        }
        RolloutTransition::Advanced {
            from,
            to: self.percentage(),
        }
    }

    pub fn pause(&mut self) -> Result<(), DomainError> {
        match self.phase {
            RolloutPhase::Ramping | RolloutPhase::Steady => {
                self.paused_from = Some(self.phase);
                self.phase = RolloutPhase::Paused;
                Ok(())
            }
            phase => Err(illegal("pause", phase)),
        }
    }

    /// Leave `paused`; the dwell for the current step starts over.
    pub fn resume(&mut self, now: Instant) -> Result<(), DomainError> {
        if self.phase != RolloutPhase::Paused {
            return Err(illegal("resume", self.phase));
        }
        self.phase = self.paused_from.take().unwrap_or(RolloutPhase::Ramping);
        self.step_entered_at = now;
        Ok(())
    }

    /// Manual exit from `rolled_back`: clears the flag and ramps again from
    /// the floor the rollback left traffic at.
    pub fn reset_after_rollback(&mut self, now: Instant) -> Result<(), DomainError> {
        if self.phase != RolloutPhase::RolledBack {
            return Err(illegal("reset", self.phase));
        }
        self.rollback_reason = None;
        self.step_entered_at = now;
        self.phase = if self.step_index == Some(self.plan.final_step()) {
            RolloutPhase::Steady
        } else {
            RolloutPhase::Ramping
        };
        Ok(())
    }

    fn breach(&self, stats: &WindowStats) -> Option<String> {
        if stats.samples == 0 || stats.samples < self.plan.min_samples {
            return None;
        }
        if stats.error_rate > self.plan.error_rate_threshold {
            return Some(format!(
                "error rate {:.3} exceeds {:.3} over {} samples",
                stats.error_rate, self.plan.error_rate_threshold, stats.samples
            ));
        }
        match stats.p95_latency {
            Some(p95) if p95 > self.plan.p95_latency_threshold => Some(format!(
                "p95 latency {} exceeds {}",
                format_duration(p95),
                format_duration(self.plan.p95_latency_threshold)
            )),
            _ => None,
        }
    }

    fn roll_back(&mut self, now: Instant, reason: String) -> RolloutTransition {
        let from = self.percentage();
        self.step_index = match self.plan.floor {
            RollbackFloor::Zero => None,
            RollbackFloor::LastKnownGood => self.last_good_index,
        };
        // Ramping resumes above the floor; the floor itself is the new good step.
        self.last_good_index = self.step_index;
        self.phase = RolloutPhase::RolledBack;
        self.paused_from = None;
        self.step_entered_at = now;
        self.rollback_reason = Some(reason.clone());
        RolloutTransition::RolledBack {
            from,
            to: self.percentage(),
            reason,
        }
    }

    fn percentage_at(&self, index: Option<usize>) -> u8 {
        index
            .and_then(|i| self.plan.steps.get(i).copied())
            .unwrap_or(0)
    }
}

fn illegal(operation: &str, phase: RolloutPhase) -> DomainError {
    DomainError::IllegalRolloutOperation {
        operation: operation.to_string(),
        phase: phase.to_string(),
    }
}

fn format_duration(d: Duration) -> String {
    format!("{}ms", d.as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> RolloutPlan {
        RolloutPlan::default()
            .with_steps(vec![10, 50, 100])
            .with_dwell(Duration::from_secs(60))
            .with_min_samples(5)
    }

    fn healthy() -> WindowStats {
        WindowStats {
            samples: 10,
            errors: 0,
            error_rate: 0.0,
            p95_latency: Some(Duration::from_secs(2)),
        }
    }

    fn failing() -> WindowStats {
        WindowStats {
            samples: 10,
            errors: 5,
            error_rate: 0.5,
            p95_latency: Some(Duration::from_secs(2)),
        }
    }

    #[test]
    fn test_advances_one_step_per_dwell() {
        let start = Instant::now();
        let mut machine = RolloutMachine::new(plan(), start).unwrap();
        assert_eq!(machine.percentage(), 10);

        assert_eq!(
            machine.evaluate(start + Duration::from_secs(30), &healthy()),
            RolloutTransition::Hold
        );

        // Long overdue: still only one step.
        let later = start + Duration::from_secs(600);
        assert_eq!(
            machine.evaluate(later, &healthy()),
            RolloutTransition::Advanced { from: 10, to: 50 }
        );
        assert_eq!(machine.evaluate(later, &healthy()), RolloutTransition::Hold);

        let t = later + Duration::from_secs(60);
        assert_eq!(
            machine.evaluate(t, &healthy()),
            RolloutTransition::Advanced { from: 50, to: 100 }
        );
        assert_eq!(machine.phase(), RolloutPhase::Steady);
        assert_eq!(machine.state().last_known_good, 50);
    }

    #[test]
    fn test_breach_rolls_back_to_zero_and_stays() {
        let start = Instant::now();
        let mut machine = RolloutMachine::new(plan(), start).unwrap();
        machine.evaluate(start + Duration::from_secs(60), &healthy());
        assert_eq!(machine.percentage(), 50);

        let t = start + Duration::from_secs(70);
        let transition = machine.evaluate(t, &failing());
        assert!(matches!(
            transition,
            RolloutTransition::RolledBack { from: 50, to: 0, .. }
        ));
        let state = machine.state();
        assert!(state.rollback_triggered);
        assert!(state.rollback_reason.unwrap().contains("error rate"));

        // Metrics recover; no automatic re-ramp.
        for i in 1..10 {
            let now = t + Duration::from_secs(600 * i);
            assert_eq!(machine.evaluate(now, &healthy()), RolloutTransition::Hold);
            assert_eq!(machine.percentage(), 0);
        }
    }

    #[test]
    fn test_last_known_good_floor() {
        let start = Instant::now();
        let mut machine =
            RolloutMachine::new(plan().with_floor(RollbackFloor::LastKnownGood), start).unwrap();
        machine.evaluate(start + Duration::from_secs(60), &healthy());
        let transition = machine.evaluate(start + Duration::from_secs(61), &failing());
        assert!(matches!(
            transition,
            RolloutTransition::RolledBack { from: 50, to: 10, .. }
        ));
    }

    #[test]
    fn test_latency_breach() {
        let start = Instant::now();
        let mut machine = RolloutMachine::new(plan(), start).unwrap();
        let slow = WindowStats {
            p95_latency: Some(Duration::from_secs(600)),
            ..healthy()
        };
        let transition = machine.evaluate(start, &slow);
        match transition {
            RolloutTransition::RolledBack { reason, .. } => assert!(reason.contains("p95")),
            other => panic!("expected rollback, got {:?}", other),
        }
    }

    #[test]
    fn test_too_few_samples_never_breach() {
        let start = Instant::now();
        let mut machine = RolloutMachine::new(plan(), start).unwrap();
        let sparse = WindowStats {
            samples: 2,
            errors: 2,
            error_rate: 1.0,
            p95_latency: Some(Duration::from_secs(1)),
        };
        assert_eq!(machine.evaluate(start, &sparse), RolloutTransition::Hold);
        assert_eq!(machine.phase(), RolloutPhase::Ramping);
    }

    #[test]
    fn test_reset_restarts_ramp_from_floor() {
        let start = Instant::now();
        let mut machine = RolloutMachine::new(plan(), start).unwrap();
        machine.evaluate(start, &failing());
        assert!(machine.resume(start).is_err());

        let t = start + Duration::from_secs(10);
        machine.reset_after_rollback(t).unwrap();
        assert_eq!(machine.phase(), RolloutPhase::Ramping);
        assert!(!machine.state().rollback_triggered);
        assert_eq!(machine.percentage(), 0);

        assert_eq!(
            machine.evaluate(t + Duration::from_secs(60), &healthy()),
            RolloutTransition::Advanced { from: 0, to: 10 }
        );
    }

    #[test]
    fn test_pause_holds_ramp_but_not_protection() {
        let start = Instant::now();
        let mut machine = RolloutMachine::new(plan(), start).unwrap();
        machine.pause().unwrap();
        assert_eq!(
            machine.evaluate(start + Duration::from_secs(600), &healthy()),
            RolloutTransition::Hold
        );
        assert_eq!(machine.percentage(), 10);

        machine.resume(start + Duration::from_secs(600)).unwrap();
        assert_eq!(machine.phase(), RolloutPhase::Ramping);
        assert_eq!(
            machine.evaluate(start + Duration::from_secs(601), &healthy()),
            RolloutTransition::Hold
        );

        machine.pause().unwrap();
        assert!(matches!(
            machine.evaluate(start + Duration::from_secs(602), &failing()),
            RolloutTransition::RolledBack { .. }
        ));
        assert!(machine.pause().is_err());
    }

    #[test]
    fn test_invalid_plan_rejected() {
        let bad = RolloutPlan::default().with_steps(vec![50, 10]);
        assert!(RolloutMachine::new(bad, Instant::now()).is_err());
    }
}
