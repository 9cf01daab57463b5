//! Rollout Controller
//!
//! Owns the rollout state machine and the rolling metrics window behind one
//! lock. Requests read the traffic percentage at admission time and report
//! their completion; a ticker task re-evaluates the window on a fixed
//! interval.

use crate::clock;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wallbounce_domain::rollout::routes_through;
use wallbounce_domain::{
    DomainError, MetricsWindow, RequestSample, RolloutMachine, RolloutPlan, RolloutState,
    RolloutTransition,
};

struct Inner {
    machine: RolloutMachine,
    window: MetricsWindow,
}

pub struct RolloutController {
    inner: Mutex<Inner>,
}

impl RolloutController {
    pub fn new(plan: RolloutPlan) -> Result<Self, DomainError> {
        let window = MetricsWindow::new(plan.window);
        let machine = RolloutMachine::new(plan, clock::now())?;
        Ok(Self {
            inner: Mutex::new(Inner { machine, window }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn percentage(&self) -> u8 {
        self.lock().machine.percentage()
    }

    pub fn state(&self) -> RolloutState {
        self.lock().machine.state()
    }

    /// Whether a request with this routing key goes through the engine.
    ///
    /// The same key always lands in the same bucket, so a session keeps its
    /// routing for as long as the percentage does not change.
    pub fn should_route(&self, key: &str) -> bool {
        routes_through(key, self.percentage())
    }

    /// Record one completed engine request.
    pub fn record_completion(&self, latency: Duration, success: bool) {
        let now = clock::now();
        let sample = if success {
            RequestSample::success(now, latency)
        } else {
            RequestSample::failure(now, latency)
        };
        self.lock().window.record(sample);
    }

    pub fn tick(&self) -> RolloutTransition {
        self.tick_at(clock::now())
    }

    pub fn tick_at(&self, now: Instant) -> RolloutTransition {
        let transition = {
            let mut inner = self.lock();
            let stats = inner.window.stats(now);
            inner.machine.evaluate(now, &stats)
        };

        match &transition {
            RolloutTransition::Advanced { from, to } => {
                info!(from = *from, to = *to, "Rollout advanced");
            }
            RolloutTransition::RolledBack { from, to, reason } => {
                warn!(from = *from, to = *to, reason = %reason, "Rollout rolled back");
            }
            RolloutTransition::Hold => {}
        }
        transition
    }

    pub fn pause(&self) -> Result<(), DomainError> {
        self.lock().machine.pause()?;
        info!("Rollout paused");
        Ok(())
    }

    pub fn resume(&self) -> Result<(), DomainError> {
        self.lock().machine.resume(clock::now())?;
        info!("Rollout resumed");
        Ok(())
    }

    /// Manual reset after a rollback. The window is cleared so the samples
    /// that caused the rollback do not immediately trip it again.
    pub fn reset_after_rollback(&self) -> Result<(), DomainError> {
        let mut inner = self.lock();
        inner.machine.reset_after_rollback(clock::now())?;
        inner.window.clear();
        info!(percentage = inner.machine.percentage(), "Rollout reset after rollback");
        Ok(())
    }

    /// Drive [`tick`](Self::tick) every `interval` until `cancel` fires.
    pub fn spawn_ticker(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Rollout ticker stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.tick();
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallbounce_domain::RolloutPhase;

    fn plan() -> RolloutPlan {
        RolloutPlan::default()
            .with_steps(vec![50, 100])
            .with_dwell(Duration::from_secs(60))
            .with_min_samples(4)
    }

    #[tokio::test(start_paused = true)]
    async fn test_advances_after_dwell() {
        let rollout = RolloutController::new(plan()).unwrap();
        assert_eq!(rollout.percentage(), 50);
        assert_eq!(rollout.tick(), RolloutTransition::Hold);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(
            rollout.tick(),
            RolloutTransition::Advanced { from: 50, to: 100 }
        );
        assert_eq!(rollout.state().phase, RolloutPhase::Steady);
        assert!(rollout.should_route("any-session"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_holds_until_reset() {
        let rollout = RolloutController::new(plan()).unwrap();
        for _ in 0..4 {
            rollout.record_completion(Duration::from_secs(1), false);
        }
        let transition = rollout.tick();
        assert!(matches!(
            transition,
            RolloutTransition::RolledBack { from: 50, to: 0, .. }
        ));

        let state = rollout.state();
        assert!(state.rollback_triggered);
        assert!(state.rollback_reason.is_some());
        assert!(!rollout.should_route("any-session"));

        // Metrics recover, but nothing re-ramps on its own.
        tokio::time::advance(Duration::from_secs(900)).await;
        assert_eq!(rollout.tick(), RolloutTransition::Hold);
        assert_eq!(rollout.percentage(), 0);

        rollout.reset_after_rollback().unwrap();
        assert!(!rollout.state().rollback_triggered);
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(
            rollout.tick(),
            RolloutTransition::Advanced { from: 0, to: 50 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_too_few_samples_do_not_trip() {
        let rollout = RolloutController::new(plan()).unwrap();
        for _ in 0..3 {
            rollout.record_completion(Duration::from_secs(1), false);
        }
        assert_eq!(rollout.tick(), RolloutTransition::Hold);
        assert_eq!(rollout.percentage(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_blocks_ramp() {
        let rollout = RolloutController::new(plan()).unwrap();
        rollout.pause().unwrap();
        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(rollout.tick(), RolloutTransition::Hold);
        assert!(rollout.pause().is_err());

        rollout.resume().unwrap();
        assert_eq!(rollout.tick(), RolloutTransition::Hold);
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(matches!(rollout.tick(), RolloutTransition::Advanced { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_drives_ramp() {
        let rollout = Arc::new(RolloutController::new(plan()).unwrap());
        let cancel = CancellationToken::new();
        let handle = Arc::clone(&rollout).spawn_ticker(Duration::from_secs(30), cancel.clone());

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(rollout.percentage(), 100);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[test]
    fn test_invalid_plan_rejected() {
        let plan = RolloutPlan::default().with_steps(vec![50, 10]);
        assert!(RolloutController::new(plan).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_stays_bounded_without_ticker() {
        let rollout = RolloutController::new(plan()).unwrap();
        for _ in 0..1_000 {
            rollout.record_completion(Duration::from_millis(20), true);
            tokio::time::advance(Duration::from_secs(1)).await;
        }
        // Only the last five minutes are kept.
        assert!(rollout.lock().window.len() <= 301);
    }
}
