//! Per-provider circuit breaker state machine.
//!
//! The breaker counts consecutive failures inside a rolling window. Once
//! the threshold is reached the circuit *opens* and the provider is skipped.
//! When the cooldown has elapsed the circuit goes *half-open* and hands out
//! exactly one probe permit: a successful probe closes the circuit, a failed
//! one re-opens it.
//!
//! ```text
//!            failures >= threshold
//!   Closed ─────────────────────────▶ Open
//!     ▲                                 │ cooldown elapsed
//!     │ probe ok                        ▼
//!     └──────────────────────────── HalfOpen ── probe failed ──▶ Open
//! ```
//!
//! All methods take an explicit `now` so the state machine is deterministic
//! under test; the application layer supplies `Instant::now()`.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Circuit breaker state for a single provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Healthy — requests allowed.
    Closed,
    /// Tripped — requests blocked until cooldown expires.
    Open,
    /// Cooldown expired — one probe request allowed.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What happens to the cooldown when a half-open probe fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeFailurePolicy {
    /// Re-open with the base cooldown.
    #[default]
    ResetCooldown,
    /// Multiply the previous cooldown by `factor`, capped at `max`.
    Exponential { factor: u32, max: Duration },
}

/// Thresholds shared by every breaker in a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitPolicy {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Failures further apart than this do not count as one streak.
    pub failure_window: Duration,
    /// Time spent open before a probe is allowed.
    pub cooldown: Duration,
    pub probe_failure: ProbeFailurePolicy,
}

impl Default for CircuitPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
            probe_failure: ProbeFailurePolicy::ResetCooldown,
        }
    }
}

/// Permission to call a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitPermit {
    /// Circuit closed: normal call.
    Normal,
    /// Circuit half-open: this call is the single trial request.
    Probe,
}

/// Circuit breaker for one provider.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    policy: CircuitPolicy,
    state: CircuitState,
    consecutive_failures: u32,
    streak_started: Option<Instant>,
    last_failure: Option<Instant>,
    opened_at: Option<Instant>,
    cooldown: Duration,
    probe_issued_at: Option<Instant>,
    trips: u32,
}

impl CircuitBreaker {
    pub fn new(policy: CircuitPolicy) -> Self {
        Self {
            policy,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            streak_started: None,
            last_failure: None,
            opened_at: None,
            cooldown: policy.cooldown,
            probe_issued_at: None,
            trips: 0,
        }
    }

    /// Observed state at `now`, without consuming a probe.
    pub fn state_at(&self, now: Instant) -> CircuitState {
        match self.state {
            CircuitState::Open if self.cooldown_elapsed(now) => CircuitState::HalfOpen,
            state => state,
        }
    }

    /// Whether a call at `now` would be permitted.
    pub fn is_available(&self, now: Instant) -> bool {
        match self.state_at(now) {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => !self.probe_outstanding(now),
        }
    }

    /// Ask for permission to call the provider.
    ///
    /// In half-open state only one caller receives [`CircuitPermit::Probe`];
    /// everyone else is refused until that probe reports back. A probe that
    /// never reports (its request was cancelled) is considered abandoned
    /// after one cooldown and a new one is handed out.
    pub fn try_acquire(&mut self, now: Instant) -> Option<CircuitPermit> {
        match self.state {
            CircuitState::Closed => Some(CircuitPermit::Normal),
            CircuitState::Open => {
                if !self.cooldown_elapsed(now) {
                    return None;
                }
                self.state = CircuitState::HalfOpen;
                self.probe_issued_at = Some(now);
                Some(CircuitPermit::Probe)
            }
            CircuitState::HalfOpen => {
                if self.probe_outstanding(now) {
                    return None;
                }
                self.probe_issued_at = Some(now);
                Some(CircuitPermit::Probe)
            }
        }
    }

    /// Record a success: the circuit closes and the streak resets.
    pub fn record_success(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.streak_started = None;
        self.opened_at = None;
        self.probe_issued_at = None;
        self.cooldown = self.policy.cooldown;
    }

    /// Record a failure; returns the state after the failure.
    pub fn record_failure(&mut self, now: Instant) -> CircuitState {
        self.last_failure = Some(now);
        match self.state {
            CircuitState::HalfOpen => {
                self.cooldown = match self.policy.probe_failure {
                    ProbeFailurePolicy::ResetCooldown => self.policy.cooldown,
                    ProbeFailurePolicy::Exponential { factor, max } => {
                        self.cooldown.saturating_mul(factor.max(1)).min(max)
                    }
                };
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.open(now);
            }
            // Late failures from calls admitted before the trip.
            CircuitState::Open => {}
            CircuitState::Closed => {
                let streak_expired = self
                    .streak_started
                    .is_some_and(|start| now.saturating_duration_since(start) > self.policy.failure_window);
                if streak_expired || self.streak_started.is_none() {
                    self.streak_started = Some(now);
                    self.consecutive_failures = 0;
                }
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.consecutive_failures >= self.policy.failure_threshold {
                    self.cooldown = self.policy.cooldown;
                    self.open(now);
                }
            }
        }
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    /// Number of times this circuit has opened.
    pub fn trips(&self) -> u32 {
        self.trips
    }

    /// Cooldown that applies to the current (or next) open period.
    pub fn current_cooldown(&self) -> Duration {
        self.cooldown
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.probe_issued_at = None;
        self.trips = self.trips.saturating_add(1);
    }

    fn cooldown_elapsed(&self, now: Instant) -> bool {
        self.opened_at
            .is_none_or(|opened| now.saturating_duration_since(opened) >= self.cooldown)
    }

    fn probe_outstanding(&self, now: Instant) -> bool {
        self.probe_issued_at
            .is_some_and(|issued| now.saturating_duration_since(issued) < self.cooldown)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitPolicy::default())
    }
}
