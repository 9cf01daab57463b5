//! Circuit Breaker Registry
//!
//! One breaker per provider, shared by every in-flight request. Updates are
//! serialized behind a single lock that is never held across an await.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{info, warn};
use wallbounce_domain::{CircuitBreaker, CircuitPermit, CircuitPolicy, CircuitState, ProviderId};

/// Point-in-time view of one breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitSnapshot {
    pub provider: ProviderId,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub trips: u32,
}

pub struct CircuitBreakerRegistry {
    policy: CircuitPolicy,
    breakers: Mutex<HashMap<ProviderId, CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new(policy: CircuitPolicy, providers: impl IntoIterator<Item = ProviderId>) -> Self {
        let breakers = providers
            .into_iter()
            .map(|id| (id, CircuitBreaker::new(policy)))
            .collect();
        Self {
            policy,
            breakers: Mutex::new(breakers),
        }
    }

    pub fn policy(&self) -> &CircuitPolicy {
        &self.policy
    }

    pub fn is_available(&self, provider: &ProviderId, now: Instant) -> bool {
        self.lock()
            .get(provider)
            .is_none_or(|breaker| breaker.is_available(now))
    }

    pub fn state_at(&self, provider: &ProviderId, now: Instant) -> CircuitState {
        self.lock()
            .get(provider)
            .map_or(CircuitState::Closed, |breaker| breaker.state_at(now))
    }

    /// Permission to call `provider`; `None` while its circuit is open or
    /// while another request holds the half-open probe.
    pub fn try_acquire(&self, provider: &ProviderId, now: Instant) -> Option<CircuitPermit> {
        let mut breakers = self.lock();
        let breaker = breakers
            .entry(provider.clone())
            .or_insert_with(|| CircuitBreaker::new(self.policy));
        let permit = breaker.try_acquire(now);
        if permit == Some(CircuitPermit::Probe) {
            info!(provider = %provider, "Circuit half-open, sending probe");
        }
        permit
    }

    /// Returns true when the success closed a tripped circuit.
    pub fn record_success(&self, provider: &ProviderId, now: Instant) -> bool {
        let mut breakers = self.lock();
        let Some(breaker) = breakers.get_mut(provider) else {
            return false;
        };
        let was_tripped = breaker.state_at(now) != CircuitState::Closed;
        breaker.record_success();
        if was_tripped {
            info!(provider = %provider, "Circuit closed");
        }
        was_tripped
    }

    /// Returns the circuit state after the failure.
    pub fn record_failure(&self, provider: &ProviderId, now: Instant) -> CircuitState {
        let mut breakers = self.lock();
        let breaker = breakers
            .entry(provider.clone())
            .or_insert_with(|| CircuitBreaker::new(self.policy));
        let before = breaker.state_at(now);
        let after = breaker.record_failure(now);
        if after == CircuitState::Open && before != CircuitState::Open {
            warn!(
                provider = %provider,
                failures = breaker.consecutive_failures(),
                cooldown_ms = breaker.current_cooldown().as_millis() as u64,
                "Circuit opened"
            );
        }
        after
    }

    /// Snapshot of every breaker, sorted by provider id.
    pub fn snapshot(&self, now: Instant) -> Vec<CircuitSnapshot> {
        let mut snapshot: Vec<CircuitSnapshot> = self
            .lock()
            .iter()
            .map(|(id, breaker)| CircuitSnapshot {
                provider: id.clone(),
                state: breaker.state_at(now),
                consecutive_failures: breaker.consecutive_failures(),
                trips: breaker.trips(),
            })
            .collect();
        snapshot.sort_by(|a, b| a.provider.cmp(&b.provider));
        snapshot
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ProviderId, CircuitBreaker>> {
        self.breakers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
