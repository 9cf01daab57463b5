//! In-process metrics sink.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use wallbounce_application::{MetricsSink, MetricsSnapshot, RequestOutcome};
use wallbounce_domain::ProviderId;

#[derive(Default)]
struct Totals {
    snapshot: MetricsSnapshot,
    total_request_latency_ms: u64,
}

/// Counters kept in memory for the lifetime of the process; read them back
/// with [`MetricsSink::snapshot`].
#[derive(Default)]
pub struct InMemoryMetrics {
    totals: Mutex<Totals>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Totals> {
        self.totals.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn millis(latency: Duration) -> u64 {
    u64::try_from(latency.as_millis()).unwrap_or(u64::MAX)
}

impl MetricsSink for InMemoryMetrics {
    fn record_provider_call(&self, provider: &ProviderId, success: bool, latency: Duration) {
        let mut totals = self.lock();
        let counters = totals
            .snapshot
            .providers
            .entry(provider.clone())
            .or_default();
        if success {
            counters.successes += 1;
        } else {
            counters.failures += 1;
        }
        counters.total_latency_ms = counters.total_latency_ms.saturating_add(millis(latency));
    }

    fn record_request(&self, latency: Duration, outcome: RequestOutcome) {
        let mut totals = self.lock();
        totals.total_request_latency_ms =
            totals.total_request_latency_ms.saturating_add(millis(latency));
        totals.snapshot.requests += 1;
        *totals.snapshot.outcomes.entry(outcome).or_insert(0) += 1;
        totals.snapshot.mean_request_latency_ms =
            totals.total_request_latency_ms / totals.snapshot.requests;
    }

    fn record_cache_lookup(&self, hit: bool) {
        let mut totals = self.lock();
        if hit {
            totals.snapshot.cache_hits += 1;
        } else {
            totals.snapshot.cache_misses += 1;
        }
    }

    fn snapshot(&self) -> Option<MetricsSnapshot> {
        Some(self.lock().snapshot.clone())
    }
}
