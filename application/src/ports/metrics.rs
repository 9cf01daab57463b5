//! Metrics port
//!
//! Counters and latencies for an external monitoring collaborator. The
//! engine only records; exporting is up to the adapter.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use wallbounce_domain::{ApprovalStatus, ProviderId};

/// How a request ended, for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    Approved,
    Pending,
    Escalated,
    Denied,
    /// Routed to the legacy path by the rollout gate
    Legacy,
    /// Insufficient providers, timeout or another engine error
    Failed,
    Cancelled,
}

impl RequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestOutcome::Approved => "approved",
            RequestOutcome::Pending => "pending",
            RequestOutcome::Escalated => "escalated",
            RequestOutcome::Denied => "denied",
            RequestOutcome::Legacy => "legacy",
            RequestOutcome::Failed => "failed",
            RequestOutcome::Cancelled => "cancelled",
        }
    }
}

impl From<ApprovalStatus> for RequestOutcome {
    fn from(status: ApprovalStatus) -> Self {
        match status {
            ApprovalStatus::Approved => RequestOutcome::Approved,
            ApprovalStatus::Pending => RequestOutcome::Pending,
            ApprovalStatus::Escalated => RequestOutcome::Escalated,
            ApprovalStatus::Denied => RequestOutcome::Denied,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProviderCounters {
    pub successes: u64,
    pub failures: u64,
    pub total_latency_ms: u64,
}

/// Point-in-time copy of recorded metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub outcomes: BTreeMap<RequestOutcome, u64>,
    pub mean_request_latency_ms: u64,
    pub providers: BTreeMap<ProviderId, ProviderCounters>,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

pub trait MetricsSink: Send + Sync {
    /// One provider attempt finished.
    fn record_provider_call(&self, provider: &ProviderId, success: bool, latency: Duration);

    /// One request finished (legacy routing included).
    fn record_request(&self, latency: Duration, outcome: RequestOutcome);

    fn record_cache_lookup(&self, _hit: bool) {}

    /// Sinks that keep state in process can expose it here.
    fn snapshot(&self) -> Option<MetricsSnapshot> {
        None
    }
}

/// Sink that discards everything
pub struct NoMetrics;

impl MetricsSink for NoMetrics {
    fn record_provider_call(&self, _provider: &ProviderId, _success: bool, _latency: Duration) {}
    fn record_request(&self, _latency: Duration, _outcome: RequestOutcome) {}
}
