//! Rolling window of completed-request samples

use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Outcome of one completed engine request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestSample {
    pub at: Instant,
    pub latency: Duration,
    pub success: bool,
}

impl RequestSample {
    pub fn success(at: Instant, latency: Duration) -> Self {
        Self {
            at,
            latency,
            success: true,
        }
    }

    pub fn failure(at: Instant, latency: Duration) -> Self {
        Self {
            at,
            latency,
            success: false,
        }
    }
}

/// Aggregates over the samples currently in the window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct WindowStats {
    pub samples: usize,
    pub errors: usize,
    pub error_rate: f64,
    /// Nearest-rank 95th percentile; `None` for an empty window
    pub p95_latency: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct MetricsWindow {
    span: Duration,
    samples: VecDeque<RequestSample>,
}

impl MetricsWindow {
    pub fn new(span: Duration) -> Self {
        Self {
            span,
            samples: VecDeque::new(),
        }
    }

    /// Append a sample and drop those that fell out of the window.
    pub fn record(&mut self, sample: RequestSample) {
        let now = sample.at;
        self.samples.push_back(sample);
        self.prune(now);
    }

    /// Drop samples older than the window span.
    pub fn prune(&mut self, now: Instant) {
        while let Some(front) = self.samples.front() {
            if now.saturating_duration_since(front.at) > self.span {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn stats(&mut self, now: Instant) -> WindowStats {
        self.prune(now);
        let samples = self.samples.len();
        if samples == 0 {
            return WindowStats::default();
        }
        let errors = self.samples.iter().filter(|s| !s.success).count();
        let mut latencies: Vec<Duration> = self.samples.iter().map(|s| s.latency).collect();
        latencies.sort();
        let rank = ((samples as f64) * 0.95).ceil() as usize;
        let p95 = latencies[rank.clamp(1, samples) - 1];
        WindowStats {
            samples,
            errors,
            error_rate: errors as f64 / samples as f64,
            p95_latency: Some(p95),
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
