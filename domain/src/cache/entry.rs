//! Cache entry with time-to-live

use super::fingerprint::Fingerprint;
use crate::consensus::ConsensusResult;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub result: ConsensusResult,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(
        fingerprint: Fingerprint,
        result: ConsensusResult,
        created_at: Instant,
        ttl: Duration,
    ) -> Self {
        Self {
            fingerprint,
            result,
            created_at,
            ttl,
        }
    }

    /// Expired entries must never be served, even if still stored.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::Strategy;
    use crate::core::request::AnalysisRequest;
    use crate::core::task::TaskType;

    fn entry(now: Instant, ttl: Duration) -> CacheEntry {
        let result = ConsensusResult {
            content: "answer".to_string(),
            confidence: 0.9,
            agreement: 0.8,
            providers_used: vec!["a".into(), "b".into()],
            selected_provider: "a".into(),
            strategy: Strategy::Parallel,
            rounds: 1,
            tags: Vec::new(),
            total_tokens: 10,
            total_cost: 0.0,
        };
        let request = AnalysisRequest::new("q", TaskType::Basic).unwrap();
        CacheEntry::new(Fingerprint::of(&request), result, now, ttl)
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Instant::now();
        let e = entry(now, Duration::from_secs(60));
        assert!(!e.is_expired(now + Duration::from_secs(59)));
        assert!(e.is_expired(now + Duration::from_secs(60)));
    }

    #[test]
    fn test_zero_ttl_is_immediately_expired() {
        let now = Instant::now();
        assert!(entry(now, Duration::ZERO).is_expired(now));
    }
}
