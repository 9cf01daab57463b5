//! Result cache port

use async_trait::async_trait;
use std::time::Duration;
use wallbounce_domain::{ConsensusResult, Fingerprint};

/// Fingerprint → consensus result store with per-entry TTL.
///
/// Implementations must never return an entry past its TTL. Writes for the
/// same fingerprint carry the same value, so racing writers need no
/// coordination beyond an atomic put.
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, key: &Fingerprint) -> Option<ConsensusResult>;

    async fn set(&self, key: Fingerprint, value: ConsensusResult, ttl: Duration);
}

/// Cache that stores nothing
pub struct NoCache;

#[async_trait]
impl ResultCache for NoCache {
    async fn get(&self, _key: &Fingerprint) -> Option<ConsensusResult> {
        None
    }

    async fn set(&self, _key: Fingerprint, _value: ConsensusResult, _ttl: Duration) {}
}
