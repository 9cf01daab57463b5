//! Process-local result cache with per-entry TTL.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;
use wallbounce_application::ResultCache;
use wallbounce_domain::{CacheEntry, ConsensusResult, Fingerprint};

/// Expiry is checked on read; expired entries are also purged when the
/// cache is full. When still full, the oldest entry is evicted.
pub struct InMemoryResultCache {
    entries: Mutex<HashMap<Fingerprint, CacheEntry>>,
    max_entries: usize,
}

impl InMemoryResultCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Fingerprint, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

#[async_trait]
impl ResultCache for InMemoryResultCache {
    async fn get(&self, key: &Fingerprint) -> Option<ConsensusResult> {
        let now = now();
        let mut entries = self.lock();
        let entry = entries.get(key)?;
        if !entry.is_expired(now) {
            return Some(entry.result.clone());
        }
        entries.remove(key);
        None
    }

    async fn set(&self, key: Fingerprint, value: ConsensusResult, ttl: Duration) {
        let now = now();
        let mut entries = self.lock();

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            entries.retain(|_, entry| !entry.is_expired(now));
            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.created_at)
                    .map(|(fingerprint, _)| fingerprint.clone());
                if let Some(oldest) = oldest {
                    debug!(fingerprint = %oldest.as_str(), "Evicting oldest cache entry");
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(key.clone(), CacheEntry::new(key, value, now, ttl));
    }
}
