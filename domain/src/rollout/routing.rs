//! Deterministic traffic bucketing

use sha2::{Digest, Sha256};

/// Stable bucket in `0..100` for a routing key.
pub fn traffic_bucket(key: &str) -> u8 {
    let digest = Sha256::digest(key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % 100) as u8
}

/// Whether a key falls inside the first `percentage` buckets.
pub fn routes_through(key: &str, percentage: u8) -> bool {
    percentage >= 100 || traffic_bucket(key) < percentage
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_is_stable() {
        assert_eq!(traffic_bucket("session-1"), traffic_bucket("session-1"));
        assert!(traffic_bucket("session-1") < 100);
    }

    #[test]
    fn test_bounds() {
        assert!(!routes_through("anything", 0));
        assert!(routes_through("anything", 100));
    }

    #[test]
    fn test_routing_is_monotonic_in_percentage() {
        for i in 0..200 {
            let key = format!("session-{}", i);
            if routes_through(&key, 10) {
                assert!(routes_through(&key, 25));
            }
        }
    }

    #[test]
    fn test_distribution_is_roughly_uniform() {
        let routed = (0..10_000)
            .filter(|i| routes_through(&format!("req-{}", i), 25))
            .count();
        assert!((2_000..3_000).contains(&routed), "routed {}", routed);
    }
}
