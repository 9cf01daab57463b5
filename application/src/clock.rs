//! Time source for the application layer.
//!
//! Reads tokio's clock, so paused-time tests move circuit cooldowns,
//! rollout dwell and metric windows together with timers.

use std::time::Instant;

pub fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
