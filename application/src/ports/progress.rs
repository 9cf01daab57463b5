//! Progress notification port
//!
//! Defines the interface for reporting progress while a request is bounced
//! between providers.

use crate::ports::approval_reviewer::ReviewNotice;
use wallbounce_domain::{ConsensusResult, ProviderId};

/// Callback for progress updates during one request
///
/// Implementations live in the outer layers and can display progress in
/// various ways (stderr lines, structured events, ...).
pub trait ProgressNotifier: Send + Sync {
    /// Called when a dispatch round starts
    fn on_round_start(&self, round: u32, providers: &[ProviderId]);

    /// Called when one provider of the round has finished
    fn on_provider_complete(&self, round: u32, provider: &ProviderId, success: bool);

    /// Called after synthesis; `None` when the round produced too few answers
    fn on_round_complete(&self, round: u32, result: Option<&ConsensusResult>);

    /// Called when a result is parked for human review
    fn on_review_requested(&self, _notice: &ReviewNotice) {}

    /// Called when a cached result is served
    fn on_cache_hit(&self) {}
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl ProgressNotifier for NoProgress {
    fn on_round_start(&self, _round: u32, _providers: &[ProviderId]) {}
    fn on_provider_complete(&self, _round: u32, _provider: &ProviderId, _success: bool) {}
    fn on_round_complete(&self, _round: u32, _result: Option<&ConsensusResult>) {}
}
