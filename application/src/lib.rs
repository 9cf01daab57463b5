//! Application layer for wallbounce
//!
//! This crate contains the engine services, port definitions, and the
//! injected engine configuration. It depends only on the domain layer.
//!
//! | Module | Role |
//! |--------|------|
//! | [`dispatch`] | Circuit breaker registry and provider dispatcher |
//! | [`consensus`] | Bounded "bounce" loop over the dispatcher |
//! | [`admission`] | Risk-gated approval with an append-only audit trail |
//! | [`rollout`] | Traffic gate, metric window and ticker |
//! | [`use_cases`] | `RunAnalysis`: one request through all of the above |

pub mod admission;
pub mod config;
pub mod consensus;
pub mod dispatch;
pub mod ports;
pub mod rollout;
pub mod use_cases;

mod clock;
#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use admission::{AdmissionController, AdmissionError, AdmissionOutcome};
pub use config::{
    AdmissionParams, CacheParams, ConsensusParams, DispatchParams, EngineConfig, ReviewMode,
};
pub use consensus::{ConsensusEngine, ConsensusError};
pub use dispatch::{CircuitBreakerRegistry, CircuitSnapshot, ProviderDispatcher};
pub use ports::{
    approval_reviewer::{
        ApprovalReviewer, AutoApproveReviewer, AutoDenyReviewer, ReviewDecision, ReviewError,
        ReviewNotice, ReviewVerdict,
    },
    audit_log::{AuditError, AuditLog, InMemoryAuditLog},
    metrics::{MetricsSink, MetricsSnapshot, NoMetrics, ProviderCounters, RequestOutcome},
    progress::{NoProgress, ProgressNotifier},
    provider::{Provider, ProviderError, ProviderReply},
    result_cache::{NoCache, ResultCache},
};
pub use rollout::RolloutController;
pub use use_cases::run_analysis::{
    AnalysisOutcome, AnalysisResponse, EngineSnapshot, RunAnalysisBuilder, RunAnalysisError,
    RunAnalysisUseCase,
};
