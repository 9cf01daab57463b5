//! Domain layer for wallbounce
//!
//! This crate contains the core rules of the consensus engine as plain
//! types and pure functions. It has no dependencies on infrastructure,
//! async runtimes or presentation concerns; time is always passed in.
//!
//! # Core Concepts
//!
//! ## Wall-bounce
//!
//! One request is "bounced" off several independent providers. Each round
//! of responses is scored for agreement and confidence; when the quality
//! gate is not met, more providers are added until it is, or until nothing
//! is left to ask.
//!
//! ## Admission
//!
//! Every synthesized result is risk-assessed and run through an approval
//! policy. Each state change is recorded as an immutable audit entry.
//!
//! ## Rollout
//!
//! Traffic reaches the engine in configured percentage steps, and is pulled
//! back to a safe floor as soon as live error rate or latency breaches its
//! threshold.

pub mod admission;
pub mod cache;
pub mod config;
pub mod consensus;
pub mod core;
pub mod provider;
pub mod rollout;
pub mod util;

// Re-export commonly used types
pub use admission::{
    AdmissionState, AdmissionTrail, ApprovalDecision, ApprovalPolicy, ApprovalStatus, AuditEntry,
    AuditId, PolicyAction, PolicyVerdict, RiskAssessment, RiskLevel, assess_risk,
};
pub use cache::{CacheEntry, Fingerprint};
pub use config::{ConfigIssue, ConfigIssueCode, Severity};
pub use consensus::{
    ConsensusResult, ConsensusTag, QualityGate, SimilarityMetric, Strategy, SynthesisParams,
    TermFrequencyCosine, WeightedResponse, synthesize,
};
pub use core::{
    error::DomainError,
    request::{AnalysisRequest, ExecutionOptions, RequestId, SensitiveOperation},
    task::{ProviderQuota, TaskProfile, TaskProfiles, TaskType},
};
pub use provider::{
    CircuitBreaker, CircuitPermit, CircuitPolicy, CircuitState, ProbeFailurePolicy,
    ProviderDescriptor, ProviderId, ProviderResponse, ResponseStatus, TokenUsage,
};
pub use rollout::{
    MetricsWindow, RequestSample, RollbackFloor, RolloutMachine, RolloutPhase, RolloutPlan,
    RolloutState, RolloutTransition, WindowStats,
};
