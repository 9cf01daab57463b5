//! Type definitions for the RunAnalysis use case.

use crate::admission::{AdmissionError, AdmissionOutcome};
use crate::consensus::ConsensusError;
use crate::dispatch::CircuitSnapshot;
use crate::ports::metrics::MetricsSnapshot;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use wallbounce_domain::{
    AnalysisRequest, ApprovalStatus, AuditId, ConsensusResult, ConsensusTag, ProviderId,
    RequestId, RiskLevel, RolloutState, Strategy,
};

/// Errors that surface to the caller.
///
/// Quality shortfalls are never errors; they come back as tags on an
/// [`AnalysisResponse`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunAnalysisError {
    #[error("No providers configured")]
    NoProviders,

    #[error(
        "Insufficient providers: {available} available, {required} required (try again later)"
    )]
    InsufficientProviders { required: usize, available: usize },

    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Admission failed: {0}")]
    Admission(#[from] AdmissionError),
}

impl RunAnalysisError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunAnalysisError::Cancelled)
    }

    /// Service unavailability the caller may retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RunAnalysisError::InsufficientProviders { .. } | RunAnalysisError::Timeout(_)
        )
    }
}

impl From<ConsensusError> for RunAnalysisError {
    fn from(err: ConsensusError) -> Self {
        match err {
            ConsensusError::NoProviders => RunAnalysisError::NoProviders,
            ConsensusError::InsufficientProviders {
                required,
                available,
            } => RunAnalysisError::InsufficientProviders {
                required,
                available,
            },
            ConsensusError::Cancelled => RunAnalysisError::Cancelled,
        }
    }
}

/// Where a request went.
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    /// Not routed through the engine by the rollout gate; the caller serves
    /// it from its legacy path
    Legacy { request: AnalysisRequest },
    Engine(AnalysisResponse),
}

impl AnalysisOutcome {
    pub fn response(&self) -> Option<&AnalysisResponse> {
        match self {
            AnalysisOutcome::Engine(response) => Some(response),
            AnalysisOutcome::Legacy { .. } => None,
        }
    }

    pub fn into_response(self) -> Option<AnalysisResponse> {
        match self {
            AnalysisOutcome::Engine(response) => Some(response),
            AnalysisOutcome::Legacy { .. } => None,
        }
    }
}

/// Caller-facing result.
///
/// `content` is present whatever the approval status; `approved == false`
/// marks it as not yet approved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResponse {
    pub request_id: RequestId,
    pub content: String,
    pub confidence: f64,
    pub agreement: f64,
    pub providers_used: Vec<ProviderId>,
    pub approval_status: ApprovalStatus,
    pub audit_id: AuditId,
    pub risk_level: RiskLevel,
    pub tags: Vec<ConsensusTag>,
    pub strategy: Strategy,
    pub rounds: u32,
    pub from_cache: bool,
    pub approved: bool,
    pub total_tokens: u32,
    pub total_cost: f64,
}

impl AnalysisResponse {
    pub(super) fn assemble(
        request_id: RequestId,
        result: ConsensusResult,
        admission: AdmissionOutcome,
        from_cache: bool,
    ) -> Self {
        let status = admission.decision.status();
        Self {
            request_id,
            content: result.content,
            confidence: result.confidence,
            agreement: result.agreement,
            providers_used: result.providers_used,
            approval_status: status,
            audit_id: admission.decision.audit_id,
            risk_level: admission.decision.risk_level,
            tags: result.tags,
            strategy: result.strategy,
            rounds: result.rounds,
            from_cache,
            approved: status.is_approved(),
            total_tokens: result.total_tokens,
            total_cost: result.total_cost,
        }
    }
}

/// Everything an external monitor needs in one read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub config_version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsSnapshot>,
    pub rollout: RolloutState,
    pub circuits: Vec<CircuitSnapshot>,
}
