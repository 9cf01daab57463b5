//! Admission state machine and audit records.

use super::risk::RiskLevel;
use crate::core::error::DomainError;
use crate::core::request::RequestId;
use crate::util::current_timestamp_ms;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditId(Uuid);

impl AuditId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AuditId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AuditId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// States of one admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionState {
    Received,
    RiskAssessed,
    AutoApproved,
    PendingReview,
    /// Approved by a human reviewer
    Approved,
    /// Review timed out or failed; needs human follow-up
    Escalated,
    Denied,
}

impl AdmissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionState::Received => "received",
            AdmissionState::RiskAssessed => "risk_assessed",
            AdmissionState::AutoApproved => "auto_approved",
            AdmissionState::PendingReview => "pending_review",
            AdmissionState::Approved => "approved",
            AdmissionState::Escalated => "escalated",
            AdmissionState::Denied => "denied",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AdmissionState::AutoApproved
                | AdmissionState::Approved
                | AdmissionState::Escalated
                | AdmissionState::Denied
        )
    }

    pub fn can_transition_to(&self, next: AdmissionState) -> bool {
        use AdmissionState::*;
        matches!(
            (self, next),
            (Received, RiskAssessed)
                | (RiskAssessed, AutoApproved)
                | (RiskAssessed, PendingReview)
                | (RiskAssessed, Denied)
                | (PendingReview, Approved)
                | (PendingReview, Denied)
                | (PendingReview, Escalated)
        )
    }
}

impl std::fmt::Display for AdmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Approval status as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Approved,
    Pending,
    Escalated,
    Denied,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Escalated => "escalated",
            ApprovalStatus::Denied => "denied",
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalStatus::Approved)
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<AdmissionState> for ApprovalStatus {
    fn from(state: AdmissionState) -> Self {
        match state {
            AdmissionState::AutoApproved | AdmissionState::Approved => ApprovalStatus::Approved,
            AdmissionState::Escalated => ApprovalStatus::Escalated,
            AdmissionState::Denied => ApprovalStatus::Denied,
            AdmissionState::Received
            | AdmissionState::RiskAssessed
            | AdmissionState::PendingReview => ApprovalStatus::Pending,
        }
    }
}

/// One immutable line of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditId,
    pub request_id: RequestId,
    /// Position within this request's trail (1-based)
    pub sequence: u32,
    pub from: Option<AdmissionState>,
    pub to: AdmissionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    pub requester: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub reason: String,
    /// Milliseconds since epoch
    pub timestamp: u64,
}

/// The decision that closed (or parked) an admission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    /// Audit entry that recorded this decision
    pub audit_id: AuditId,
    pub request_id: RequestId,
    pub risk_level: RiskLevel,
    pub outcome: AdmissionState,
    pub requester: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<String>,
    pub timestamp: u64,
}

impl ApprovalDecision {
    pub fn status(&self) -> ApprovalStatus {
        self.outcome.into()
    }
}

/// Tracks one admission and produces its audit entries.
///
/// Illegal transitions are refused, so a trail can only ever describe a
/// path through the admission state machine.
#[derive(Debug, Clone)]
pub struct AdmissionTrail {
    request_id: RequestId,
    requester: String,
    state: AdmissionState,
    risk_level: Option<RiskLevel>,
    confidence: Option<f64>,
    sequence: u32,
}

impl AdmissionTrail {
    /// Start a trail; returns it together with the `received` entry.
    pub fn start(request_id: RequestId, requester: impl Into<String>) -> (Self, AuditEntry) {
        let mut trail = Self {
            request_id,
            requester: requester.into(),
            state: AdmissionState::Received,
            risk_level: None,
            confidence: None,
            sequence: 0,
        };
        let entry = trail.entry(None, AdmissionState::Received, None, "request received");
        (trail, entry)
    }

    pub fn state(&self) -> AdmissionState {
        self.state
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// `received → risk_assessed`, fixing the risk level for later entries.
    pub fn assess(
        &mut self,
        level: RiskLevel,
        confidence: f64,
        reason: impl Into<String>,
    ) -> Result<AuditEntry, DomainError> {
        self.risk_level = Some(level);
        self.confidence = Some(confidence);
        self.transition(AdmissionState::RiskAssessed, None, reason)
    }

    pub fn transition(
        &mut self,
        to: AdmissionState,
        reviewer_id: Option<String>,
        reason: impl Into<String>,
    ) -> Result<AuditEntry, DomainError> {
        if !self.state.can_transition_to(to) {
            return Err(DomainError::IllegalTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        let from = self.state;
        self.state = to;
        Ok(self.entry(Some(from), to, reviewer_id, &reason.into()))
    }

    /// Decision derived from a terminal (or pending) entry.
    pub fn decision(&self, entry: &AuditEntry) -> ApprovalDecision {
        ApprovalDecision {
            audit_id: entry.id,
            request_id: self.request_id,
            risk_level: self.risk_level.unwrap_or(RiskLevel::Critical),
            outcome: entry.to,
            requester: self.requester.clone(),
            reviewer_id: entry.reviewer_id.clone(),
            timestamp: entry.timestamp,
        }
    }

    fn entry(
        &mut self,
        from: Option<AdmissionState>,
        to: AdmissionState,
        reviewer_id: Option<String>,
        reason: &str,
    ) -> AuditEntry {
        self.sequence += 1;
        AuditEntry {
            id: AuditId::new(),
            request_id: self.request_id,
            sequence: self.sequence,
            from,
            to,
            risk_level: self.risk_level,
            requester: self.requester.clone(),
            reviewer_id,
            confidence: self.confidence,
            reason: reason.to_string(),
            timestamp: current_timestamp_ms(),
        }
    }
}
