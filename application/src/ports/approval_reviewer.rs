//! Approval reviewer port for results that need a human decision.
//!
//! # Flow
//!
//! ```text
//! risk_assessed ──policy: review──▶ pending_review
//!                                        │ ReviewNotice (request_id, risk, summary)
//!                                        ▼
//!                               ApprovalReviewer::review()
//!                                        │ ReviewVerdict (request_id, decision, reviewer_id)
//!                                        ▼
//!                         approved / denied   (escalated on timeout or error)
//! ```
//!
//! # Built-in Implementations
//!
//! - [`AutoApproveReviewer`] - Always approves
//! - [`AutoDenyReviewer`] - Always denies
//!
//! Channel-based and interactive reviewers live in the outer layers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use wallbounce_domain::{RequestId, RiskLevel};

/// What the reviewer is asked to decide on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewNotice {
    pub request_id: RequestId,
    pub risk_level: RiskLevel,
    pub consensus_summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Deny,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewDecision::Approve => "approve",
            ReviewDecision::Deny => "deny",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub request_id: RequestId,
    pub decision: ReviewDecision,
    pub reviewer_id: String,
}

impl ReviewVerdict {
    pub fn approve(request_id: RequestId, reviewer_id: impl Into<String>) -> Self {
        Self {
            request_id,
            decision: ReviewDecision::Approve,
            reviewer_id: reviewer_id.into(),
        }
    }

    pub fn deny(request_id: RequestId, reviewer_id: impl Into<String>) -> Self {
        Self {
            request_id,
            decision: ReviewDecision::Deny,
            reviewer_id: reviewer_id.into(),
        }
    }
}

/// Failures of the review process itself, not decisions.
///
/// Any of these resolves the admission to `escalated`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReviewError {
    #[error("Review cancelled")]
    Cancelled,

    #[error("Reviewer channel closed")]
    ChannelClosed,

    #[error("I/O error: {0}")]
    Io(String),
}

#[async_trait]
pub trait ApprovalReviewer: Send + Sync {
    async fn review(&self, notice: ReviewNotice) -> Result<ReviewVerdict, ReviewError>;
}

/// Reviewer that approves everything (tests, trusted batch runs)
pub struct AutoApproveReviewer;

#[async_trait]
impl ApprovalReviewer for AutoApproveReviewer {
    async fn review(&self, notice: ReviewNotice) -> Result<ReviewVerdict, ReviewError> {
        Ok(ReviewVerdict::approve(notice.request_id, "auto-approve"))
    }
}

/// Reviewer that denies everything
pub struct AutoDenyReviewer;

#[async_trait]
impl ApprovalReviewer for AutoDenyReviewer {
    async fn review(&self, notice: ReviewNotice) -> Result<ReviewVerdict, ReviewError> {
        Ok(ReviewVerdict::deny(notice.request_id, "auto-deny"))
    }
}
