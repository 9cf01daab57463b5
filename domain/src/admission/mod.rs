//! Admission control domain
//!
//! Risk assessment and the approval policy are pure functions of the
//! request and the consensus result. Every state change of an admission is
//! captured as an immutable [`AuditEntry`].
//!
//! ```text
//! received ─▶ risk_assessed ─┬─▶ auto_approved
//!                            ├─▶ denied
//!                            └─▶ pending_review ─┬─▶ approved   (reviewer)
//!                                                ├─▶ denied     (reviewer)
//!                                                └─▶ escalated  (timeout)
//! ```

pub mod audit;
pub mod policy;
pub mod risk;

pub use audit::{AdmissionState, AdmissionTrail, ApprovalDecision, ApprovalStatus, AuditEntry, AuditId};
pub use policy::{ApprovalPolicy, PolicyAction, PolicyVerdict};
pub use risk::{RiskAssessment, RiskLevel, assess_risk};
