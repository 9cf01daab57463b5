//! Admission Controller
//!
//! Risk-assesses a synthesized result, applies the approval policy and,
//! when the policy asks for it, waits for an external reviewer. Every state
//! change is appended to the audit log before the next one happens.
//!
//! Review runs in one of two modes:
//!
//! - **blocking**: the caller waits for the verdict; a timeout or a failed
//!   review resolves to `escalated`
//! - **deferred**: the caller gets `pending` at once; a background task
//!   waits for the verdict and appends the closing entry

use crate::config::{AdmissionParams, ReviewMode};
use crate::ports::approval_reviewer::{ApprovalReviewer, ReviewDecision, ReviewNotice};
use crate::ports::audit_log::{AuditError, AuditLog};
use crate::ports::progress::ProgressNotifier;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{info, warn};
use wallbounce_domain::{
    AdmissionState, AdmissionTrail, AnalysisRequest, ApprovalDecision, AuditEntry,
    ConsensusResult, DomainError, PolicyVerdict, RiskAssessment, assess_risk,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdmissionError {
    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Transition(#[from] DomainError),
}

/// Decision handed back to the caller, with the assessment behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionOutcome {
    pub decision: ApprovalDecision,
    pub assessment: RiskAssessment,
}

pub struct AdmissionController {
    params: AdmissionParams,
    reviewer: Arc<dyn ApprovalReviewer>,
    audit: Arc<dyn AuditLog>,
    deferred: Mutex<JoinSet<()>>,
}

impl AdmissionController {
    pub fn new(
        params: AdmissionParams,
        reviewer: Arc<dyn ApprovalReviewer>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            params,
            reviewer,
            audit,
            deferred: Mutex::new(JoinSet::new()),
        }
    }

    pub fn audit_log(&self) -> &Arc<dyn AuditLog> {
        &self.audit
    }

    pub async fn admit(
        &self,
        request: &AnalysisRequest,
        result: &ConsensusResult,
        progress: &dyn ProgressNotifier,
    ) -> Result<AdmissionOutcome, AdmissionError> {
        self.admit_within(request, result, progress, self.params.review_timeout)
            .await
    }

    /// Like [`admit`](Self::admit), but a blocking review waits at most
    /// `review_budget`. An exhausted budget escalates like a review timeout.
    pub async fn admit_within(
        &self,
        request: &AnalysisRequest,
        result: &ConsensusResult,
        progress: &dyn ProgressNotifier,
        review_budget: Duration,
    ) -> Result<AdmissionOutcome, AdmissionError> {
        let (mut trail, received) = AdmissionTrail::start(request.id(), request.requester());
        self.audit.append(&received).await?;

        let assessment = assess_risk(
            request.task_type(),
            &result.tags,
            request.sensitive_operations(),
        );
        let assessed = trail.assess(
            assessment.level,
            result.confidence,
            assessment.reason_text(),
        )?;
        self.audit.append(&assessed).await?;

        let action = self.params.policy.action_for(assessment.level);
        let mut verdict = self.params.policy.decide(assessment.level, result.confidence);
        if verdict == PolicyVerdict::AutoApprove && result.is_unverified() {
            verdict = PolicyVerdict::Review;
        }
        let reason = format!("policy: {} -> {}", assessment.level, action.as_str());

        let closing = match verdict {
            PolicyVerdict::AutoApprove => {
                trail.transition(AdmissionState::AutoApproved, None, reason)?
            }
            PolicyVerdict::Deny => trail.transition(AdmissionState::Denied, None, reason)?,
            PolicyVerdict::Review => {
                let pending = trail.transition(AdmissionState::PendingReview, None, reason)?;
                self.audit.append(&pending).await?;

                let notice = ReviewNotice {
                    request_id: request.id(),
                    risk_level: assessment.level,
                    consensus_summary: result.summary(self.params.summary_bytes),
                };
                progress.on_review_requested(&notice);
                info!(
                    request_id = %request.id(),
                    risk = %assessment.level,
                    mode = self.params.review_mode.as_str(),
                    "Result awaiting review"
                );

                match self.params.review_mode {
                    ReviewMode::Blocking => {
                        resolve_review(
                            self.reviewer.as_ref(),
                            notice,
                            &mut trail,
                            self.params.review_timeout.min(review_budget),
                        )
                        .await?
                    }
                    ReviewMode::Deferred => {
                        let decision = trail.decision(&pending);
                        self.defer_review(notice, trail);
                        return Ok(AdmissionOutcome {
                            decision,
                            assessment,
                        });
                    }
                }
            }
        };

        self.audit.append(&closing).await?;
        let decision = trail.decision(&closing);
        info!(
            request_id = %request.id(),
            risk = %assessment.level,
            outcome = %decision.outcome,
            "Admission decided"
        );
        Ok(AdmissionOutcome {
            decision,
            assessment,
        })
    }

    fn defer_review(&self, notice: ReviewNotice, mut trail: AdmissionTrail) {
        let reviewer = Arc::clone(&self.reviewer);
        let audit = Arc::clone(&self.audit);
        let timeout = self.params.review_timeout;

        let mut deferred = self.deferred.lock().unwrap_or_else(PoisonError::into_inner);
        while deferred.try_join_next().is_some() {}
        deferred.spawn(async move {
            let request_id = notice.request_id;
            match resolve_review(reviewer.as_ref(), notice, &mut trail, timeout).await {
                Ok(entry) => {
                    if let Err(e) = audit.append(&entry).await {
                        warn!(request_id = %request_id, error = %e, "Failed to record review outcome");
                    } else {
                        info!(request_id = %request_id, outcome = %entry.to, "Deferred review resolved");
                    }
                }
                Err(e) => warn!(request_id = %request_id, error = %e, "Deferred review failed"),
            }
        });
    }

    /// Deferred reviews not yet resolved.
    pub fn pending_reviews(&self) -> usize {
        self.deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Wait for every deferred review to resolve.
    pub async fn drain_pending(&self) {
        let mut deferred = std::mem::take(
            &mut *self.deferred.lock().unwrap_or_else(PoisonError::into_inner),
        );
        while let Some(joined) = deferred.join_next().await {
            if let Err(e) = joined {
                warn!("Deferred review task failed: {}", e);
            }
        }
    }
}

/// Wait for the reviewer and move the trail out of `pending_review`.
async fn resolve_review(
    reviewer: &dyn ApprovalReviewer,
    notice: ReviewNotice,
    trail: &mut AdmissionTrail,
    timeout: Duration,
) -> Result<AuditEntry, DomainError> {
    let request_id = notice.request_id;
    let (to, reviewer_id, reason) =
        match tokio::time::timeout(timeout, reviewer.review(notice)).await {
            Err(_) => (
                AdmissionState::Escalated,
                None,
                format!("no review decision within {}s", timeout.as_secs()),
            ),
            Ok(Err(e)) => (
                AdmissionState::Escalated,
                None,
                format!("review failed: {}", e),
            ),
            Ok(Ok(verdict)) if verdict.request_id != request_id => (
                AdmissionState::Escalated,
                Some(verdict.reviewer_id),
                format!("verdict was for request {}", verdict.request_id),
            ),
            Ok(Ok(verdict)) => match verdict.decision {
                ReviewDecision::Approve => (
                    AdmissionState::Approved,
                    Some(verdict.reviewer_id),
                    "approved by reviewer".to_string(),
                ),
                ReviewDecision::Deny => (
                    AdmissionState::Denied,
                    Some(verdict.reviewer_id),
                    "denied by reviewer".to_string(),
                ),
            },
        };

    if to == AdmissionState::Escalated {
        warn!(request_id = %request_id, reason = %reason, "Review escalated");
    }
    trail.transition(to, reviewer_id, reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::approval_reviewer::{
        AutoApproveReviewer, AutoDenyReviewer, ReviewError, ReviewVerdict,
    };
    use crate::ports::audit_log::InMemoryAuditLog;
    use crate::ports::progress::NoProgress;
    use async_trait::async_trait;
    use wallbounce_domain::{
        ApprovalStatus, ConsensusTag, ProviderId, RequestId, RiskLevel, SensitiveOperation,
        Strategy, TaskType,
    };

    struct SilentReviewer;

    #[async_trait]
    impl ApprovalReviewer for SilentReviewer {
        async fn review(&self, _notice: ReviewNotice) -> Result<ReviewVerdict, ReviewError> {
            std::future::pending().await
        }
    }

    struct WrongRequestReviewer;

    #[async_trait]
    impl ApprovalReviewer for WrongRequestReviewer {
        async fn review(&self, _notice: ReviewNotice) -> Result<ReviewVerdict, ReviewError> {
            Ok(ReviewVerdict::approve(RequestId::new(), "mallory"))
        }
    }

    fn result(confidence: f64) -> ConsensusResult {
        ConsensusResult {
            content: "Use a bounded channel".to_string(),
            confidence,
            agreement: 0.8,
            providers_used: vec![ProviderId::from("a"), ProviderId::from("b")],
            selected_provider: ProviderId::from("a"),
            strategy: Strategy::Parallel,
            rounds: 1,
            tags: Vec::new(),
            total_tokens: 0,
            total_cost: 0.0,
        }
    }

    fn controller(
        reviewer: Arc<dyn ApprovalReviewer>,
        mode: ReviewMode,
    ) -> (AdmissionController, Arc<InMemoryAuditLog>) {
        let audit = Arc::new(InMemoryAuditLog::new());
        let params = AdmissionParams {
            review_mode: mode,
            ..AdmissionParams::default()
        };
        (
            AdmissionController::new(params, reviewer, audit.clone()),
            audit,
        )
    }

    fn request(task: TaskType) -> AnalysisRequest {
        AnalysisRequest::new("How do I drain a JoinSet?", task).unwrap()
    }

    #[tokio::test]
    async fn test_low_risk_auto_approved() {
        let (c, audit) = controller(Arc::new(AutoDenyReviewer), ReviewMode::Blocking);
        let req = request(TaskType::Basic);
        let outcome = c.admit(&req, &result(0.875), &NoProgress).await.unwrap();

        assert_eq!(outcome.assessment.level, RiskLevel::Low);
        assert_eq!(outcome.decision.outcome, AdmissionState::AutoApproved);
        assert_eq!(outcome.decision.status(), ApprovalStatus::Approved);

        let trail = audit.entries_for(req.id()).await.unwrap();
        let states: Vec<_> = trail.iter().map(|e| e.to).collect();
        assert_eq!(
            states,
            vec![
                AdmissionState::Received,
                AdmissionState::RiskAssessed,
                AdmissionState::AutoApproved
            ]
        );
        assert_eq!(outcome.decision.audit_id, trail[2].id);
    }

    #[tokio::test]
    async fn test_medium_needs_confidence() {
        let (c, _) = controller(Arc::new(AutoDenyReviewer), ReviewMode::Blocking);
        let req = request(TaskType::Premium);

        let outcome = c.admit(&req, &result(0.9), &NoProgress).await.unwrap();
        assert_eq!(outcome.decision.outcome, AdmissionState::AutoApproved);

        let outcome = c.admit(&req, &result(0.8), &NoProgress).await.unwrap();
        assert_eq!(outcome.decision.outcome, AdmissionState::Denied);
        assert_eq!(outcome.decision.reviewer_id.as_deref(), Some("auto-deny"));
    }

    #[tokio::test]
    async fn test_critical_never_auto_approved() {
        let (c, audit) = controller(Arc::new(AutoApproveReviewer), ReviewMode::Blocking);
        let req = request(TaskType::Critical);
        let outcome = c.admit(&req, &result(0.99), &NoProgress).await.unwrap();

        assert_eq!(outcome.assessment.level, RiskLevel::Critical);
        assert_eq!(outcome.decision.outcome, AdmissionState::Approved);
        let trail = audit.entries_for(req.id()).await.unwrap();
        assert!(trail.iter().any(|e| e.to == AdmissionState::PendingReview));
        assert!(trail.iter().all(|e| e.to != AdmissionState::AutoApproved));
    }

    #[tokio::test]
    async fn test_unverified_goes_to_review() {
        let (c, _) = controller(Arc::new(AutoDenyReviewer), ReviewMode::Blocking);
        let mut single = result(0.99);
        single.tags.push(ConsensusTag::Unverified);
        let outcome = c
            .admit(&request(TaskType::Basic), &single, &NoProgress)
            .await
            .unwrap();
        assert_eq!(outcome.assessment.level, RiskLevel::High);
        assert_eq!(outcome.decision.outcome, AdmissionState::Denied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_review_timeout_escalates() {
        let (c, audit) = controller(Arc::new(SilentReviewer), ReviewMode::Blocking);
        let req = request(TaskType::Critical);
        let outcome = c.admit(&req, &result(0.95), &NoProgress).await.unwrap();

        assert_eq!(outcome.decision.status(), ApprovalStatus::Escalated);
        let last = audit.entries_for(req.id()).await.unwrap().pop().unwrap();
        assert!(last.reason.contains("300s"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_review_budget_escalates() {
        let (c, audit) = controller(Arc::new(SilentReviewer), ReviewMode::Blocking);
        let req = request(TaskType::Critical);
        let started = tokio::time::Instant::now();
        let outcome = c
            .admit_within(&req, &result(0.95), &NoProgress, Duration::from_secs(20))
            .await
            .unwrap();

        assert_eq!(outcome.decision.status(), ApprovalStatus::Escalated);
        assert_eq!(started.elapsed(), Duration::from_secs(20));
        let last = audit.entries_for(req.id()).await.unwrap().pop().unwrap();
        assert!(last.reason.contains("20s"));
    }

    #[tokio::test]
    async fn test_mismatched_verdict_escalates() {
        let (c, _) = controller(Arc::new(WrongRequestReviewer), ReviewMode::Blocking);
        let req = request(TaskType::Basic).with_sensitive_operation(SensitiveOperation::DataDeletion);
        let outcome = c.admit(&req, &result(0.95), &NoProgress).await.unwrap();
        assert_eq!(outcome.decision.outcome, AdmissionState::Escalated);
    }

    #[tokio::test]
    async fn test_deferred_review_returns_pending() {
        let (c, audit) = controller(Arc::new(AutoApproveReviewer), ReviewMode::Deferred);
        let req = request(TaskType::Critical);
        let outcome = c.admit(&req, &result(0.95), &NoProgress).await.unwrap();
        assert_eq!(outcome.decision.status(), ApprovalStatus::Pending);

        c.drain_pending().await;
        assert_eq!(c.pending_reviews(), 0);
        let trail = audit.entries_for(req.id()).await.unwrap();
        assert_eq!(trail.len(), 4);
        assert_eq!(trail[3].to, AdmissionState::Approved);
        assert_eq!(trail[3].reviewer_id.as_deref(), Some("auto-approve"));
    }
}
