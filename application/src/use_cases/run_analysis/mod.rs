//! RunAnalysis use case
//!
//! One request through the whole engine:
//!
//! ```text
//! rollout gate ─▶ cache ─▶ consensus loop (dispatcher + circuits) ─▶ cache store
//!      │                                                                │
//!   legacy                                               admission ◀────┘
//!                                                            │
//!                                           metrics + rollout sample ─▶ caller
//! ```
//!
//! Steps after the rollout gate run under the request timeout and the
//! optional cancellation token. Either one aborts every provider call still
//! outstanding for that request and nothing else.

mod types;

pub use types::{AnalysisOutcome, AnalysisResponse, EngineSnapshot, RunAnalysisError};

use crate::admission::AdmissionController;
use crate::clock;
use crate::config::EngineConfig;
use crate::consensus::ConsensusEngine;
use crate::dispatch::{CircuitBreakerRegistry, ProviderDispatcher};
use crate::ports::approval_reviewer::{ApprovalReviewer, AutoDenyReviewer};
use crate::ports::audit_log::{AuditLog, InMemoryAuditLog};
use crate::ports::metrics::{MetricsSink, NoMetrics, RequestOutcome};
use crate::ports::progress::{NoProgress, ProgressNotifier};
use crate::ports::provider::Provider;
use crate::ports::result_cache::{NoCache, ResultCache};
use crate::rollout::RolloutController;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wallbounce_domain::config::validation::has_errors;
use wallbounce_domain::{
    AnalysisRequest, ConsensusResult, Fingerprint, ProviderId, SimilarityMetric,
    TermFrequencyCosine,
};

/// Wires the engine components from an [`EngineConfig`].
///
/// Unset collaborators fall back to the built-ins: no cache, an in-memory
/// audit log, no metrics, term-frequency cosine similarity and a reviewer
/// that denies everything.
pub struct RunAnalysisBuilder {
    config: EngineConfig,
    providers: Vec<Arc<dyn Provider>>,
    cache: Arc<dyn ResultCache>,
    reviewer: Arc<dyn ApprovalReviewer>,
    audit: Arc<dyn AuditLog>,
    metrics: Arc<dyn MetricsSink>,
    similarity: Arc<dyn SimilarityMetric>,
    cancellation_token: Option<CancellationToken>,
}

impl RunAnalysisBuilder {
    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_reviewer(mut self, reviewer: Arc<dyn ApprovalReviewer>) -> Self {
        self.reviewer = reviewer;
        self
    }

    pub fn with_audit_log(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_similarity(mut self, similarity: Arc<dyn SimilarityMetric>) -> Self {
        self.similarity = similarity;
        self
    }

    /// Set a cancellation token for graceful interruption
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub fn build(self) -> Result<RunAnalysisUseCase, RunAnalysisError> {
        if self.providers.is_empty() {
            return Err(RunAnalysisError::NoProviders);
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            let id = &provider.descriptor().id;
            if !seen.insert(id.clone()) {
                return Err(RunAnalysisError::InvalidConfig(format!(
                    "duplicate provider id '{}'",
                    id
                )));
            }
        }

        let issues = self.config.validate();
        for issue in issues.iter().filter(|i| !i.is_error()) {
            warn!("{}", issue);
        }
        if has_errors(&issues) {
            let messages: Vec<String> = issues
                .iter()
                .filter(|i| i.is_error())
                .map(|i| i.message.clone())
                .collect();
            return Err(RunAnalysisError::InvalidConfig(messages.join("; ")));
        }

        let circuits = Arc::new(CircuitBreakerRegistry::new(
            self.config.circuit,
            self.providers.iter().map(|p| p.descriptor().id.clone()),
        ));
        let dispatcher = Arc::new(ProviderDispatcher::new(
            self.providers,
            Arc::clone(&circuits),
            self.config.dispatch,
            Arc::clone(&self.metrics),
        ));
        let engine = ConsensusEngine::new(
            Arc::clone(&dispatcher),
            self.similarity,
            self.config.consensus,
            self.config.tasks,
        );
        let admission =
            AdmissionController::new(self.config.admission, self.reviewer, self.audit);
        let rollout = RolloutController::new(self.config.rollout.clone())
            .map_err(|e| RunAnalysisError::InvalidConfig(e.to_string()))?;

        info!(
            version = self.config.version,
            providers = dispatcher.configured(),
            rollout = rollout.percentage(),
            "Engine ready"
        );

        Ok(RunAnalysisUseCase {
            config: self.config,
            dispatcher,
            engine,
            circuits,
            admission,
            rollout: Arc::new(rollout),
            cache: self.cache,
            metrics: self.metrics,
            cancellation_token: self.cancellation_token,
        })
    }
}

/// Use case for running one analysis request through the engine
pub struct RunAnalysisUseCase {
    config: EngineConfig,
    dispatcher: Arc<ProviderDispatcher>,
    engine: ConsensusEngine,
    circuits: Arc<CircuitBreakerRegistry>,
    admission: AdmissionController,
    rollout: Arc<RolloutController>,
    cache: Arc<dyn ResultCache>,
    metrics: Arc<dyn MetricsSink>,
    cancellation_token: Option<CancellationToken>,
}

impl RunAnalysisUseCase {
    pub fn builder(config: EngineConfig, providers: Vec<Arc<dyn Provider>>) -> RunAnalysisBuilder {
        RunAnalysisBuilder {
            config,
            providers,
            cache: Arc::new(NoCache),
            reviewer: Arc::new(AutoDenyReviewer),
            audit: Arc::new(InMemoryAuditLog::new()),
            metrics: Arc::new(NoMetrics),
            similarity: Arc::new(TermFrequencyCosine),
            cancellation_token: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn rollout(&self) -> &Arc<RolloutController> {
        &self.rollout
    }

    pub fn audit_log(&self) -> &Arc<dyn AuditLog> {
        self.admission.audit_log()
    }

    /// Execute without progress reporting
    pub async fn execute(
        &self,
        request: AnalysisRequest,
    ) -> Result<AnalysisOutcome, RunAnalysisError> {
        self.execute_with_progress(request, &NoProgress).await
    }

    /// Execute with progress callbacks
    pub async fn execute_with_progress(
        &self,
        request: AnalysisRequest,
        progress: &dyn ProgressNotifier,
    ) -> Result<AnalysisOutcome, RunAnalysisError> {
        let started = tokio::time::Instant::now();

        if !self.rollout.should_route(&request.routing_key()) {
            debug!(request_id = %request.id(), "Routed to legacy path");
            self.metrics
                .record_request(started.elapsed(), RequestOutcome::Legacy);
            return Ok(AnalysisOutcome::Legacy { request });
        }

        info!(
            request_id = %request.id(),
            task_type = %request.task_type(),
            config_version = self.config.version,
            "Starting analysis"
        );

        // Per-request token: a timeout here must not cancel other requests.
        let token = match &self.cancellation_token {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };

        let deadline = started + self.config.request_timeout;
        let result = if token.is_cancelled() {
            Err(RunAnalysisError::Cancelled)
        } else {
            self.run(&request, progress, &token, deadline).await
        };

        let elapsed = started.elapsed();
        match &result {
            Ok(response) => {
                info!(
                    request_id = %request.id(),
                    status = %response.approval_status,
                    confidence = response.confidence,
                    agreement = response.agreement,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Analysis complete"
                );
                self.metrics
                    .record_request(elapsed, response.approval_status.into());
                self.rollout.record_completion(elapsed, true);
            }
            Err(RunAnalysisError::Cancelled) => {
                info!(request_id = %request.id(), "Analysis cancelled");
                self.metrics
                    .record_request(elapsed, RequestOutcome::Cancelled);
            }
            Err(e) => {
                warn!(request_id = %request.id(), error = %e, "Analysis failed");
                self.metrics.record_request(elapsed, RequestOutcome::Failed);
                self.rollout.record_completion(elapsed, false);
            }
        }

        result.map(AnalysisOutcome::Engine)
    }

    async fn run(
        &self,
        request: &AnalysisRequest,
        progress: &dyn ProgressNotifier,
        token: &CancellationToken,
        deadline: tokio::time::Instant,
    ) -> Result<AnalysisResponse, RunAnalysisError> {
        let consensus = self.consensus(request, progress, token);
        let (result, from_cache) = match tokio::time::timeout_at(deadline, consensus).await {
            Ok(outcome) => outcome?,
            Err(_) => {
                token.cancel();
                return Err(RunAnalysisError::Timeout(self.config.request_timeout));
            }
        };

        // A review that outlives the deadline escalates instead of failing.
        let review_budget = deadline.saturating_duration_since(tokio::time::Instant::now());
        let admission = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(RunAnalysisError::Cancelled),
            admission = self.admission.admit_within(request, &result, progress, review_budget) => admission?,
        };

        Ok(AnalysisResponse::assemble(
            request.id(),
            result,
            admission,
            from_cache,
        ))
    }

    /// Cached or freshly computed consensus, and whether it came from cache.
    async fn consensus(
        &self,
        request: &AnalysisRequest,
        progress: &dyn ProgressNotifier,
        token: &CancellationToken,
    ) -> Result<(ConsensusResult, bool), RunAnalysisError> {
        let fingerprint = Fingerprint::of(request);
        let cached = if self.config.cache.enabled {
            let hit = self.cache.get(&fingerprint).await;
            self.metrics.record_cache_lookup(hit.is_some());
            hit
        } else {
            None
        };

        let (result, from_cache) = match cached {
            Some(result) => {
                debug!(request_id = %request.id(), fingerprint = %fingerprint, "Cache hit");
                progress.on_cache_hit();
                (result, true)
            }
            None => {
                let result = self.engine.run(request, progress, Some(token)).await?;
                if self.config.cache.enabled && result.is_clean() {
                    self.cache
                        .set(fingerprint, result.clone(), self.config.cache.ttl)
                        .await;
                }
                (result, false)
            }
        };
        Ok((result, from_cache))
    }

    /// Metrics, rollout state and circuit states in one snapshot.
    pub fn metrics_snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            config_version: self.config.version,
            metrics: self.metrics.snapshot(),
            rollout: self.rollout.state(),
            circuits: self.circuits.snapshot(clock::now()),
        }
    }

    /// Health of every configured provider, in dispatch order.
    pub async fn check_providers(&self) -> Vec<(ProviderId, bool)> {
        let mut report = Vec::with_capacity(self.dispatcher.configured());
        for provider in self.dispatcher.providers() {
            let healthy = provider.health_check().await;
            report.push((provider.descriptor().id.clone(), healthy));
        }
        report
    }

    /// Wait for deferred reviews to resolve (deferred review mode only).
    pub async fn drain_pending_reviews(&self) {
        self.admission.drain_pending().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdmissionParams, ReviewMode};
    use crate::ports::approval_reviewer::{
        ApprovalReviewer, AutoApproveReviewer, ReviewError, ReviewNotice, ReviewVerdict,
    };
    use crate::ports::provider::{ProviderError, ProviderReply};
    use crate::testing::{ScriptedProvider, Step, TableSimilarity};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use wallbounce_domain::{
        AdmissionState, ApprovalStatus, ConsensusResult, ProviderDescriptor, RiskLevel,
        RolloutPlan, SensitiveOperation, TaskType,
    };

    #[derive(Default)]
    struct MapCache(Mutex<HashMap<Fingerprint, ConsensusResult>>);

    #[async_trait]
    impl ResultCache for MapCache {
        async fn get(&self, key: &Fingerprint) -> Option<ConsensusResult> {
            self.0.lock().unwrap().get(key).cloned()
        }

        async fn set(&self, key: Fingerprint, value: ConsensusResult, _ttl: Duration) {
            self.0.lock().unwrap().insert(key, value);
        }
    }

    fn full_traffic() -> EngineConfig {
        EngineConfig::default().with_rollout(RolloutPlan::default().with_steps(vec![100]))
    }

    fn providers(list: &[&Arc<ScriptedProvider>]) -> Vec<Arc<dyn Provider>> {
        list.iter()
            .map(|p| Arc::clone(*p) as Arc<dyn Provider>)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_of_three_agree_and_auto_approve() {
        let a = Arc::new(ScriptedProvider::replying("a", "A", Some(0.9)));
        let b = Arc::new(ScriptedProvider::replying("b", "B", Some(0.85)));
        let c = Arc::new(ScriptedProvider::hanging("c"));
        let audit = Arc::new(InMemoryAuditLog::new());
        let use_case = RunAnalysisUseCase::builder(full_traffic(), providers(&[&a, &b, &c]))
            .with_similarity(Arc::new(TableSimilarity(vec![(("A", "B"), 0.8)])))
            .with_audit_log(audit.clone())
            .build()
            .unwrap();

        let request = AnalysisRequest::new("Is this lock-free queue correct?", TaskType::Basic)
            .unwrap();
        let request_id = request.id();
        let response = use_case
            .execute(request)
            .await
            .unwrap()
            .into_response()
            .unwrap();

        assert!((response.confidence - 0.875).abs() < 1e-9);
        assert!((response.agreement - 0.8).abs() < 1e-9);
        assert_eq!(response.risk_level, RiskLevel::Low);
        assert_eq!(response.approval_status, ApprovalStatus::Approved);
        assert!(response.approved);
        assert_eq!(
            response.providers_used,
            vec![ProviderId::from("a"), ProviderId::from("b")]
        );
        assert_eq!(audit.entries_for(request_id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_critical_lands_in_pending_review() {
        let ps: Vec<Arc<ScriptedProvider>> = ["a", "b", "c", "d"]
            .iter()
            .zip(["A", "B", "C", "D"])
            .map(|(id, content)| Arc::new(ScriptedProvider::replying(id, content, Some(0.95))))
            .collect();
        let table = TableSimilarity(vec![
            (("A", "B"), 0.9),
            (("A", "C"), 0.9),
            (("A", "D"), 0.9),
            (("B", "C"), 0.9),
            (("B", "D"), 0.9),
            (("C", "D"), 0.9),
        ]);
        let config = full_traffic().with_admission(AdmissionParams {
            review_mode: ReviewMode::Deferred,
            ..AdmissionParams::default()
        });
        let audit = Arc::new(InMemoryAuditLog::new());
        let use_case = RunAnalysisUseCase::builder(config, providers(&ps.iter().collect::<Vec<_>>()))
            .with_similarity(Arc::new(table))
            .with_reviewer(Arc::new(AutoApproveReviewer))
            .with_audit_log(audit.clone())
            .build()
            .unwrap();

        let request =
            AnalysisRequest::new("Migrate the payments schema", TaskType::Critical).unwrap();
        let request_id = request.id();
        let response = use_case
            .execute(request)
            .await
            .unwrap()
            .into_response()
            .unwrap();

        assert_eq!(response.risk_level, RiskLevel::Critical);
        assert_eq!(response.approval_status, ApprovalStatus::Pending);
        assert!(!response.approved);
        assert!(!response.content.is_empty());

        use_case.drain_pending_reviews().await;
        let trail = audit.entries_for(request_id).await.unwrap();
        assert!(trail.iter().all(|e| e.to != AdmissionState::AutoApproved));
        assert_eq!(trail.last().unwrap().to, AdmissionState::Approved);
    }

    #[tokio::test]
    async fn test_single_success_for_premium_is_insufficient() {
        let ok = Arc::new(ScriptedProvider::replying("a", "A", Some(0.99)));
        let failing: Vec<Arc<ScriptedProvider>> = ["b", "c", "d"]
            .iter()
            .map(|id| {
                Arc::new(ScriptedProvider::failing(
                    id,
                    ProviderError::InvalidInput("rejected".into()),
                ))
            })
            .collect();
        let mut all = vec![&ok];
        all.extend(failing.iter());
        let use_case = RunAnalysisUseCase::builder(full_traffic(), providers(&all))
            .build()
            .unwrap();

        let request = AnalysisRequest::new("Review this SQL", TaskType::Premium).unwrap();
        let err = use_case.execute(request).await.unwrap_err();
        assert_eq!(
            err,
            RunAnalysisError::InsufficientProviders {
                required: 4,
                available: 1
            }
        );
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_providers() {
        let a = Arc::new(ScriptedProvider::replying("a", "A", Some(0.9)));
        let b = Arc::new(ScriptedProvider::replying("b", "B", Some(0.85)));
        let use_case = RunAnalysisUseCase::builder(full_traffic(), providers(&[&a, &b]))
            .with_similarity(Arc::new(TableSimilarity(vec![(("A", "B"), 0.8)])))
            .with_cache(Arc::new(MapCache::default()))
            .build()
            .unwrap();

        let first = use_case
            .execute(AnalysisRequest::new("What is  Pin?", TaskType::Basic).unwrap())
            .await
            .unwrap()
            .into_response()
            .unwrap();
        let second = use_case
            .execute(AnalysisRequest::new("What is Pin? ", TaskType::Basic).unwrap())
            .await
            .unwrap()
            .into_response()
            .unwrap();

        assert_eq!(a.calls() + b.calls(), 2);
        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(first.content, second.content);
        // Admission still runs for cached results.
        assert_ne!(first.audit_id, second.audit_id);
        assert_eq!(second.approval_status, ApprovalStatus::Approved);
    }

    #[tokio::test]
    async fn test_below_threshold_results_are_not_cached() {
        let a = Arc::new(ScriptedProvider::replying("a", "A", Some(0.9)));
        let b = Arc::new(ScriptedProvider::replying("b", "B", Some(0.9)));
        let use_case = RunAnalysisUseCase::builder(full_traffic(), providers(&[&a, &b]))
            .with_similarity(Arc::new(TableSimilarity(vec![(("A", "B"), 0.1)])))
            .with_cache(Arc::new(MapCache::default()))
            .build()
            .unwrap();

        for _ in 0..2 {
            let response = use_case
                .execute(AnalysisRequest::new("Tabs or spaces?", TaskType::Basic).unwrap())
                .await
                .unwrap()
                .into_response()
                .unwrap();
            assert!(!response.from_cache);
            assert!(response.tags.contains(&wallbounce_domain::ConsensusTag::BelowThreshold));
            assert_eq!(response.risk_level, RiskLevel::Medium);
        }
        assert_eq!(a.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rolled_back_traffic_goes_to_legacy() {
        let a = Arc::new(ScriptedProvider::replying("a", "A", Some(0.9)));
        let b = Arc::new(ScriptedProvider::replying("b", "B", Some(0.9)));
        let config = EngineConfig::default().with_rollout(
            RolloutPlan::default()
                .with_steps(vec![100])
                .with_min_samples(1),
        );
        let use_case = RunAnalysisUseCase::builder(config, providers(&[&a, &b]))
            .build()
            .unwrap();

        use_case
            .rollout()
            .record_completion(Duration::from_secs(1), false);
        use_case.rollout().tick();
        assert_eq!(use_case.metrics_snapshot().rollout.percentage, 0);

        let outcome = use_case
            .execute(AnalysisRequest::new("anything", TaskType::Basic).unwrap())
            .await
            .unwrap();
        assert!(matches!(outcome, AnalysisOutcome::Legacy { .. }));
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout_aborts_providers() {
        let a = Arc::new(ScriptedProvider::hanging("a"));
        let b = Arc::new(ScriptedProvider::hanging("b"));
        let config = full_traffic()
            .with_request_timeout(Duration::from_secs(10))
            .with_admission(AdmissionParams {
                review_timeout: Duration::from_secs(5),
                ..AdmissionParams::default()
            });
        let use_case = RunAnalysisUseCase::builder(config, providers(&[&a, &b]))
            .build()
            .unwrap();

        let err = use_case
            .execute(AnalysisRequest::new("slow", TaskType::Basic).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err, RunAnalysisError::Timeout(Duration::from_secs(10)));
    }

    struct SilentReviewer;

    #[async_trait]
    impl ApprovalReviewer for SilentReviewer {
        async fn review(&self, _notice: ReviewNotice) -> Result<ReviewVerdict, ReviewError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_review_escalates_within_request_deadline() {
        let reply = ProviderReply::new("A").with_confidence(0.9);
        let a = Arc::new(
            ScriptedProvider::new(ProviderDescriptor::new("a"))
                .with_default(Step::Delayed(Duration::from_secs(100), reply)),
        );
        let b = Arc::new(ScriptedProvider::replying("b", "B", Some(0.9)));
        let config = full_traffic()
            .with_request_timeout(Duration::from_secs(120))
            .with_admission(AdmissionParams {
                review_timeout: Duration::from_secs(60),
                ..AdmissionParams::default()
            });
        let use_case = RunAnalysisUseCase::builder(config, providers(&[&a, &b]))
            .with_similarity(Arc::new(TableSimilarity(vec![(("A", "B"), 0.8)])))
            .with_reviewer(Arc::new(SilentReviewer))
            .build()
            .unwrap();

        let request = AnalysisRequest::new("Drop the stale tenants", TaskType::Basic)
            .unwrap()
            .with_sensitive_operation(SensitiveOperation::DataDeletion);
        let started = tokio::time::Instant::now();
        let response = use_case
            .execute(request)
            .await
            .unwrap()
            .into_response()
            .unwrap();

        assert_eq!(response.risk_level, RiskLevel::Critical);
        assert_eq!(response.approval_status, ApprovalStatus::Escalated);
        assert!(!response.approved);
        // Consensus took 100s, so only 20s were left for the review.
        assert_eq!(started.elapsed(), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let a = Arc::new(ScriptedProvider::replying("a", "A", Some(0.9)));
        let b = Arc::new(ScriptedProvider::replying("b", "B", Some(0.9)));
        let token = CancellationToken::new();
        token.cancel();
        let use_case = RunAnalysisUseCase::builder(full_traffic(), providers(&[&a, &b]))
            .with_cancellation(token)
            .build()
            .unwrap();

        let err = use_case
            .execute(AnalysisRequest::new("q", TaskType::Basic).unwrap())
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(a.calls(), 0);
    }

    #[test]
    fn test_build_rejects_bad_config() {
        assert_eq!(
            RunAnalysisUseCase::builder(full_traffic(), vec![])
                .build()
                .err(),
            Some(RunAnalysisError::NoProviders)
        );

        let a = Arc::new(ScriptedProvider::replying("a", "A", None));
        let dup = Arc::new(ScriptedProvider::replying("a", "B", None));
        assert!(matches!(
            RunAnalysisUseCase::builder(full_traffic(), providers(&[&a, &dup])).build(),
            Err(RunAnalysisError::InvalidConfig(_))
        ));
    }
}
