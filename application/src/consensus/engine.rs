//! Consensus Engine
//!
//! The "bounce" loop: dispatch a round, synthesize everything collected so
//! far, and either accept the result or add one more provider and go again.
//!
//! ```text
//! round 1: initial fan-out ──▶ synthesize ──▶ gate passes? ──▶ done
//!                                   │ no
//!                                   ▼
//! round n: one untried provider ──▶ synthesize ──▶ ...
//!                                   │ nothing left / max_rounds
//!                                   ▼
//!                       best result tagged below_threshold
//! ```
//!
//! Too few successful responses is the only failure: when the deficit can
//! not be covered by untried providers the request fails with
//! [`ConsensusError::InsufficientProviders`].

use crate::clock;
use crate::config::ConsensusParams;
use crate::dispatch::{DispatchRound, ProviderDispatcher};
use crate::ports::progress::ProgressNotifier;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wallbounce_domain::{
    AnalysisRequest, ConsensusResult, ConsensusTag, ProviderId, ProviderResponse,
    SimilarityMetric, Strategy, SynthesisParams, TaskProfiles, WeightedResponse, synthesize,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("No providers configured")]
    NoProviders,

    #[error("Insufficient providers: {available} available, {required} required")]
    InsufficientProviders { required: usize, available: usize },

    #[error("Consensus cancelled")]
    Cancelled,
}

pub struct ConsensusEngine {
    dispatcher: Arc<ProviderDispatcher>,
    metric: Arc<dyn SimilarityMetric>,
    params: ConsensusParams,
    tasks: TaskProfiles,
}

impl ConsensusEngine {
    pub fn new(
        dispatcher: Arc<ProviderDispatcher>,
        metric: Arc<dyn SimilarityMetric>,
        params: ConsensusParams,
        tasks: TaskProfiles,
    ) -> Self {
        Self {
            dispatcher,
            metric,
            params,
            tasks,
        }
    }

    pub async fn run(
        &self,
        request: &AnalysisRequest,
        progress: &dyn ProgressNotifier,
        cancel: Option<&CancellationToken>,
    ) -> Result<ConsensusResult, ConsensusError> {
        let configured = self.dispatcher.configured();
        if configured == 0 {
            return Err(ConsensusError::NoProviders);
        }

        let profile = self.tasks.for_task(request.task_type());
        let required = profile.required(configured);
        let mut tried: HashSet<ProviderId> = HashSet::new();

        let pool = self.dispatcher.available(&tried, clock::now());
        if pool.len() < required {
            warn!(
                request_id = %request.id(),
                required,
                available = pool.len(),
                "Not enough providers available"
            );
            return Err(ConsensusError::InsufficientProviders {
                required,
                available: pool.len(),
            });
        }

        let strategy = if request.options().parallel {
            Strategy::Parallel
        } else {
            Strategy::Sequential
        };
        let mut batch: Vec<_> = pool
            .into_iter()
            .take(profile.fanout(configured))
            .collect();
        let mut collected: Vec<WeightedResponse> = Vec::new();
        let mut last_ok: Option<ProviderResponse> = None;
        let mut round = 0u32;

        loop {
            round += 1;
            let outcome = self
                .dispatcher
                .dispatch(
                    request,
                    &batch,
                    DispatchRound {
                        round,
                        previous: last_ok.as_ref(),
                        progress,
                        cancel,
                    },
                )
                .await
                .map_err(|_| ConsensusError::Cancelled)?;

            tried.extend(batch.iter().map(|p| p.descriptor().id.clone()));
            for response in outcome.responses {
                if response.is_ok() {
                    last_ok = Some(response.clone());
                }
                let weight = self
                    .dispatcher
                    .descriptor(&response.provider)
                    .map(|d| d.weight)
                    .unwrap_or(1.0);
                collected.push(WeightedResponse::new(response, weight));
            }

            let successes = collected.iter().filter(|w| w.response.is_ok()).count();
            let remaining = self.dispatcher.available(&tried, clock::now());
            let exhausted = remaining.is_empty() || round >= self.params.max_rounds;

            if successes < required || successes == 0 {
                progress.on_round_complete(round, None);
                if exhausted {
                    warn!(
                        request_id = %request.id(),
                        round,
                        successes,
                        required,
                        "Too few successful responses"
                    );
                    return Err(ConsensusError::InsufficientProviders {
                        required,
                        available: successes,
                    });
                }
                let deficit = required.saturating_sub(successes).max(1);
                debug!(request_id = %request.id(), round, deficit, "Topping up providers");
                batch = remaining.into_iter().take(deficit).collect();
                continue;
            }

            let params = SynthesisParams {
                centroid_tolerance: self.params.centroid_tolerance,
                strategy,
                rounds: round,
            };
            let Some(result) = synthesize(&collected, self.metric.as_ref(), &params) else {
                return Err(ConsensusError::InsufficientProviders {
                    required,
                    available: 0,
                });
            };
            progress.on_round_complete(round, Some(&result));

            if self.params.gate.passes(&result) {
                info!(
                    request_id = %request.id(),
                    round,
                    confidence = result.confidence,
                    agreement = result.agreement,
                    providers = result.contributor_count(),
                    "Consensus reached"
                );
                return Ok(result);
            }

            if exhausted {
                warn!(
                    request_id = %request.id(),
                    round,
                    confidence = result.confidence,
                    agreement = result.agreement,
                    "Consensus below threshold"
                );
                return Ok(result.with_tag(ConsensusTag::BelowThreshold));
            }

            debug!(
                request_id = %request.id(),
                round,
                confidence = result.confidence,
                agreement = result.agreement,
                "Quality gate not met, bouncing to another provider"
            );
            batch = remaining.into_iter().take(1).collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatchParams;
    use crate::dispatch::CircuitBreakerRegistry;
    use crate::ports::metrics::NoMetrics;
    use crate::ports::progress::NoProgress;
    use crate::ports::provider::{Provider, ProviderError};
    use crate::testing::{ScriptedProvider, TableSimilarity};
    use wallbounce_domain::{CircuitPolicy, ProviderQuota, TaskProfile, TaskType};

    fn engine(
        providers: Vec<Arc<ScriptedProvider>>,
        metric: TableSimilarity,
        params: ConsensusParams,
        tasks: TaskProfiles,
    ) -> ConsensusEngine {
        let providers: Vec<Arc<dyn Provider>> = providers
            .into_iter()
            .map(|p| p as Arc<dyn Provider>)
            .collect();
        let circuits = Arc::new(CircuitBreakerRegistry::new(
            CircuitPolicy::default(),
            providers.iter().map(|p| p.descriptor().id.clone()),
        ));
        let dispatcher = Arc::new(ProviderDispatcher::new(
            providers,
            circuits,
            DispatchParams::default(),
            Arc::new(NoMetrics),
        ));
        ConsensusEngine::new(dispatcher, Arc::new(metric), params, tasks)
    }

    fn pair_of_two() -> TaskProfiles {
        let mut tasks = TaskProfiles::default();
        tasks.basic = TaskProfile::new(ProviderQuota::Count(2), ProviderQuota::Count(2));
        tasks
    }

    fn basic() -> AnalysisRequest {
        AnalysisRequest::new("Explain backpressure in bounded channels", TaskType::Basic).unwrap()
    }

    #[tokio::test]
    async fn test_accepts_on_first_round() {
        let a = Arc::new(ScriptedProvider::replying("a", "A", Some(0.9)));
        let b = Arc::new(ScriptedProvider::replying("b", "B", Some(0.85)));
        let e = engine(
            vec![a, b],
            TableSimilarity(vec![(("A", "B"), 0.8)]),
            ConsensusParams::default(),
            pair_of_two(),
        );

        let result = e.run(&basic(), &NoProgress, None).await.unwrap();
        assert_eq!(result.rounds, 1);
        assert!(result.is_clean());
        assert!((result.confidence - 0.875).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_bounces_to_another_provider() {
        let a = Arc::new(ScriptedProvider::replying("a", "A", Some(0.9)));
        let b = Arc::new(ScriptedProvider::replying("b", "B", Some(0.9)));
        let c = Arc::new(ScriptedProvider::replying("c", "C", Some(0.9)));
        let e = engine(
            vec![a, b, c.clone()],
            TableSimilarity(vec![(("A", "B"), 0.2), (("A", "C"), 0.9), (("B", "C"), 0.9)]),
            ConsensusParams::default(),
            pair_of_two(),
        );

        let result = e.run(&basic(), &NoProgress, None).await.unwrap();
        assert_eq!(result.rounds, 2);
        assert_eq!(c.calls(), 1);
        assert_eq!(result.providers_used.len(), 3);
        assert_eq!(result.content, "C");
        assert!(result.is_clean());
    }

    #[tokio::test]
    async fn test_below_threshold_when_exhausted() {
        let a = Arc::new(ScriptedProvider::replying("a", "A", Some(0.9)));
        let b = Arc::new(ScriptedProvider::replying("b", "B", Some(0.9)));
        let e = engine(
            vec![a, b],
            TableSimilarity(vec![(("A", "B"), 0.2)]),
            ConsensusParams::default(),
            pair_of_two(),
        );

        let result = e.run(&basic(), &NoProgress, None).await.unwrap();
        assert!(result.is_below_threshold());
        assert_eq!(result.rounds, 1);
    }

    #[tokio::test]
    async fn test_max_rounds_bounds_the_loop() {
        let a = Arc::new(ScriptedProvider::replying("a", "A", Some(0.9)));
        let b = Arc::new(ScriptedProvider::replying("b", "B", Some(0.9)));
        let c = Arc::new(ScriptedProvider::replying("c", "C", Some(0.9)));
        let params = ConsensusParams {
            max_rounds: 1,
            ..ConsensusParams::default()
        };
        let e = engine(
            vec![a, b, c.clone()],
            TableSimilarity(vec![(("A", "B"), 0.2)]),
            params,
            pair_of_two(),
        );

        let result = e.run(&basic(), &NoProgress, None).await.unwrap();
        assert!(result.is_below_threshold());
        assert_eq!(c.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_provider_is_replaced() {
        let a = Arc::new(ScriptedProvider::failing(
            "a",
            ProviderError::InvalidInput("bad".into()),
        ));
        let b = Arc::new(ScriptedProvider::replying("b", "B", Some(0.9)));
        let c = Arc::new(ScriptedProvider::replying("c", "C", Some(0.8)));
        let e = engine(
            vec![a, b, c.clone()],
            TableSimilarity(vec![(("B", "C"), 0.9)]),
            ConsensusParams::default(),
            pair_of_two(),
        );

        let result = e.run(&basic(), &NoProgress, None).await.unwrap();
        assert_eq!(result.rounds, 2);
        assert_eq!(c.calls(), 1);
        assert_eq!(
            result.providers_used,
            vec![ProviderId::from("b"), ProviderId::from("c")]
        );
    }

    #[tokio::test]
    async fn test_insufficient_before_dispatch() {
        let a = Arc::new(ScriptedProvider::replying("a", "A", Some(0.9)));
        let request =
            AnalysisRequest::new("Rotate the signing keys", TaskType::Premium).unwrap();
        let e = engine(
            vec![a.clone()],
            TableSimilarity(vec![]),
            ConsensusParams::default(),
            TaskProfiles::default(),
        );

        let err = e.run(&request, &NoProgress, None).await.unwrap_err();
        assert_eq!(
            err,
            ConsensusError::InsufficientProviders {
                required: 4,
                available: 1
            }
        );
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_providers() {
        let e = engine(
            vec![],
            TableSimilarity(vec![]),
            ConsensusParams::default(),
            TaskProfiles::default(),
        );
        assert_eq!(
            e.run(&basic(), &NoProgress, None).await.unwrap_err(),
            ConsensusError::NoProviders
        );
    }
}
