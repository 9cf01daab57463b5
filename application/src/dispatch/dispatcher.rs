//! Provider Dispatcher
//!
//! Runs one round of provider calls:
//!
//! - providers whose circuit refuses a permit are skipped
//! - parallel mode fans out on a [`JoinSet`] bounded by a semaphore;
//!   sequential mode chains providers, appending the previous answer
//! - each call has its own timeout and is retried (with exponential
//!   backoff) unless the error is non-retryable, the call is a half-open
//!   probe, or the failure just opened the circuit
//! - every failed call leaves a `timeout`/`error` stub in the outcome

use crate::clock;
use crate::config::DispatchParams;
use crate::ports::metrics::MetricsSink;
use crate::ports::progress::ProgressNotifier;
use crate::ports::provider::{Provider, ProviderError, ProviderReply};
use crate::dispatch::circuit_registry::CircuitBreakerRegistry;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wallbounce_domain::{
    AnalysisRequest, CircuitPermit, CircuitState, ExecutionOptions, ProviderDescriptor, ProviderId,
    ProviderResponse,
};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Dispatch cancelled")]
pub struct DispatchCancelled;

/// Per-round context handed in by the consensus loop.
#[derive(Clone, Copy)]
pub struct DispatchRound<'a> {
    pub round: u32,
    /// Last successful answer of earlier rounds; seeds a sequential chain
    pub previous: Option<&'a ProviderResponse>,
    pub progress: &'a dyn ProgressNotifier,
    pub cancel: Option<&'a CancellationToken>,
}

/// Everything one round produced.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// One entry per admitted provider: the answer or a failure stub
    pub responses: Vec<ProviderResponse>,
    pub errors: Vec<(ProviderId, ProviderError)>,
    /// Providers refused by their circuit at dispatch time
    pub skipped: Vec<ProviderId>,
}

impl DispatchOutcome {
    pub fn successes(&self) -> usize {
        self.responses.iter().filter(|r| r.is_ok()).count()
    }

    fn record(
        &mut self,
        response: ProviderResponse,
        error: Option<ProviderError>,
        round: &DispatchRound<'_>,
    ) {
        round
            .progress
            .on_provider_complete(round.round, &response.provider, response.is_ok());
        if let Some(error) = error {
            self.errors.push((response.provider.clone(), error));
        }
        self.responses.push(response);
    }
}

pub struct ProviderDispatcher {
    providers: Vec<Arc<dyn Provider>>,
    circuits: Arc<CircuitBreakerRegistry>,
    params: DispatchParams,
    metrics: Arc<dyn MetricsSink>,
}

impl ProviderDispatcher {
    /// Providers are kept ordered by tier, then id.
    pub fn new(
        mut providers: Vec<Arc<dyn Provider>>,
        circuits: Arc<CircuitBreakerRegistry>,
        params: DispatchParams,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        providers.sort_by(|a, b| {
            let (a, b) = (a.descriptor(), b.descriptor());
            a.tier.cmp(&b.tier).then_with(|| a.id.cmp(&b.id))
        });
        Self {
            providers,
            circuits,
            params,
            metrics,
        }
    }

    pub fn configured(&self) -> usize {
        self.providers.len()
    }

    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    pub fn descriptor(&self, id: &ProviderId) -> Option<&ProviderDescriptor> {
        self.providers
            .iter()
            .map(|p| p.descriptor())
            .find(|d| &d.id == id)
    }

    /// Providers not yet tried whose circuit would admit a call, in tier order.
    pub fn available(&self, exclude: &HashSet<ProviderId>, now: Instant) -> Vec<Arc<dyn Provider>> {
        self.providers
            .iter()
            .filter(|p| {
                let id = &p.descriptor().id;
                !exclude.contains(id) && self.circuits.is_available(id, now)
            })
            .cloned()
            .collect()
    }

    /// Run `batch` for `request`.
    ///
    /// Waits until every admitted call has answered, failed or timed out.
    pub async fn dispatch(
        &self,
        request: &AnalysisRequest,
        batch: &[Arc<dyn Provider>],
        round: DispatchRound<'_>,
    ) -> Result<DispatchOutcome, DispatchCancelled> {
        let now = clock::now();
        let mut outcome = DispatchOutcome::default();
        let mut admitted = Vec::with_capacity(batch.len());
        for provider in batch {
            let id = &provider.descriptor().id;
            match self.circuits.try_acquire(id, now) {
                Some(permit) => admitted.push((Arc::clone(provider), permit)),
                None => {
                    debug!(provider = %id, "Skipping provider with open circuit");
                    outcome.skipped.push(id.clone());
                }
            }
        }

        let ids: Vec<ProviderId> = admitted
            .iter()
            .map(|(p, _)| p.descriptor().id.clone())
            .collect();
        info!(
            request_id = %request.id(),
            round = round.round,
            providers = ?ids,
            parallel = request.options().parallel,
            "Dispatching round"
        );
        round.progress.on_round_start(round.round, &ids);

        let ctx = CallContext {
            timeout: request
                .options()
                .timeout
                .unwrap_or(self.params.provider_timeout),
            params: self.params,
            circuits: Arc::clone(&self.circuits),
            metrics: Arc::clone(&self.metrics),
        };

        if request.options().parallel {
            self.run_parallel(request, admitted, &ctx, &round, &mut outcome)
                .await?;
        } else {
            self.run_sequential(request, admitted, &ctx, &round, &mut outcome)
                .await?;
        }
        Ok(outcome)
    }

    async fn run_parallel(
        &self,
        request: &AnalysisRequest,
        admitted: Vec<(Arc<dyn Provider>, CircuitPermit)>,
        ctx: &CallContext,
        round: &DispatchRound<'_>,
        outcome: &mut DispatchOutcome,
    ) -> Result<(), DispatchCancelled> {
        let semaphore = Arc::new(Semaphore::new(self.params.max_concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for (provider, permit) in admitted {
            let ctx = ctx.clone();
            let semaphore = Arc::clone(&semaphore);
            let prompt = request.prompt().to_string();
            let options = request.options().clone();

            join_set.spawn(async move {
                let _slot = semaphore.acquire_owned().await.ok();
                ctx.call(provider.as_ref(), &prompt, &options, permit).await
            });
        }

        loop {
            let joined = if let Some(token) = round.cancel {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        join_set.abort_all();
                        return Err(DispatchCancelled);
                    }
                    joined = join_set.join_next() => joined,
                }
            } else {
                join_set.join_next().await
            };

            let Some(joined) = joined else {
                break;
            };

            match joined {
                Ok((response, error)) => outcome.record(response, error, round),
                Err(e) => warn!("Provider task join error: {}", e),
            }
        }
        Ok(())
    }

    async fn run_sequential(
        &self,
        request: &AnalysisRequest,
        admitted: Vec<(Arc<dyn Provider>, CircuitPermit)>,
        ctx: &CallContext,
        round: &DispatchRound<'_>,
        outcome: &mut DispatchOutcome,
    ) -> Result<(), DispatchCancelled> {
        let mut previous = round.previous.cloned();

        for (provider, permit) in admitted {
            let prompt = match &previous {
                Some(prev) => chain_prompt(request.prompt(), prev),
                None => request.prompt().to_string(),
            };
            let call = ctx.call(provider.as_ref(), &prompt, request.options(), permit);

            let (response, error) = if let Some(token) = round.cancel {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(DispatchCancelled),
                    result = call => result,
                }
            } else {
                call.await
            };

            if response.is_ok() {
                previous = Some(response.clone());
            }
            outcome.record(response, error, round);
        }
        Ok(())
    }
}

/// Prompt for the next link of a sequential chain.
fn chain_prompt(prompt: &str, previous: &ProviderResponse) -> String {
    format!(
        "{}\n\n---\nPrevious analysis ({}):\n{}\n---\n\
         Check the analysis above, correct anything that is wrong, and give your own complete answer.",
        prompt, previous.provider, previous.content
    )
}

/// What a spawned call needs; cloned into each task.
#[derive(Clone)]
struct CallContext {
    timeout: Duration,
    params: DispatchParams,
    circuits: Arc<CircuitBreakerRegistry>,
    metrics: Arc<dyn MetricsSink>,
}

impl CallContext {
    async fn call(
        &self,
        provider: &dyn Provider,
        prompt: &str,
        options: &ExecutionOptions,
        permit: CircuitPermit,
    ) -> (ProviderResponse, Option<ProviderError>) {
        let descriptor = provider.descriptor();
        let id = &descriptor.id;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let started = tokio::time::Instant::now();
            let result = match tokio::time::timeout(self.timeout, provider.execute(prompt, options)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.timeout)),
            };
            let elapsed = started.elapsed();

            let error = match result {
                Ok(reply) => {
                    self.circuits.record_success(id, clock::now());
                    self.metrics.record_provider_call(id, true, elapsed);
                    debug!(provider = %id, attempts, latency_ms = elapsed.as_millis() as u64, "Provider answered");
                    return (to_response(descriptor, reply, elapsed, attempts), None);
                }
                Err(error) => error,
            };

            let state = self.circuits.record_failure(id, clock::now());
            self.metrics.record_provider_call(id, false, elapsed);

            let retry = attempts <= self.params.max_retries
                && error.is_retryable()
                && permit == CircuitPermit::Normal
                && state == CircuitState::Closed;
            if !retry {
                warn!(provider = %id, attempts, error = %error, "Provider failed");
                let stub = if error.is_timeout() {
                    ProviderResponse::timeout(id.clone(), elapsed)
                } else {
                    ProviderResponse::error(id.clone(), error.to_string()).with_latency(elapsed)
                };
                return (stub.with_attempts(attempts), Some(error));
            }

            let backoff = self.params.backoff_for(attempts);
            debug!(
                provider = %id,
                attempt = attempts,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "Retrying provider"
            );
            tokio::time::sleep(backoff).await;
        }
    }
}

fn to_response(
    descriptor: &ProviderDescriptor,
    reply: ProviderReply,
    elapsed: Duration,
    attempts: u32,
) -> ProviderResponse {
    let latency = if reply.latency.is_zero() {
        elapsed
    } else {
        reply.latency
    };
    let cost = if reply.cost > 0.0 {
        reply.cost
    } else {
        descriptor.cost_for(reply.tokens.total())
    };
    let response = ProviderResponse::ok(descriptor.id.clone(), reply.content)
        .with_tokens(reply.tokens)
        .with_latency(latency)
        .with_cost(cost)
        .with_attempts(attempts);
    match reply.confidence {
        Some(confidence) => response.with_confidence(confidence),
        None => response,
    }
}
