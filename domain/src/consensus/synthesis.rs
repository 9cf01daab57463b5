//! Consensus synthesis over one set of responses.
//!
//! # Scoring
//!
//! For the successful responses `r_1..r_n` (n ≥ 2):
//!
//! - `sim(i, j)` — pairwise similarity from the configured metric
//! - `support_i` — mean similarity of `r_i` to every other response
//! - `agreement` — mean of `sim(i, j)` over all unordered pairs
//! - `c_i` — self-reported confidence, or `support_i` when absent
//! - `confidence = Σ w_i·support_i·c_i / Σ w_i·support_i`, where `w_i` is
//!   the provider's capability weight (falls back to `Σ w_i·c_i / Σ w_i`
//!   when every response has zero support)
//!
//! The synthesized content is the answer nearest the consensus centroid:
//! among responses whose support is within `centroid_tolerance` of the
//! best, the highest-weighted provider wins, then the lowest latency, then
//! the provider id. Responses are sorted by provider id first so the
//! result does not depend on arrival order.

use super::result::{ConsensusResult, ConsensusTag, Strategy};
use super::similarity::SimilarityMetric;
use crate::provider::ProviderResponse;
use std::cmp::Ordering;

/// Thresholds a result must meet to be accepted without escalation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityGate {
    pub min_confidence: f64,
    pub min_agreement: f64,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self {
            min_confidence: 0.7,
            min_agreement: 0.6,
        }
    }
}

impl QualityGate {
    /// A single-response result never passes, whatever its numbers.
    pub fn passes(&self, result: &ConsensusResult) -> bool {
        !result.is_unverified()
            && result.confidence >= self.min_confidence
            && result.agreement >= self.min_agreement
    }
}

/// A response paired with its provider's capability weight.
#[derive(Debug, Clone)]
pub struct WeightedResponse {
    pub response: ProviderResponse,
    pub weight: f64,
}

impl WeightedResponse {
    pub fn new(response: ProviderResponse, weight: f64) -> Self {
        Self { response, weight }
    }
}

/// Knobs for a single synthesis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisParams {
    pub centroid_tolerance: f64,
    pub strategy: Strategy,
    pub rounds: u32,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            centroid_tolerance: 0.05,
            strategy: Strategy::Parallel,
            rounds: 1,
        }
    }
}

/// Synthesize a consensus from the successful responses.
///
/// Failed responses are ignored for scoring but still counted in token and
/// cost totals. Returns `None` when nothing succeeded.
pub fn synthesize(
    responses: &[WeightedResponse],
    metric: &dyn SimilarityMetric,
    params: &SynthesisParams,
) -> Option<ConsensusResult> {
    let mut ok: Vec<&WeightedResponse> = responses.iter().filter(|r| r.response.is_ok()).collect();
    if ok.is_empty() {
        return None;
    }
    ok.sort_by(|a, b| a.response.provider.cmp(&b.response.provider));

    let total_tokens = responses
        .iter()
        .map(|r| r.response.tokens.total())
        .fold(0u32, u32::saturating_add);
    let total_cost: f64 = responses.iter().map(|r| r.response.cost).sum();
    let providers_used = ok.iter().map(|r| r.response.provider.clone()).collect();

    if ok.len() == 1 {
        let only = &ok[0].response;
        let result = ConsensusResult {
            content: only.content.clone(),
            confidence: only.confidence.unwrap_or(0.0),
            agreement: 0.0,
            providers_used,
            selected_provider: only.provider.clone(),
            strategy: params.strategy,
            rounds: params.rounds,
            tags: Vec::new(),
            total_tokens,
            total_cost,
        };
        return Some(result.with_tag(ConsensusTag::Unverified));
    }

    let n = ok.len();
    let mut matrix = vec![vec![1.0_f64; n]; n];
    let mut pair_sum = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            let s = metric
                .similarity(&ok[i].response.content, &ok[j].response.content)
                .clamp(0.0, 1.0);
            matrix[i][j] = s;
            matrix[j][i] = s;
            pair_sum += s;
        }
    }
    let pairs = (n * (n - 1) / 2) as f64;
    let agreement = pair_sum / pairs;

    let support: Vec<f64> = (0..n)
        .map(|i| (0..n).filter(|&j| j != i).map(|j| matrix[i][j]).sum::<f64>() / (n - 1) as f64)
        .collect();

    let confidence = weighted_confidence(&ok, &support);
    let selected = select_centroid(&ok, &support, params.centroid_tolerance);

    Some(ConsensusResult {
        content: ok[selected].response.content.clone(),
        confidence,
        agreement,
        providers_used,
        selected_provider: ok[selected].response.provider.clone(),
        strategy: params.strategy,
        rounds: params.rounds,
        tags: Vec::new(),
        total_tokens,
        total_cost,
    })
}

fn weighted_confidence(ok: &[&WeightedResponse], support: &[f64]) -> f64 {
    let own = |i: usize| ok[i].response.confidence.unwrap_or(support[i]);
    let weight = |i: usize| ok[i].weight.max(0.0);

    let denom: f64 = (0..ok.len()).map(|i| weight(i) * support[i]).sum();
    let value = if denom > f64::EPSILON {
        (0..ok.len())
            .map(|i| weight(i) * support[i] * own(i))
            .sum::<f64>()
            / denom
    } else {
        let total_weight: f64 = (0..ok.len()).map(weight).sum();
        if total_weight > f64::EPSILON {
            (0..ok.len()).map(|i| weight(i) * own(i)).sum::<f64>() / total_weight
        } else {
            (0..ok.len()).map(own).sum::<f64>() / ok.len() as f64
        }
    };
    value.clamp(0.0, 1.0)
}

fn select_centroid(ok: &[&WeightedResponse], support: &[f64], tolerance: f64) -> usize {
    let best = support.iter().copied().fold(f64::MIN, f64::max);
    (0..ok.len())
        .filter(|&i| support[i] >= best - tolerance.max(0.0))
        .min_by(|&a, &b| {
            let (ra, rb) = (ok[a], ok[b]);
            rb.weight
                .partial_cmp(&ra.weight)
                .unwrap_or(Ordering::Equal)
                .then_with(|| ra.response.latency.cmp(&rb.response.latency))
                .then_with(|| ra.response.provider.cmp(&rb.response.provider))
        })
        .unwrap_or(0)
}
