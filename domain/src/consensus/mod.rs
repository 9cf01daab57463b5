//! Consensus domain
//!
//! Pure scoring and synthesis over a set of provider responses. The
//! escalation loop that asks more providers lives in the application layer;
//! everything here is deterministic and order-independent.
//!
//! ```text
//!  responses ──▶ pairwise similarity ──▶ support per response
//!                                   │
//!          self-reported confidence ┼──▶ weighted confidence
//!                                   └──▶ agreement (mean pairwise)
//!                                              │
//!                                   QualityGate: conf ≥ 0.7 ∧ agr ≥ 0.6
//! ```

pub mod parsing;
pub mod result;
pub mod similarity;
pub mod synthesis;

pub use parsing::{parse_confidence, strip_confidence_line};
pub use result::{ConsensusResult, ConsensusTag, Strategy};
pub use similarity::{SimilarityMetric, TermFrequencyCosine};
pub use synthesis::{QualityGate, SynthesisParams, WeightedResponse, synthesize};
