//! Consensus result value object

use crate::provider::ProviderId;
use crate::util::truncate_str;
use serde::{Deserialize, Serialize};

/// How providers were executed for a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Parallel,
    Sequential,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Parallel => "parallel",
            Strategy::Sequential => "sequential",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Quality caveats attached to a result.
///
/// Tags never turn into errors; they are routed to admission control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusTag {
    /// Gate not met and no more rounds or providers were available
    BelowThreshold,
    /// Built from a single response; confidence and agreement are not meaningful
    Unverified,
}

impl ConsensusTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsensusTag::BelowThreshold => "below_threshold",
            ConsensusTag::Unverified => "unverified",
        }
    }
}

impl std::fmt::Display for ConsensusTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Synthesized answer with its quality metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub content: String,
    /// Weighted confidence in [0, 1]
    pub confidence: f64,
    /// Mean pairwise similarity in [0, 1]; 0 for a single response
    pub agreement: f64,
    /// Providers whose successful responses contributed, sorted by id
    pub providers_used: Vec<ProviderId>,
    /// Provider whose answer was chosen as the synthesized content
    pub selected_provider: ProviderId,
    pub strategy: Strategy,
    /// Dispatch rounds it took to reach this result
    pub rounds: u32,
    #[serde(default)]
    pub tags: Vec<ConsensusTag>,
    pub total_tokens: u32,
    pub total_cost: f64,
}

impl ConsensusResult {
    /// Attach a tag, keeping the tag list sorted and unique.
    pub fn with_tag(mut self, tag: ConsensusTag) -> Self {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
            self.tags.sort();
        }
        self
    }

    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn has_tag(&self, tag: ConsensusTag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn is_unverified(&self) -> bool {
        self.has_tag(ConsensusTag::Unverified)
    }

    pub fn is_below_threshold(&self) -> bool {
        self.has_tag(ConsensusTag::BelowThreshold)
    }

    /// No quality caveats.
    pub fn is_clean(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn contributor_count(&self) -> usize {
        self.providers_used.len()
    }

    /// Short human-readable summary for reviewers.
    pub fn summary(&self, max_content_bytes: usize) -> String {
        let content = truncate_str(&self.content, max_content_bytes);
        let ellipsis = if content.len() < self.content.len() {
            "..."
        } else {
            ""
        };
        let tags = if self.tags.is_empty() {
            "none".to_string()
        } else {
            self.tags
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "confidence {:.2}, agreement {:.2}, providers [{}], tags: {}\n{}{}",
            self.confidence,
            self.agreement,
            self.providers_used
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            tags,
            content,
            ellipsis
        )
    }
}
