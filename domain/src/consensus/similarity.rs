//! Textual similarity between provider answers.
//!
//! Any metric used for agreement must be symmetric and bounded to [0, 1];
//! [`TermFrequencyCosine`] is the default.

use std::collections::HashMap;

/// Symmetric similarity in [0, 1].
pub trait SimilarityMetric: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Cosine similarity over lower-cased term-frequency vectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct TermFrequencyCosine;

impl TermFrequencyCosine {
    fn term_frequencies(text: &str) -> HashMap<String, u32> {
        let mut terms = HashMap::new();
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            *terms.entry(token.to_lowercase()).or_insert(0) += 1;
        }
        terms
    }
}

impl SimilarityMetric for TermFrequencyCosine {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let left = Self::term_frequencies(a);
        let right = Self::term_frequencies(b);

        match (left.is_empty(), right.is_empty()) {
            (true, true) => return 1.0,
            (true, false) | (false, true) => return 0.0,
            _ => {}
        }

        let dot: f64 = left
            .iter()
            .filter_map(|(term, &count)| right.get(term).map(|&other| f64::from(count * other)))
            .sum();
        let norm = |v: &HashMap<String, u32>| {
            v.values()
                .map(|&c| f64::from(c) * f64::from(c))
                .sum::<f64>()
                .sqrt()
        };

        (dot / (norm(&left) * norm(&right))).clamp(0.0, 1.0)
    }
}
