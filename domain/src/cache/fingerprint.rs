//! Request fingerprint used as the cache key

use crate::core::request::AnalysisRequest;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 of the normalized prompt, task type and canonical options.
///
/// Timeouts do not change the answer and are left out; temperature is
/// rounded to three decimals so float noise does not split the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(request: &AnalysisRequest) -> Self {
        let options = request.options();
        let mut hasher = Sha256::new();
        hasher.update(request.normalized_prompt().as_bytes());
        hasher.update([0x00]);
        hasher.update(request.task_type().as_str().as_bytes());
        hasher.update([0x00]);
        let max_tokens = options
            .max_tokens
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        let temperature = options
            .temperature
            .map(|t| format!("{:.3}", t))
            .unwrap_or_else(|| "-".to_string());
        let mode = if options.parallel { "parallel" } else { "sequential" };
        hasher.update(format!("max_tokens={};temperature={};mode={}", max_tokens, temperature, mode));
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
