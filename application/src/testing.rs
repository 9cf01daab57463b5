//! Test doubles shared by the application tests.

use crate::ports::provider::{Provider, ProviderError, ProviderReply};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wallbounce_domain::{ExecutionOptions, ProviderDescriptor, SimilarityMetric};

/// One scripted behaviour of a provider call.
#[derive(Debug, Clone)]
pub enum Step {
    Reply(ProviderReply),
    Fail(ProviderError),
    /// Never answers; only a timeout or cancellation ends the call
    Hang,
    /// Answers after a delay
    Delayed(Duration, ProviderReply),
}

/// Provider that plays queued steps first, then repeats its default step.
pub struct ScriptedProvider {
    descriptor: ProviderDescriptor,
    queued: Mutex<VecDeque<Step>>,
    default: Step,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(descriptor: ProviderDescriptor) -> Self {
        let default = Step::Reply(ProviderReply::new(format!("answer from {}", descriptor.id)));
        Self {
            descriptor,
            queued: Mutex::new(VecDeque::new()),
            default,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(id: &str, content: &str, confidence: Option<f64>) -> Self {
        let mut reply = ProviderReply::new(content);
        reply.confidence = confidence;
        Self::new(ProviderDescriptor::new(id)).with_default(Step::Reply(reply))
    }

    pub fn failing(id: &str, error: ProviderError) -> Self {
        Self::new(ProviderDescriptor::new(id)).with_default(Step::Fail(error))
    }

    pub fn hanging(id: &str) -> Self {
        Self::new(ProviderDescriptor::new(id)).with_default(Step::Hang)
    }

    pub fn with_default(mut self, step: Step) -> Self {
        self.default = step;
        self
    }

    /// Queue a one-off step, played before the default.
    pub fn first(self, step: Step) -> Self {
        self.queued.lock().unwrap().push_back(step);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn execute(
        &self,
        prompt: &str,
        _options: &ExecutionOptions,
    ) -> Result<ProviderReply, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let step = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());

        match step {
            Step::Reply(reply) => Ok(reply),
            Step::Fail(error) => Err(error),
            Step::Hang => std::future::pending().await,
            Step::Delayed(delay, reply) => {
                tokio::time::sleep(delay).await;
                Ok(reply)
            }
        }
    }
}

/// Similarity looked up by exact content pair; unknown pairs score 0.
pub struct TableSimilarity(pub Vec<((&'static str, &'static str), f64)>);

impl SimilarityMetric for TableSimilarity {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        self.0
            .iter()
            .find(|((x, y), _)| (*x == a && *y == b) || (*x == b && *y == a))
            .map(|(_, s)| *s)
            .unwrap_or(0.0)
    }
}
