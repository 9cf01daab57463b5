//! Analysis request value objects

use super::error::DomainError;
use super::task::TaskType;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier of one orchestration cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-request execution options passed through to every provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOptions {
    /// Upper bound on generated tokens
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Per-provider timeout override (falls back to the dispatch default)
    pub timeout: Option<Duration>,
    /// Fan out in parallel (default) or chain providers sequentially
    pub parallel: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_tokens: None,
            temperature: None,
            timeout: None,
            parallel: true,
        }
    }
}

impl ExecutionOptions {
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Operations declared by the caller that raise the risk of acting on an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitiveOperation {
    FileWrite,
    CommandExecution,
    CredentialAccess,
    ExternalCommunication,
    DataDeletion,
    ProductionChange,
}

impl SensitiveOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensitiveOperation::FileWrite => "file_write",
            SensitiveOperation::CommandExecution => "command_execution",
            SensitiveOperation::CredentialAccess => "credential_access",
            SensitiveOperation::ExternalCommunication => "external_communication",
            SensitiveOperation::DataDeletion => "data_deletion",
            SensitiveOperation::ProductionChange => "production_change",
        }
    }

    /// Irreversible operations are always assessed as critical.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            SensitiveOperation::DataDeletion | SensitiveOperation::ProductionChange
        )
    }
}

impl std::fmt::Display for SensitiveOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SensitiveOperation {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "file_write" => Ok(SensitiveOperation::FileWrite),
            "command_execution" => Ok(SensitiveOperation::CommandExecution),
            "credential_access" => Ok(SensitiveOperation::CredentialAccess),
            "external_communication" => Ok(SensitiveOperation::ExternalCommunication),
            "data_deletion" => Ok(SensitiveOperation::DataDeletion),
            "production_change" => Ok(SensitiveOperation::ProductionChange),
            _ => Err(DomainError::invalid_value("sensitive operation", s)),
        }
    }
}

/// A technical query to run through the consensus engine (Value Object)
///
/// Fields are private: once a request has been handed to the dispatcher it
/// is never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    id: RequestId,
    prompt: String,
    task_type: TaskType,
    session_id: Option<String>,
    user_id: Option<String>,
    options: ExecutionOptions,
    sensitive_operations: Vec<SensitiveOperation>,
}

impl AnalysisRequest {
    /// Create a request, rejecting blank prompts.
    pub fn new(prompt: impl Into<String>, task_type: TaskType) -> Result<Self, DomainError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(DomainError::InvalidRequest(
                "prompt cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            id: RequestId::new(),
            prompt,
            task_type,
            session_id: None,
            user_id: None,
            options: ExecutionOptions::default(),
            sensitive_operations: Vec::new(),
        })
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_sensitive_operation(mut self, operation: SensitiveOperation) -> Self {
        if !self.sensitive_operations.contains(&operation) {
            self.sensitive_operations.push(operation);
            self.sensitive_operations.sort();
        }
        self
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    pub fn sensitive_operations(&self) -> &[SensitiveOperation] {
        &self.sensitive_operations
    }

    /// Prompt with surrounding whitespace trimmed and internal runs collapsed.
    pub fn normalized_prompt(&self) -> String {
        self.prompt.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Key used for rollout bucketing: the session when present, so a
    /// session is routed the same way for its whole lifetime.
    pub fn routing_key(&self) -> String {
        match &self.session_id {
            Some(session) => session.clone(),
            None => self.id.to_string(),
        }
    }

    /// Who is asking, for the audit trail.
    pub fn requester(&self) -> &str {
        self.user_id
            .as_deref()
            .or(self.session_id.as_deref())
            .unwrap_or("anonymous")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_prompt_rejected() {
        assert!(AnalysisRequest::new("   \n", TaskType::Basic).is_err());
    }

    #[test]
    fn test_normalized_prompt() {
        let request = AnalysisRequest::new("  How do I\n\n  tune   tokio? ", TaskType::Basic).unwrap();
        assert_eq!(request.normalized_prompt(), "How do I tune tokio?");
    }

    #[test]
    fn test_routing_key_prefers_session() {
        let request = AnalysisRequest::new("q", TaskType::Basic).unwrap();
        assert_eq!(request.routing_key(), request.id().to_string());

        let request = request.with_session("session-42");
        assert_eq!(request.routing_key(), "session-42");
    }

    #[test]
    fn test_requester_fallbacks() {
        let request = AnalysisRequest::new("q", TaskType::Basic).unwrap();
        assert_eq!(request.requester(), "anonymous");
        let request = request.with_session("s1");
        assert_eq!(request.requester(), "s1");
        let request = request.with_user("alice");
        assert_eq!(request.requester(), "alice");
    }

    #[test]
    fn test_sensitive_operations_deduplicated() {
        let request = AnalysisRequest::new("q", TaskType::Basic)
            .unwrap()
            .with_sensitive_operation(SensitiveOperation::FileWrite)
            .with_sensitive_operation(SensitiveOperation::FileWrite);
        assert_eq!(request.sensitive_operations().len(), 1);
    }

    #[test]
    fn test_parse_sensitive_operation() {
        assert_eq!(
            "production-change".parse::<SensitiveOperation>().unwrap(),
            SensitiveOperation::ProductionChange
        );
        assert!(SensitiveOperation::DataDeletion.is_critical());
        assert!(!SensitiveOperation::FileWrite.is_critical());
        assert!("launch_missiles".parse::<SensitiveOperation>().is_err());
    }
}
