//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown task type: {0}. Valid: basic, premium, critical")]
    InvalidTaskType(String),

    #[error("Unknown risk level: {0}. Valid: low, medium, high, critical")]
    InvalidRiskLevel(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Illegal admission transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("Invalid rollout plan: {0}")]
    InvalidRolloutPlan(String),

    #[error("Cannot {operation} while rollout is {phase}")]
    IllegalRolloutOperation { operation: String, phase: String },
}

impl DomainError {
    pub fn invalid_value(field: impl Into<String>, value: impl ToString) -> Self {
        DomainError::InvalidValue {
            field: field.into(),
            value: value.to_string(),
        }
    }
}
