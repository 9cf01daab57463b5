//! Structured configuration issues.
//!
//! Validation never fails fast: every check contributes zero or more
//! [`ConfigIssue`]s and the caller decides what to do with them. Any
//! [`Severity::Error`] blocks startup; warnings are logged.
//!
//! ```
//! use wallbounce_domain::config::{ConfigIssue, ConfigIssueCode, Severity};
//!
//! let issue = ConfigIssue::threshold_out_of_range("consensus.min_confidence", 1.5);
//! assert_eq!(issue.severity, Severity::Error);
//! assert!(matches!(issue.code, ConfigIssueCode::ThresholdOutOfRange { .. }));
//! ```

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: the configuration works but may not behave as expected.
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// No provider is configured.
    NoProviders,
    /// Two providers share an id.
    DuplicateProvider { id: String },
    /// A threshold must lie within [0, 1].
    ThresholdOutOfRange { field: String, value: String },
    /// A string field holds an unknown value.
    InvalidEnumValue {
        field: String,
        value: String,
        valid_values: Vec<String>,
    },
    /// Rollout steps are empty, unordered or exceed 100%.
    InvalidRolloutPlan,
    /// Critical risk is configured to auto-approve.
    CriticalAutoApprove,
    /// A task type accepts a single response, which is never verified.
    SingleProviderMinimum { task: String },
    /// A provider is missing a field its kind requires.
    MissingField { provider: String, field: String },
    /// A duration or count must be positive.
    NonPositive { field: String },
    /// A blocking review could outlast the whole request.
    ReviewOutlastsRequest,
}

/// A detected issue in the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn threshold_out_of_range(field: &str, value: f64) -> Self {
        Self::error(
            ConfigIssueCode::ThresholdOutOfRange {
                field: field.to_string(),
                value: value.to_string(),
            },
            format!("{} = {}: must be between 0.0 and 1.0", field, value),
        )
    }

    pub fn invalid_enum(field: &str, value: &str, valid: &[&str]) -> Self {
        Self::error(
            ConfigIssueCode::InvalidEnumValue {
                field: field.to_string(),
                value: value.to_string(),
                valid_values: valid.iter().map(|v| v.to_string()).collect(),
            },
            format!(
                "{} = '{}': expected one of {}",
                field,
                value,
                valid.join(", ")
            ),
        )
    }

    pub fn non_positive(field: &str) -> Self {
        Self::error(
            ConfigIssueCode::NonPositive {
                field: field.to_string(),
            },
            format!("{} must be greater than zero", field),
        )
    }

    /// Downgrade to a warning that names the value used instead.
    pub fn with_fallback(mut self, fallback: &str) -> Self {
        self.severity = Severity::Warning;
        self.message = format!("{}, falling back to '{}'", self.message, fallback);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.severity.as_str(), self.message)
    }
}

/// True when any issue is fatal.
pub fn has_errors(issues: &[ConfigIssue]) -> bool {
    issues.iter().any(ConfigIssue::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_issue_message() {
        let issue = ConfigIssue::threshold_out_of_range("consensus.min_agreement", -0.1);
        assert_eq!(
            issue.to_string(),
            "[error] consensus.min_agreement = -0.1: must be between 0.0 and 1.0"
        );
    }

    #[test]
    fn test_has_errors() {
        let warning = ConfigIssue::warning(
            ConfigIssueCode::SingleProviderMinimum {
                task: "basic".to_string(),
            },
            "basic accepts a single response",
        );
        assert!(!has_errors(std::slice::from_ref(&warning)));
        assert!(has_errors(&[warning, ConfigIssue::non_positive("dispatch.timeout_secs")]));
    }

    #[test]
    fn test_invalid_enum_lists_valid_values() {
        let issue = ConfigIssue::invalid_enum("rollout.floor", "half", &["zero", "last_known_good"]);
        assert!(issue.message.contains("zero, last_known_good"));
    }
}
