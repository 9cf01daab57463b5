//! Provider configuration from TOML (`[[providers]]` array)

use serde::{Deserialize, Serialize};
use wallbounce_domain::{ConfigIssue, ConfigIssueCode, ProviderDescriptor};

/// How a provider is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// A local CLI program: prompt on stdin, answer on stdout
    Command,
    /// An OpenAI-compatible chat completions endpoint
    Http,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Command => "command",
            ProviderKind::Http => "http",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "command" | "cli" => Ok(ProviderKind::Command),
            "http" | "openai" => Ok(ProviderKind::Http),
            other => Err(format!("unknown provider kind '{}'", other)),
        }
    }
}

/// One provider entry
///
/// # Example
///
/// ```toml
/// [[providers]]
/// id = "claude"
/// kind = "command"
/// command = "claude"
/// args = ["-p"]
/// tier = 0
/// cost_per_token = 0.000015
///
/// [[providers]]
/// id = "gpt"
/// kind = "http"
/// base_url = "https://api.openai.com"
/// model = "gpt-4o"
/// api_key_env = "OPENAI_API_KEY"
/// tier = 1
/// weight = 0.8
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProviderConfig {
    pub id: String,
    pub kind: String,
    /// Lower tiers are preferred when topping up
    pub tier: u32,
    pub cost_per_token: f64,
    /// Weight in synthesis; 1.0 is neutral
    pub weight: f64,

    // command
    pub command: Option<String>,
    pub args: Vec<String>,

    // http
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub max_tokens: Option<u32>,
}

impl Default for FileProviderConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            kind: "command".to_string(),
            tier: 0,
            cost_per_token: 0.0,
            weight: 1.0,
            command: None,
            args: Vec::new(),
            base_url: None,
            model: None,
            api_key_env: None,
            max_tokens: None,
        }
    }
}

impl FileProviderConfig {
    pub fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor::new(self.id.as_str())
            .with_tier(self.tier)
            .with_cost_per_token(self.cost_per_token)
            .with_weight(self.weight)
    }

    /// Parse `kind`. Unlike the other enum fields there is no safe fallback,
    /// so an unknown kind is an error.
    pub fn parse_kind(&self) -> Result<ProviderKind, ConfigIssue> {
        self.kind.parse::<ProviderKind>().map_err(|_| {
            ConfigIssue::invalid_enum(
                &format!("providers.{}.kind", self.id),
                &self.kind,
                &["command", "http"],
            )
        })
    }

    /// Check the fields the provider's kind requires.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.id.trim().is_empty() {
            issues.push(self.missing("id"));
        }

        match self.parse_kind() {
            Ok(ProviderKind::Command) => {
                if self.command.as_deref().is_none_or(|c| c.trim().is_empty()) {
                    issues.push(self.missing("command"));
                }
            }
            Ok(ProviderKind::Http) => {
                if self.model.is_none() {
                    issues.push(self.missing("model"));
                }
                if self.base_url.is_none() {
                    issues.push(self.missing("base_url"));
                }
            }
            Err(issue) => issues.push(issue),
        }

        if !self.cost_per_token.is_finite() || self.cost_per_token < 0.0 {
            issues.push(ConfigIssue::non_positive(&format!(
                "providers.{}.cost_per_token",
                self.id
            )));
        }
        issues
    }

    fn missing(&self, field: &str) -> ConfigIssue {
        ConfigIssue::error(
            ConfigIssueCode::MissingField {
                provider: self.id.clone(),
                field: field.to_string(),
            },
            format!("providers.{}: '{}' is required", self.id, field),
        )
    }
}
