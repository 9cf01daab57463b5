//! Builds provider adapters from `[[providers]]` entries.

use super::CommandProvider;
use crate::config::{FileProviderConfig, ProviderKind};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use wallbounce_application::Provider;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderBuildError {
    #[error("No providers configured")]
    NoProviders,

    #[error("Provider '{0}' is configured more than once")]
    DuplicateId(String),

    #[error("Provider '{id}': unknown kind '{kind}'")]
    UnknownKind { id: String, kind: String },

    #[error("Provider '{id}': missing required field '{field}'")]
    MissingField { id: String, field: &'static str },

    #[error("Provider '{0}': HTTP providers require the 'http-providers' feature")]
    HttpDisabled(String),

    #[error("Provider '{id}': environment variable {env} is not set")]
    MissingApiKey { id: String, env: String },

    #[error("Provider '{id}': {message}")]
    Client { id: String, message: String },
}

/// Provider adapters in configuration order.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn build(configs: &[FileProviderConfig]) -> Result<Self, ProviderBuildError> {
        if configs.is_empty() {
            return Err(ProviderBuildError::NoProviders);
        }

        let mut seen = HashSet::new();
        let mut providers = Vec::with_capacity(configs.len());
        for config in configs {
            if !seen.insert(config.id.as_str()) {
                return Err(ProviderBuildError::DuplicateId(config.id.clone()));
            }
            let provider = Self::build_one(config)?;
            debug!(provider = %config.id, kind = %config.kind, "Provider configured");
            providers.push(provider);
        }
        Ok(Self { providers })
    }

    fn build_one(config: &FileProviderConfig) -> Result<Arc<dyn Provider>, ProviderBuildError> {
        let kind = config
            .parse_kind()
            .map_err(|_| ProviderBuildError::UnknownKind {
                id: config.id.clone(),
                kind: config.kind.clone(),
            })?;

        match kind {
            ProviderKind::Command => {
                let command = config
                    .command
                    .as_deref()
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| ProviderBuildError::MissingField {
                        id: config.id.clone(),
                        field: "command",
                    })?;
                if !CommandProvider::is_command_available(command) {
                    warn!(provider = %config.id, command, "Command not found on PATH");
                }
                Ok(Arc::new(
                    CommandProvider::new(config.descriptor(), command)
                        .with_args(config.args.clone()),
                ))
            }
            ProviderKind::Http => Self::build_http(config),
        }
    }

    #[cfg(feature = "http-providers")]
    fn build_http(config: &FileProviderConfig) -> Result<Arc<dyn Provider>, ProviderBuildError> {
        let missing = |field| ProviderBuildError::MissingField {
            id: config.id.clone(),
            field,
        };
        let base_url = config.base_url.as_deref().ok_or_else(|| missing("base_url"))?;
        let model = config.model.as_deref().ok_or_else(|| missing("model"))?;

        let mut provider = super::HttpProvider::new(config.descriptor(), base_url, model)
            .map_err(|e| ProviderBuildError::Client {
                id: config.id.clone(),
                message: e.to_string(),
            })?
            .with_max_tokens(config.max_tokens);

        if let Some(env) = &config.api_key_env {
            let key = std::env::var(env).map_err(|_| ProviderBuildError::MissingApiKey {
                id: config.id.clone(),
                env: env.clone(),
            })?;
            provider = provider.with_api_key(key);
        }
        Ok(Arc::new(provider))
    }

    #[cfg(not(feature = "http-providers"))]
    fn build_http(config: &FileProviderConfig) -> Result<Arc<dyn Provider>, ProviderBuildError> {
        Err(ProviderBuildError::HttpDisabled(config.id.clone()))
    }

    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    pub fn into_providers(self) -> Vec<Arc<dyn Provider>> {
        self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
