//! Result cache and audit log settings (`[cache]`, `[audit]`)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use wallbounce_application::CacheParams;

/// Raw cache configuration from TOML
///
/// # Example
///
/// ```toml
/// [cache]
/// enabled = true
/// ttl_secs = 3600
/// max_entries = 1024
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        let params = CacheParams::default();
        Self {
            enabled: params.enabled,
            ttl_secs: params.ttl.as_secs(),
            max_entries: 1024,
        }
    }
}

impl FileCacheConfig {
    pub fn to_params(&self) -> CacheParams {
        CacheParams {
            enabled: self.enabled,
            ttl: Duration::from_secs(self.ttl_secs),
        }
    }
}

/// Raw audit configuration from TOML
///
/// Without a path the audit trail is kept in memory for the lifetime of
/// the process.
///
/// ```toml
/// [audit]
/// path = "~/.local/share/wallbounce/audit.jsonl"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAuditConfig {
    pub path: Option<PathBuf>,
}

impl FileAuditConfig {
    /// Resolve a leading `~/` against the home directory.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        let path = self.path.as_ref()?;
        match path.strip_prefix("~") {
            Ok(rest) => dirs::home_dir().map(|home| home.join(rest)),
            Err(_) => Some(path.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_defaults() {
        let config = FileCacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.to_params(), CacheParams::default());
    }

    #[test]
    fn test_audit_path_absolute_kept() {
        let config = FileAuditConfig {
            path: Some(PathBuf::from("/var/log/wallbounce/audit.jsonl")),
        };
        assert_eq!(
            config.resolved_path(),
            Some(PathBuf::from("/var/log/wallbounce/audit.jsonl"))
        );
        assert_eq!(FileAuditConfig::default().resolved_path(), None);
    }
}
