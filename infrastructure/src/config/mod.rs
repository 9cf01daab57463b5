//! Configuration file loading for wallbounce
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `WALLBOUNCE_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./wallbounce.toml` or `./.wallbounce.toml`
//! 4. Global: `$XDG_CONFIG_HOME/wallbounce/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    FileAdmissionConfig, FileAuditConfig, FileCacheConfig, FileCircuitConfig, FileConfig,
    FileConsensusConfig, FileDispatchConfig, FileEngineConfig, FileProviderConfig, FileQuota,
    FileRolloutConfig, FileTaskConfig, FileTasksConfig, ProviderKind,
};
pub use loader::ConfigLoader;
