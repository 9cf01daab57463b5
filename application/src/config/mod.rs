//! Application-level configuration.
//!
//! [`EngineConfig`] is the single, versioned configuration value injected
//! into every component constructor. Nothing reads configuration from a
//! global; changing a threshold means building a new `EngineConfig`.

pub mod engine_config;

pub use engine_config::{
    AdmissionParams, CacheParams, ConsensusParams, DispatchParams, EngineConfig, ReviewMode,
};
