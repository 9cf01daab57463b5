//! Infrastructure layer for wallbounce
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod audit;
pub mod cache;
pub mod config;
pub mod metrics;
pub mod providers;
pub mod reviewer;

// Re-export commonly used types
pub use audit::JsonlAuditLog;
pub use cache::InMemoryResultCache;
pub use config::{ConfigLoader, FileConfig, FileProviderConfig, ProviderKind};
pub use metrics::InMemoryMetrics;
#[cfg(feature = "http-providers")]
pub use providers::HttpProvider;
pub use providers::{CommandProvider, ProviderBuildError, ProviderRegistry};
pub use reviewer::{ChannelApprovalReviewer, ReviewTicket};
