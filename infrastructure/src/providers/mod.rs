//! Provider adapters
//!
//! - [`CommandProvider`] - Local CLI program (prompt on stdin)
//! - `HttpProvider` - OpenAI-compatible endpoint (`http-providers` feature)
//!
//! [`ProviderRegistry`] builds them from configuration.

mod command;
#[cfg(feature = "http-providers")]
mod http;
mod registry;

pub use command::CommandProvider;
#[cfg(feature = "http-providers")]
pub use http::HttpProvider;
pub use registry::{ProviderBuildError, ProviderRegistry};
