//! Core domain concepts shared across all subdomains.
//!
//! - [`task::TaskType`] — request classification (basic / premium / critical)
//! - [`request::AnalysisRequest`] — an immutable query to run through the engine
//! - [`error::DomainError`] — domain-level errors

pub mod error;
pub mod request;
pub mod task;
