//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.
//! Where a sensible default exists, it ships next to the port
//! ([`NoProgress`](progress::NoProgress), [`NoCache`](result_cache::NoCache),
//! [`InMemoryAuditLog`](audit_log::InMemoryAuditLog), ...).

pub mod approval_reviewer;
pub mod audit_log;
pub mod metrics;
pub mod progress;
pub mod provider;
pub mod result_cache;
