//! Audit log adapters

mod jsonl;

pub use jsonl::JsonlAuditLog;
