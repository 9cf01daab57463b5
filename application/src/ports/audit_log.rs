//! Audit log port
//!
//! The audit log is the system of record for what was approved and why.
//! It is append-only: entries are never rewritten or removed.

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use wallbounce_domain::{AuditEntry, RequestId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuditError {
    #[error("Audit I/O error: {0}")]
    Io(String),

    #[error("Audit serialization error: {0}")]
    Serialization(String),
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AuditError>;

    /// Entries for one request, in append order.
    async fn entries_for(&self, request_id: RequestId) -> Result<Vec<AuditEntry>, AuditError>;
}

/// Process-local audit log
#[derive(Default)]
pub struct InMemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
        Ok(())
    }

    async fn entries_for(&self, request_id: RequestId) -> Result<Vec<AuditEntry>, AuditError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.request_id == request_id)
            .cloned()
            .collect())
    }
}
