//! JSONL file audit log.
//!
//! Each [`AuditEntry`] is serialized as a single JSON line with an added
//! `recorded_at` RFC 3339 timestamp and appended to the file. The file is
//! opened in append mode and never rewritten, so a trail survives restarts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};
use wallbounce_application::{AuditError, AuditLog};
use wallbounce_domain::{AuditEntry, RequestId};

#[derive(Serialize, Deserialize)]
struct Record {
    #[serde(flatten)]
    entry: AuditEntry,
    recorded_at: String,
}

/// Thread-safe via `Mutex<BufWriter<File>>`. Every append is flushed.
pub struct JsonlAuditLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlAuditLog {
    /// Open (or create) the log, creating parent directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                AuditError::Io(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AuditError::Io(format!("cannot open {}: {}", path.display(), e)))?;

        debug!(path = %path.display(), "Audit log opened");
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&self) -> MutexGuard<'_, BufWriter<File>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AuditLog for JsonlAuditLog {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let record = Record {
            entry: entry.clone(),
            recorded_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        };
        let line = serde_json::to_string(&record)
            .map_err(|e| AuditError::Serialization(e.to_string()))?;

        let mut writer = self.writer();
        writeln!(writer, "{}", line).map_err(|e| AuditError::Io(e.to_string()))?;
        writer.flush().map_err(|e| AuditError::Io(e.to_string()))
    }

    async fn entries_for(&self, request_id: RequestId) -> Result<Vec<AuditEntry>, AuditError> {
        self.writer()
            .flush()
            .map_err(|e| AuditError::Io(e.to_string()))?;

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| AuditError::Io(e.to_string()))?;

        let mut entries = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Record>(line) {
                Ok(record) if record.entry.request_id == request_id => entries.push(record.entry),
                Ok(_) => {}
                Err(e) => warn!(line = index + 1, error = %e, "Skipping unreadable audit line"),
            }
        }
        Ok(entries)
    }
}

impl Drop for JsonlAuditLog {
    fn drop(&mut self) {
        let _ = self.writer().flush();
    }
}
