//! Audit log
//!
//! Appends every safety decision and operator-facing event to a JSONL file.
//! Writes are fire-and-forget: a failed write is logged and never changes
//! the outcome of the operation being recorded.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Entry in the audit log
#[derive(Debug, Serialize)]
struct AuditEntry<'a> {
    timestamp: DateTime<Utc>,
    entry_type: &'a str,
    payload: &'a Value,
}

/// Writer for audit log entries
#[derive(Debug)]
struct AuditLogWriter {
    path: PathBuf,
}

impl AuditLogWriter {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn write(&self, entry: &AuditEntry<'_>) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

/// Shared handle to the audit log file
#[derive(Debug, Clone)]
pub struct AuditLog {
    writer: Arc<Mutex<AuditLogWriter>>,
}

impl AuditLog {
    /// Create a new audit log
    ///
    /// # Arguments
    /// * `log_path` - Path to the audit log file (JSONL format)
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(AuditLogWriter::new(log_path.into()))),
        }
    }

    pub async fn record(&self, timestamp: DateTime<Utc>, entry_type: &str, payload: &Value) {
        let entry = AuditEntry {
            timestamp,
            entry_type,
            payload,
        };

        let writer = self.writer.lock().await;
        if let Err(e) = writer.write(&entry) {
            tracing::warn!(error = %e, entry_type, "Failed to write audit log entry");
        }
    }

    /// Serialize `payload` and record it
    pub async fn record_serialized<T: Serialize>(
        &self,
        timestamp: DateTime<Utc>,
        entry_type: &str,
        payload: &T,
    ) {
        match serde_json::to_value(payload) {
            Ok(value) => self.record(timestamp, entry_type, &value).await,
            Err(e) => {
                tracing::warn!(error = %e, entry_type, "Failed to serialize audit log entry")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_appends_jsonl_entries() {
        let temp_file = NamedTempFile::new().unwrap();
        let log = AuditLog::new(temp_file.path());

        log.record(Utc::now(), "decision", &json!({"approved": false}))
            .await;
        log.record_serialized(Utc::now(), "emergency_stop", &json!({"reason": "test"}))
            .await;

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["entry_type"], "decision");
        assert_eq!(first["payload"]["approved"], false);
        assert!(lines[1].contains("emergency_stop"));
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for append
        let log = AuditLog::new(dir.path());
        log.record(Utc::now(), "decision", &json!({})).await;
    }
}
