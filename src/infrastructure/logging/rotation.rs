//! Retention cleanup for rolling log files.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use tracing::{debug, info};

use super::logger::LOG_FILE_NAME;

/// Deletes rolled log files older than the retention period.
#[derive(Debug, Clone)]
pub struct LogRetention {
    retention_days: u32,
}

impl LogRetention {
    pub fn new(retention_days: u32) -> Self {
        Self { retention_days }
    }

    /// Remove `agentflow.log*` files last modified before the cutoff.
    /// Other files are left alone. Returns the number of files deleted.
    pub async fn cleanup_old_logs(&self, log_dir: impl AsRef<Path>) -> Result<usize> {
        let log_dir = log_dir.as_ref();
        if !log_dir.exists() {
            debug!(path = %log_dir.display(), "log directory does not exist");
            return Ok(0);
        }

        let cutoff = Utc::now() - Duration::days(i64::from(self.retention_days));
        let mut deleted_count = 0;

        let mut entries = tokio::fs::read_dir(log_dir)
            .await
            .context("failed to read log directory")?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .context("failed to read directory entry")?
        {
            let path = entry.path();
            let is_log = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(LOG_FILE_NAME));
            if !is_log {
                continue;
            }

            let modified: DateTime<Utc> = tokio::fs::metadata(&path)
                .await
                .context("failed to get file metadata")?
                .modified()
                .context("failed to get file modification time")?
                .into();

            if modified < cutoff {
                tokio::fs::remove_file(&path)
                    .await
                    .context("failed to delete old log file")?;
                deleted_count += 1;
            }
        }

        if deleted_count > 0 {
            info!(count = deleted_count, "cleaned up old log files");
        }
        Ok(deleted_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_cleanup_only_touches_log_files() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("agentflow.log.2024-12-14"), b"old").unwrap();
        std::fs::write(temp_dir.path().join("history.db"), b"db").unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        // zero-day retention puts the cutoff at now
        let deleted = LogRetention::new(0).cleanup_old_logs(temp_dir.path()).await.unwrap();

        assert_eq!(deleted, 1);
        assert!(temp_dir.path().join("history.db").exists());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent_files() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("agentflow.log"), b"fresh").unwrap();

        let deleted = LogRetention::new(14).cleanup_old_logs(temp_dir.path()).await.unwrap();
        assert_eq!(deleted, 0);
    }

    #[tokio::test]
    async fn test_cleanup_handles_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = LogRetention::new(30)
            .cleanup_old_logs(temp_dir.path().join("nonexistent"))
            .await;
        assert_eq!(result.unwrap(), 0);
    }
}
