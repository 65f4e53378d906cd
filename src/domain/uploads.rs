//! Upload history - an append-only JSON array on disk.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::constants::WATCH_URL_PREFIX;
use crate::storage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub remote_id: String,
    pub asset_path: PathBuf,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub timestamp: DateTime<Local>,
    pub url: String,
}

impl UploadRecord {
    pub fn new(
        remote_id: &str,
        asset_path: &Path,
        title: &str,
        description: &str,
        tags: &[String],
    ) -> Self {
        Self {
            remote_id: remote_id.to_string(),
            asset_path: asset_path.to_path_buf(),
            title: title.to_string(),
            description: description.to_string(),
            tags: tags.to_vec(),
            timestamp: Local::now(),
            url: format!("{}{}", WATCH_URL_PREFIX, remote_id),
        }
    }
}

/// The log only grows: there is no edit or delete.
pub struct UploadLog {
    path: PathBuf,
    // serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl UploadLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(
        &self,
        record: UploadRecord,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.read_all().await?;
        records.push(record);
        storage::write_json(&self.path, &records).await
    }

    pub async fn read_all(
        &self,
    ) -> Result<Vec<UploadRecord>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(storage::read_json(&self.path).await?.unwrap_or_default())
    }

    /// The newest `n` records, oldest first.
    pub async fn recent(
        &self,
        n: usize,
    ) -> Result<Vec<UploadRecord>, Box<dyn std::error::Error + Send + Sync>> {
        let records = self.read_all().await?;
        let skip = records.len().saturating_sub(n);
        Ok(records.into_iter().skip(skip).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> UploadRecord {
        UploadRecord::new(id, Path::new("videos/a.mp4"), "t", "d", &["funny".to_string()])
    }

    #[tokio::test]
    async fn test_append_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        let log = UploadLog::new(dir.path().join("uploads_log.json"));

        log.append(record("one")).await.unwrap();
        log.append(record("two")).await.unwrap();

        let all = log.read_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].remote_id, "one");
        assert_eq!(all[1].url, "https://www.youtube.com/watch?v=two");
    }

    #[tokio::test]
    async fn test_recent_returns_tail() {
        let dir = tempfile::tempdir().unwrap();
        let log = UploadLog::new(dir.path().join("uploads_log.json"));
        for id in ["a", "b", "c"] {
            log.append(record(id)).await.unwrap();
        }

        let recent = log.recent(2).await.unwrap();
        let ids: Vec<_> = recent.iter().map(|r| r.remote_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = UploadLog::new(dir.path().join("uploads_log.json"));
        assert!(log.read_all().await.unwrap().is_empty());
    }
}
