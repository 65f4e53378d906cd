//! Content domain - what a run is about to publish, saved before uploading.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::script::ScriptRecord;
use crate::render::RenderedAsset;
use crate::storage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub asset: RenderedAsset,
    pub thumbnail: Option<PathBuf>,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub script: ScriptRecord,
    pub created_at: DateTime<Local>,
}

impl ContentRecord {
    /// Persist as `YYYYMMDD_HHMMSS_metadata.json` under `dir`.
    pub async fn save(
        &self,
        dir: &Path,
    ) -> Result<PathBuf, Box<dyn std::error::Error + Send + Sync>> {
        let path = storage::timestamped_path(dir, "", self.created_at, "_metadata.json");
        storage::write_json(&path, self).await?;
        Ok(path)
    }
}
