//! Shared local-storage helpers for the JSON artifacts each run leaves behind.
//!
//! Used by the script, content and upload-log writers so every artifact gets
//! the same timestamped naming and the same write-then-rename behaviour.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// `YYYYMMDD_HHMMSS`, the stamp used in every artifact file name.
pub fn file_stamp(at: DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// Build `<dir>/<prefix><stamp><suffix>`.
pub fn timestamped_path(dir: &Path, prefix: &str, at: DateTime<Local>, suffix: &str) -> PathBuf {
    dir.join(format!("{}{}{}", prefix, file_stamp(at), suffix))
}

/// Serialize `value` as pretty JSON and write it to `path`.
///
/// Writes to a sibling temp file first and renames it into place, so a reader
/// never observes a half-written file.
pub async fn write_json<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let data = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Read and deserialize a JSON file. `Ok(None)` when the file does not exist.
pub async fn read_json<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Option<T>, Box<dyn std::error::Error + Send + Sync>> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
