use async_trait::async_trait;
use chrono::Local;
use serde_json::json;
use std::path::Path;

use super::{AssetKind, RenderError, RenderedAsset, Renderer};
use crate::domain::ScriptRecord;
use crate::storage;

/// Last resort: the script as a pretty JSON `.txt`, for hosts that can
/// neither run ffmpeg nor draw.
pub struct TextRenderer;

#[async_trait]
impl Renderer for TextRenderer {
    fn kind(&self) -> AssetKind {
        AssetKind::Text
    }

    async fn render_asset(
        &self,
        script: &ScriptRecord,
        duration: f64,
        out_dir: &Path,
    ) -> Result<RenderedAsset, RenderError> {
        let (visual_cues, text_overlays) = script.timeline_within(duration);
        let content = json!({
            "type": script.kind,
            "content": script.text,
            "duration": duration,
            "topic": script.topic,
            "visual_cues": visual_cues,
            "text_overlays": text_overlays,
        });

        tokio::fs::create_dir_all(out_dir).await?;
        let path = storage::timestamped_path(out_dir, "short_", Local::now(), ".txt");
        tokio::fs::write(&path, serde_json::to_vec_pretty(&content)?).await?;

        Ok(RenderedAsset {
            path,
            kind: AssetKind::Text,
            duration,
        })
    }
}
