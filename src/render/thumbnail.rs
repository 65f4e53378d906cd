use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{AssetKind, Capabilities, RenderedAsset};
use crate::config::VideoSettings;
use crate::constants::{JPEG_QUALITY, THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH};
use crate::domain::ScriptRecord;

/// Produce a 1280x720 JPEG next to the asset. Image assets are their own
/// thumbnail; video assets get a frame grab; text assets get a drawn card
/// when raster drawing is compiled in.
pub(crate) async fn render_thumbnail(
    script: &ScriptRecord,
    asset: &RenderedAsset,
    caps: &Capabilities,
    video: &VideoSettings,
) -> Option<PathBuf> {
    let output_path = asset.path.with_extension("thumb.jpg");

    let result = match asset.kind {
        AssetKind::Image => return Some(asset.path.clone()),
        AssetKind::Video => match &caps.ffmpeg {
            Some(ffmpeg) => grab_frame(ffmpeg, &asset.path, asset.duration, &output_path).await,
            None => return None,
        },
        AssetKind::Text => draw_card(script, video, &output_path).await,
    };

    match result {
        Ok(true) => Some(output_path),
        Ok(false) => None,
        Err(e) => {
            log::warn!("[thumbnails] Failed for {}: {}", asset.path.display(), e);
            None
        }
    }
}

#[cfg(feature = "image-render")]
async fn draw_card(
    script: &ScriptRecord,
    video: &VideoSettings,
    output_path: &Path,
) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
    let data = super::raster::thumbnail_card(script, video, THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT)?;
    tokio::fs::write(output_path, data).await?;
    Ok(true)
}

#[cfg(not(feature = "image-render"))]
async fn draw_card(
    _script: &ScriptRecord,
    _video: &VideoSettings,
    _output_path: &Path,
) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
    Ok(false)
}

/// Frame from the middle of the clip, cropped to fill 16:9.
async fn grab_frame(
    ffmpeg: &Path,
    input_path: &Path,
    duration: f64,
    output_path: &Path,
) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
    let seek = format!("{:.2}", (duration / 2.0).max(0.0));
    let vf = format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}",
        w = THUMBNAIL_WIDTH,
        h = THUMBNAIL_HEIGHT
    );
    // ffmpeg's mjpeg scale runs 2 (best) to 31
    let q = (2 + (100 - JPEG_QUALITY as u32) * 29 / 100).to_string();

    let output = Command::new(ffmpeg)
        .args(["-hide_banner", "-loglevel", "error", "-nostdin"])
        .args(["-ss", &seek])
        .arg("-i")
        .arg(input_path)
        .args(["-an", "-sn", "-frames:v", "1"])
        .args(["-vf", &vf])
        .args(["-q:v", &q, "-y"])
        .arg(output_path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| format!("Failed to spawn ffmpeg: {}", e))?;

    if !output.status.success() || !output_path.exists() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("ffmpeg failed: {}", stderr.trim()).into());
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Joke, ScriptSource};
    use chrono::Local;

    fn script() -> ScriptRecord {
        ScriptRecord::from_joke(
            Joke::Single {
                text: "I invented a new word: Plagiarism!".into(),
            },
            ScriptSource::Local,
            Local::now(),
        )
    }

    #[tokio::test]
    async fn test_image_asset_is_its_own_thumbnail() {
        let asset = RenderedAsset {
            path: PathBuf::from("videos/short_1.jpg"),
            kind: AssetKind::Image,
            duration: 4.0,
        };
        let thumb = render_thumbnail(
            &script(),
            &asset,
            &Capabilities::default(),
            &VideoSettings::default(),
        )
        .await;
        assert_eq!(thumb, Some(asset.path));
    }

    #[tokio::test]
    async fn test_video_without_ffmpeg_has_no_thumbnail() {
        let asset = RenderedAsset {
            path: PathBuf::from("videos/short_1.mp4"),
            kind: AssetKind::Video,
            duration: 4.0,
        };
        let thumb = render_thumbnail(
            &script(),
            &asset,
            &Capabilities::default(),
            &VideoSettings::default(),
        )
        .await;
        assert!(thumb.is_none());
    }

    #[cfg(feature = "image-render")]
    #[tokio::test]
    async fn test_text_asset_gets_drawn_card() {
        let dir = tempfile::tempdir().unwrap();
        let asset = RenderedAsset {
            path: dir.path().join("short_1.txt"),
            kind: AssetKind::Text,
            duration: 4.0,
        };
        let thumb = render_thumbnail(
            &script(),
            &asset,
            &Capabilities::default(),
            &VideoSettings::default(),
        )
        .await
        .unwrap();
        let img = image::open(&thumb).unwrap();
        assert_eq!((img.width(), img.height()), (1280, 720));
    }
}
