//! Renderers turn a script into a publishable asset.
//!
//! Which renderer runs is decided once, from [`Capabilities::probe`], and
//! never re-checked per run. Every renderer gets the already clamped duration.

#[cfg(feature = "image-render")]
mod raster;
mod text;
mod thumbnail;
mod video;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(feature = "image-render")]
pub use raster::{Composition, ImageRenderer, TextBlock};
pub use text::TextRenderer;
pub use video::VideoRenderer;

use crate::config::{RendererChoice, Settings, VideoSettings};
use crate::constants::MAX_SHORT_DURATION_SECS;
use crate::domain::ScriptRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Video,
    Image,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedAsset {
    pub path: PathBuf,
    pub kind: AssetKind,
    pub duration: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ffmpeg failed: {0}")]
    Ffmpeg(String),
    #[error("drawing failed: {0}")]
    Drawing(String),
}

#[async_trait]
pub trait Renderer: Send + Sync {
    fn kind(&self) -> AssetKind;

    /// Render `script` for `duration` seconds into `out_dir`.
    async fn render_asset(
        &self,
        script: &ScriptRecord,
        duration: f64,
        out_dir: &Path,
    ) -> Result<RenderedAsset, RenderError>;
}

/// What this host can render with.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    pub ffmpeg: Option<PathBuf>,
    pub raster: bool,
}

impl Capabilities {
    /// Look for ffmpeg (configured path first, then `PATH`) and check
    /// whether raster drawing was compiled in.
    pub fn probe(video: &VideoSettings) -> Self {
        let ffmpeg = match &video.ffmpeg_path {
            Some(configured) => {
                let path = PathBuf::from(configured);
                if path.is_file() {
                    Some(path)
                } else {
                    log::warn!("[render] Configured ffmpeg {} not found", configured);
                    None
                }
            }
            None => which::which("ffmpeg").ok(),
        };

        Self {
            ffmpeg,
            raster: cfg!(feature = "image-render"),
        }
    }
}

/// Clamp a requested duration to the configured maximum and the Shorts cap.
pub fn clamp_duration(requested: f64, max_setting: f64) -> f64 {
    requested.min(max_setting).min(MAX_SHORT_DURATION_SECS).max(0.0)
}

/// Long lines get a smaller font: above 100 chars by 20 (floor 30), above
/// 50 by 10 (floor 40).
pub(crate) fn fitted_font_size(base: u32, text: &str) -> u32 {
    let len = text.chars().count();
    if len > 100 {
        base.saturating_sub(20).max(30)
    } else if len > 50 {
        base.saturating_sub(10).max(40)
    } else {
        base
    }
}

/// Greedy word wrap to `max_chars` per line. Words longer than a line are
/// split.
pub(crate) fn wrap_words(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let word: String = word.into_iter().collect();
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Pick the renderer for this process. A forced choice that the host cannot
/// honour falls through to the automatic order.
pub fn select_renderer(video: &VideoSettings, caps: &Capabilities) -> Arc<dyn Renderer> {
    let wants = |choice: RendererChoice| {
        video.renderer == choice || video.renderer == RendererChoice::Auto
    };

    if video.renderer == RendererChoice::Text {
        return Arc::new(TextRenderer);
    }

    if wants(RendererChoice::Video) {
        if let Some(ffmpeg) = &caps.ffmpeg {
            return Arc::new(VideoRenderer::new(ffmpeg.clone(), video.clone()));
        }
        if video.renderer == RendererChoice::Video {
            log::warn!("[render] Video renderer requested but ffmpeg is missing");
        }
    }

    #[cfg(feature = "image-render")]
    {
        if caps.raster {
            return Arc::new(ImageRenderer::new(video.clone()));
        }
    }

    Arc::new(TextRenderer)
}

/// The render stage of a run: clamps, renders, logs, never errors.
#[derive(Clone)]
pub struct RenderStage {
    renderer: Arc<dyn Renderer>,
    caps: Capabilities,
    video: VideoSettings,
    max_duration: f64,
    out_dir: PathBuf,
}

impl RenderStage {
    pub fn new(renderer: Arc<dyn Renderer>, caps: Capabilities, settings: &Settings) -> Self {
        Self {
            renderer,
            caps,
            video: settings.video_creation.clone(),
            max_duration: settings.automation.max_video_duration,
            out_dir: settings.directories.videos.clone(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let caps = Capabilities::probe(&settings.video_creation);
        let renderer = select_renderer(&settings.video_creation, &caps);
        log::info!(
            "[render] Using {:?} renderer (ffmpeg: {}, raster: {})",
            renderer.kind(),
            caps.ffmpeg.is_some(),
            caps.raster
        );
        Self::new(renderer, caps, settings)
    }

    pub fn kind(&self) -> AssetKind {
        self.renderer.kind()
    }

    pub async fn render(&self, script: &ScriptRecord) -> Option<RenderedAsset> {
        let duration = clamp_duration(script.duration_seconds, self.max_duration);
        if duration < script.duration_seconds {
            log::info!(
                "[render] Clamped duration {}s -> {}s",
                script.duration_seconds,
                duration
            );
        }

        match self
            .renderer
            .render_asset(script, duration, &self.out_dir)
            .await
        {
            Ok(asset) => {
                log::info!("[render] Rendered {}", asset.path.display());
                Some(asset)
            }
            Err(e) => {
                log::error!("[render] Render failed: {}", e);
                None
            }
        }
    }

    /// 1280x720 JPEG for the asset, when one can be produced.
    pub async fn thumbnail(&self, script: &ScriptRecord, asset: &RenderedAsset) -> Option<PathBuf> {
        thumbnail::render_thumbnail(script, asset, &self.caps, &self.video).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Joke, ScriptSource};
    use chrono::Local;

    fn script(duration: f64) -> ScriptRecord {
        let mut s = ScriptRecord::from_joke(
            Joke::Single {
                text: "I invented a new word: Plagiarism!".into(),
            },
            ScriptSource::Local,
            Local::now(),
        );
        s.duration_seconds = duration;
        s
    }

    #[test]
    fn test_clamp_duration() {
        assert_eq!(clamp_duration(500.0, 60.0), 60.0);
        assert_eq!(clamp_duration(500.0, 30.0), 30.0);
        assert_eq!(clamp_duration(6.0, 60.0), 6.0);
        assert_eq!(clamp_duration(90.0, 120.0), 60.0);
    }

    #[test]
    fn test_fitted_font_size() {
        assert_eq!(fitted_font_size(80, "short"), 80);
        assert_eq!(fitted_font_size(80, &"x".repeat(60)), 70);
        assert_eq!(fitted_font_size(80, &"x".repeat(120)), 60);
        assert_eq!(fitted_font_size(45, &"x".repeat(60)), 40);
        assert_eq!(fitted_font_size(40, &"x".repeat(120)), 30);
    }

    #[test]
    fn test_wrap_words() {
        assert_eq!(
            wrap_words("Why don't scientists trust atoms?", 12),
            vec!["Why don't", "scientists", "trust atoms?"]
        );
        assert_eq!(wrap_words("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert!(wrap_words("   ", 10).is_empty());
    }

    #[tokio::test]
    async fn test_render_clamps_long_script() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.directories.videos = dir.path().to_path_buf();
        let stage = RenderStage::new(Arc::new(TextRenderer), Capabilities::default(), &settings);

        let asset = stage.render(&script(500.0)).await.unwrap();

        assert!(asset.duration <= 60.0);
        assert_eq!(asset.kind, AssetKind::Text);
        assert!(asset.path.exists());
    }

    #[test]
    fn test_forced_text_renderer() {
        let mut video = VideoSettings::default();
        video.renderer = RendererChoice::Text;
        let caps = Capabilities {
            ffmpeg: Some(PathBuf::from("/usr/bin/ffmpeg")),
            raster: true,
        };
        assert_eq!(select_renderer(&video, &caps).kind(), AssetKind::Text);
    }

    #[test]
    fn test_auto_prefers_video_when_ffmpeg_present() {
        let video = VideoSettings::default();
        let caps = Capabilities {
            ffmpeg: Some(PathBuf::from("/usr/bin/ffmpeg")),
            raster: true,
        };
        assert_eq!(select_renderer(&video, &caps).kind(), AssetKind::Video);
    }

    #[test]
    fn test_auto_without_anything_is_text() {
        let video = VideoSettings::default();
        assert_eq!(
            select_renderer(&video, &Capabilities::default()).kind(),
            AssetKind::Text
        );
    }

    #[cfg(feature = "image-render")]
    #[test]
    fn test_auto_without_ffmpeg_draws_images() {
        let video = VideoSettings::default();
        let caps = Capabilities {
            ffmpeg: None,
            raster: true,
        };
        assert_eq!(select_renderer(&video, &caps).kind(), AssetKind::Image);
    }
}
