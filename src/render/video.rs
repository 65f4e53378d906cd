//! ffmpeg renderer: generated background, timed captions, a bouncing emoji
//! and a silent audio track, encoded as H.264/AAC MP4.

use async_trait::async_trait;
use chrono::Local;
use rand::Rng;
use rand::seq::IndexedRandom;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{AssetKind, RenderError, RenderedAsset, Renderer, fitted_font_size, wrap_words};
use crate::config::{BackgroundType, VideoSettings};
use crate::domain::ScriptRecord;
use crate::storage;

const FADE_SECS: f64 = 0.3;
const EMOJI_SECS: f64 = 1.0;

/// One caption, already wrapped and timed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Caption {
    pub text: String,
    pub font_size: u32,
    pub start: f64,
    pub end: f64,
    pub y: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EmojiCue {
    pub glyph: &'static str,
    pub start: f64,
    pub end: f64,
}

pub struct VideoRenderer {
    ffmpeg: PathBuf,
    video: VideoSettings,
}

impl VideoRenderer {
    pub fn new(ffmpeg: PathBuf, video: VideoSettings) -> Self {
        Self { ffmpeg, video }
    }
}

#[async_trait]
impl Renderer for VideoRenderer {
    fn kind(&self) -> AssetKind {
        AssetKind::Video
    }

    async fn render_asset(
        &self,
        script: &ScriptRecord,
        duration: f64,
        out_dir: &Path,
    ) -> Result<RenderedAsset, RenderError> {
        let captions = plan_captions(script, duration, &self.video);
        let emoji = self
            .video
            .emoji_settings
            .enabled
            .then(|| plan_emoji(script, duration));

        // drawtext reads captions from files so nothing needs escaping
        let work = tempfile::tempdir()?;
        let mut text_files = Vec::with_capacity(captions.len());
        for (i, caption) in captions.iter().enumerate() {
            let path = work.path().join(format!("caption_{}.txt", i));
            tokio::fs::write(&path, &caption.text).await?;
            text_files.push(path);
        }
        let emoji_file = match &emoji {
            Some(cue) => {
                let path = work.path().join("emoji.txt");
                tokio::fs::write(&path, cue.glyph).await?;
                Some(path)
            }
            None => None,
        };

        let animated = match self.video.background_type {
            BackgroundType::Solid => false,
            BackgroundType::Animated => true,
            BackgroundType::Random => rand::rng().random_bool(0.5),
        };
        let color = self
            .video
            .background_colors
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or([25, 25, 112]);

        let graph = filter_graph(
            &self.video,
            duration,
            animated,
            &captions,
            &text_files,
            emoji.as_ref().zip(emoji_file.as_deref()),
        );

        tokio::fs::create_dir_all(out_dir).await?;
        let output_path = storage::timestamped_path(out_dir, "short_", Local::now(), ".mp4");

        let res = self.video.resolution;
        let background = format!(
            "color=c=0x{:02x}{:02x}{:02x}:s={}x{}:r={}:d={:.2}",
            color[0], color[1], color[2], res.width, res.height, self.video.fps, duration
        );

        log::info!(
            "[render] ffmpeg: {} captions, {:.1}s, animated background: {}",
            captions.len(),
            duration,
            animated
        );

        let output = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-nostdin"])
            .args(["-f", "lavfi", "-i", &background])
            .args(["-f", "lavfi", "-i", "anullsrc=channel_layout=stereo:sample_rate=44100"])
            .args(["-filter_complex", &graph])
            .args(["-map", "[v]", "-map", "1:a"])
            .args(["-c:v", "libx264", "-preset", "veryfast", "-pix_fmt", "yuv420p"])
            .args(["-r", &self.video.fps.to_string()])
            .args(["-c:a", "aac", "-b:a", "128k"])
            .args(["-t", &format!("{:.2}", duration), "-shortest"])
            .args(["-movflags", "+faststart", "-y"])
            .arg(&output_path)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| RenderError::Ffmpeg(format!("failed to spawn ffmpeg: {}", e)))?;

        if !output.status.success() || !output_path.exists() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::Ffmpeg(stderr.trim().to_string()));
        }

        Ok(RenderedAsset {
            path: output_path,
            kind: AssetKind::Video,
            duration,
        })
    }
}

/// Setup over the first 60%, punchline (bigger) over the last 60%; other
/// kinds show the whole text for the full clip.
pub(crate) fn plan_captions(
    script: &ScriptRecord,
    duration: f64,
    video: &VideoSettings,
) -> Vec<Caption> {
    let base = video.text_style.font_size;
    let wrap = |text: &str, size: u32| {
        let max_chars = (video.resolution.width as f64 * 0.85 / (size as f64 * 0.55)) as usize;
        wrap_words(text, max_chars).join("\n")
    };

    match (&script.setup, &script.punchline) {
        (Some(setup), Some(punchline)) => {
            let setup_size = fitted_font_size(base, setup);
            let punch_size = fitted_font_size(base, punchline) + 10;
            vec![
                Caption {
                    text: wrap(setup, setup_size),
                    font_size: setup_size,
                    start: 0.0,
                    end: duration * 0.6,
                    y: "h*0.30",
                },
                Caption {
                    text: wrap(punchline, punch_size),
                    font_size: punch_size,
                    start: duration * 0.4,
                    end: duration,
                    y: "h*0.55",
                },
            ]
        }
        _ => {
            let size = fitted_font_size(base, &script.text);
            vec![Caption {
                text: wrap(&script.text, size),
                font_size: size,
                start: 0.0,
                end: duration,
                y: "(h-text_h)/2",
            }]
        }
    }
}

pub(crate) fn plan_emoji(script: &ScriptRecord, duration: f64) -> EmojiCue {
    let (glyph, start) = if script.is_two_part() {
        ("😂", duration * 0.8)
    } else {
        ("🤣", duration * 0.7)
    };
    EmojiCue {
        glyph,
        start,
        end: (start + EMOJI_SECS).min(duration),
    }
}

fn fade_alpha(start: f64, end: f64) -> String {
    format!(
        "if(lt(t,{s:.2}+{f}),(t-{s:.2})/{f},if(gt(t,{e:.2}-{f}),({e:.2}-t)/{f},1))",
        s = start,
        e = end,
        f = FADE_SECS
    )
}

pub(crate) fn filter_graph(
    video: &VideoSettings,
    duration: f64,
    animated: bool,
    captions: &[Caption],
    text_files: &[PathBuf],
    emoji: Option<(&EmojiCue, &Path)>,
) -> String {
    let style = &video.text_style;
    let font = style
        .font_file
        .as_ref()
        .map(|f| format!(":fontfile='{}'", f))
        .unwrap_or_default();

    let mut filters = Vec::new();
    if animated {
        filters.push(format!("hue=H='2*PI*t/{:.2}'", duration.max(1.0)));
    }

    for (caption, file) in captions.iter().zip(text_files) {
        filters.push(format!(
            "drawtext=textfile='{}'{}:fontsize={}:fontcolor={}:borderw={}:bordercolor={}:line_spacing=12:x=(w-text_w)/2:y={}:enable='between(t,{:.2},{:.2})':alpha='{}'",
            file.display(),
            font,
            caption.font_size,
            style.color,
            style.stroke_width,
            style.stroke_color,
            caption.y,
            caption.start,
            caption.end,
            fade_alpha(caption.start, caption.end),
        ));
    }

    if let Some((cue, file)) = emoji {
        let size = video.emoji_settings.size;
        let size_expr = if video.emoji_settings.animation {
            format!("'{}*(1+0.1*sin(2*PI*t))'", size)
        } else {
            size.to_string()
        };
        let emoji_font = video
            .emoji_settings
            .font_file
            .as_ref()
            .map(|f| format!(":fontfile='{}'", f))
            .unwrap_or_default();
        filters.push(format!(
            "drawtext=textfile='{}'{}:fontsize={}:x=(w-text_w)/2:y=h*0.75:enable='between(t,{:.2},{:.2})'",
            file.display(),
            emoji_font,
            size_expr,
            cue.start,
            cue.end,
        ));
    }

    filters.push("format=yuv420p".to_string());
    format!("[0:v]{}[v]", filters.join(","))
}
