//! In-process still renderer. Text is drawn with scaled 8x8 bitmap glyphs so
//! no font file has to be present on the host.

use async_trait::async_trait;
use chrono::Local;
use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use rand::seq::IndexedRandom;
use std::path::Path;

use super::{
    AssetKind, RenderError, RenderedAsset, Renderer, TextRenderer, fitted_font_size, wrap_words,
};
use crate::config::VideoSettings;
use crate::constants::JPEG_QUALITY;
use crate::domain::ScriptRecord;
use crate::storage;

const GLYPH: u32 = 8;
const STROKE: u32 = 3;
const FALLBACK_BACKGROUND: [u8; 3] = [25, 25, 112];

/// One drawn row of text and where it landed.
#[derive(Debug, Clone)]
pub struct TextBlock {
    pub text: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

pub struct Composition {
    pub image: RgbImage,
    pub blocks: Vec<TextBlock>,
}

pub struct ImageRenderer {
    video: VideoSettings,
}

impl ImageRenderer {
    pub fn new(video: VideoSettings) -> Self {
        Self { video }
    }

    /// Draw the full-size frame.
    pub fn compose(&self, script: &ScriptRecord) -> Composition {
        let res = self.video.resolution;
        compose_sized(script, &self.video, res.width, res.height, self.video.emoji_settings.enabled)
    }

    async fn draw_and_save(
        &self,
        script: &ScriptRecord,
        duration: f64,
        out_dir: &Path,
    ) -> Result<RenderedAsset, RenderError> {
        let composition = self.compose(script);
        let data = encode_jpeg(&composition.image)?;

        tokio::fs::create_dir_all(out_dir).await?;
        let path = storage::timestamped_path(out_dir, "short_", Local::now(), ".jpg");
        tokio::fs::write(&path, data).await?;

        Ok(RenderedAsset {
            path,
            kind: AssetKind::Image,
            duration,
        })
    }
}

#[async_trait]
impl Renderer for ImageRenderer {
    fn kind(&self) -> AssetKind {
        AssetKind::Image
    }

    async fn render_asset(
        &self,
        script: &ScriptRecord,
        duration: f64,
        out_dir: &Path,
    ) -> Result<RenderedAsset, RenderError> {
        match self.draw_and_save(script, duration, out_dir).await {
            Ok(asset) => Ok(asset),
            Err(e) => {
                log::warn!("[render] Image render failed, writing text instead: {}", e);
                TextRenderer.render_asset(script, duration, out_dir).await
            }
        }
    }
}

/// A landscape thumbnail card for the script.
pub(crate) fn thumbnail_card(
    script: &ScriptRecord,
    video: &VideoSettings,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, RenderError> {
    let composition = compose_sized(script, video, width, height, true);
    encode_jpeg(&composition.image)
}

fn compose_sized(
    script: &ScriptRecord,
    video: &VideoSettings,
    width: u32,
    height: u32,
    with_emoji: bool,
) -> Composition {
    let background = video
        .background_colors
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(FALLBACK_BACKGROUND);
    let mut image = RgbImage::from_pixel(width, height, Rgb(background));

    let fill = parse_color(&video.text_style.color, Rgb([255, 255, 255]));
    let outline = parse_color(&video.text_style.stroke_color, Rgb([0, 0, 0]));
    let margin = width / 12;

    let mut blocks = Vec::new();
    let mut y = height / 4;

    for line in script.display_lines() {
        let font_size = fitted_font_size(video.text_style.font_size, line);
        let scale = glyph_scale(font_size);
        let char_w = GLYPH * scale;
        let max_chars = (width.saturating_sub(2 * margin) / char_w).max(1) as usize;

        for row in wrap_words(line, max_chars) {
            let row_w = row.chars().count() as u32 * char_w;
            let x = width.saturating_sub(row_w) / 2;
            draw_text(&mut image, &row, x, y, scale, outline, fill);
            blocks.push(TextBlock {
                text: row,
                x,
                y,
                width: row_w,
                height: GLYPH * scale,
            });
            y += GLYPH * scale + scale * 3;
        }
        y += GLYPH * scale;
    }

    if with_emoji {
        let radius = video.emoji_settings.size / 2;
        let cy = y + radius + 40;
        if cy + radius < height {
            draw_laughing_face(&mut image, width / 2, cy, radius);
        }
    }

    Composition { image, blocks }
}

fn glyph_scale(font_size: u32) -> u32 {
    (font_size / 16).max(2)
}

fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, RenderError> {
    let mut data = Vec::new();
    JpegEncoder::new_with_quality(&mut data, JPEG_QUALITY)
        .encode_image(image)
        .map_err(|e| RenderError::Drawing(e.to_string()))?;
    Ok(data)
}

fn parse_color(name: &str, default: Rgb<u8>) -> Rgb<u8> {
    let name = name.trim().to_ascii_lowercase();
    if let Some(hex) = name.strip_prefix('#') {
        if hex.len() == 6 {
            if let Ok(v) = u32::from_str_radix(hex, 16) {
                return Rgb([(v >> 16) as u8, (v >> 8) as u8, v as u8]);
            }
        }
        return default;
    }
    match name.as_str() {
        "white" => Rgb([255, 255, 255]),
        "black" => Rgb([0, 0, 0]),
        "yellow" => Rgb([255, 255, 0]),
        "red" => Rgb([255, 0, 0]),
        _ => default,
    }
}

/// Outline pass first, then the fill on top.
fn draw_text(
    image: &mut RgbImage,
    text: &str,
    x: u32,
    y: u32,
    scale: u32,
    outline: Rgb<u8>,
    fill: Rgb<u8>,
) {
    for (pass_color, grow) in [(outline, STROKE as i64), (fill, 0)] {
        for (i, ch) in text.chars().enumerate() {
            let Some(glyph) = BASIC_FONTS.get(ch) else {
                continue;
            };
            let gx0 = x as i64 + (i as u32 * GLYPH * scale) as i64;
            for (gy, bits) in glyph.iter().enumerate() {
                for gx in 0..GLYPH {
                    if bits & (1 << gx) == 0 {
                        continue;
                    }
                    let px = gx0 + (gx * scale) as i64;
                    let py = y as i64 + (gy as u32 * scale) as i64;
                    let size = scale as i64 + 2 * grow;
                    fill_rect(image, px - grow, py - grow, size, size, pass_color);
                }
            }
        }
    }
}

fn fill_rect(image: &mut RgbImage, x: i64, y: i64, w: i64, h: i64, color: Rgb<u8>) {
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + w).min(image.width() as i64);
    let y1 = (y + h).min(image.height() as i64);
    for py in y0..y1 {
        for px in x0..x1 {
            image.put_pixel(px as u32, py as u32, color);
        }
    }
}

fn fill_circle<F>(image: &mut RgbImage, cx: i64, cy: i64, r: i64, color: Rgb<u8>, keep: F)
where
    F: Fn(i64, i64) -> bool,
{
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy > r * r || !keep(dx, dy) {
                continue;
            }
            let (px, py) = (cx + dx, cy + dy);
            if px >= 0 && py >= 0 && (px as u32) < image.width() && (py as u32) < image.height() {
                image.put_pixel(px as u32, py as u32, color);
            }
        }
    }
}

/// Yellow face, squinting eyes and an open mouth.
fn draw_laughing_face(image: &mut RgbImage, cx: u32, cy: u32, radius: u32) {
    let (cx, cy, r) = (cx as i64, cy as i64, radius as i64);
    let dark = Rgb([60, 30, 0]);

    fill_circle(image, cx, cy, r, dark, |_, _| true);
    fill_circle(image, cx, cy, r - 4, Rgb([255, 204, 0]), |_, _| true);

    // eyes: upper halves of small discs read as squeezed shut
    let eye_r = r / 6;
    for ex in [cx - r / 3, cx + r / 3] {
        fill_circle(image, ex, cy - r / 4, eye_r, dark, |_, dy| dy <= 0);
    }

    let mouth_r = r / 2;
    fill_circle(image, cx, cy + r / 8, mouth_r, dark, |_, dy| dy >= 0);
    fill_circle(image, cx, cy + r / 8 + mouth_r / 2, mouth_r / 2, Rgb([220, 60, 60]), |_, dy| {
        dy >= 0
    });
}
