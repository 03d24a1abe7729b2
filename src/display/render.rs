/*
 *  display/render.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Track card composition, fallback image and debug dumps
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::collections::HashMap;
use std::path::Path;

use embedded_graphics::mono_font::ascii::{FONT_4X6, FONT_5X7, FONT_5X8, FONT_6X10};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use image::{imageops::FilterType, DynamicImage, RgbImage};
use log::{debug, warn};
use reqwest::Client;

use crate::config::{ImageConfig, TextColorMode};
use crate::display::error::DisplayError;
use crate::display::frame::Frame;
use crate::display::marquee::MarqueeSync;

/// Bundled monospace fonts, selectable by name in the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphFont {
    F4x6,
    F5x7,
    F5x8,
    F6x10,
}

impl GlyphFont {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "4x6" => GlyphFont::F4x6,
            "5x7" => GlyphFont::F5x7,
            "5x8" => GlyphFont::F5x8,
            "6x10" => GlyphFont::F6x10,
            other => {
                warn!("unknown font '{}', using 4x6", other);
                GlyphFont::F4x6
            }
        }
    }

    pub fn mono(self) -> &'static MonoFont<'static> {
        match self {
            GlyphFont::F4x6 => &FONT_4X6,
            GlyphFont::F5x7 => &FONT_5X7,
            GlyphFont::F5x8 => &FONT_5X8,
            GlyphFont::F6x10 => &FONT_6X10,
        }
    }
}

/// Height of a capital letter, which is what lines are spaced by.
pub fn glyph_height(font: &MonoFont<'_>) -> u32 {
    font.baseline + 1
}

pub fn font_for(name: &str) -> &'static MonoFont<'static> {
    GlyphFont::from_name(name).mono()
}

/// Exact pixel width of `text` in a monospace font.
pub fn text_width(text: &str, font: &MonoFont<'_>) -> u32 {
    let chars = text.chars().count() as u32;
    if chars == 0 {
        return 0;
    }
    chars * font.character_size.width + (chars - 1) * font.character_spacing
}

fn luminance(c: Rgb888) -> f64 {
    0.2126 * f64::from(c.r()) + 0.7152 * f64::from(c.g()) + 0.0722 * f64::from(c.b())
}

fn scale_rgb(c: Rgb888, factor: f64) -> Rgb888 {
    let ch = |v: u8| (f64::from(v) * factor).min(255.0) as u8;
    Rgb888::new(ch(c.r()), ch(c.g()), ch(c.b()))
}

fn saturation(c: Rgb888) -> f64 {
    let max = c.r().max(c.g()).max(c.b());
    let min = c.r().min(c.g()).min(c.b());
    if max == 0 {
        return 0.0;
    }
    f64::from(max - min) / f64::from(max)
}

/// Coarse colour histogram: 3 bits per channel, each bucket reports its mean.
fn histogram(img: &RgbImage) -> Vec<(u32, Rgb888)> {
    let mut buckets: HashMap<u16, (u32, [u64; 3])> = HashMap::new();
    for p in img.pixels() {
        let key = (u16::from(p[0] >> 5) << 6) | (u16::from(p[1] >> 5) << 3) | u16::from(p[2] >> 5);
        let entry = buckets.entry(key).or_insert((0, [0; 3]));
        entry.0 += 1;
        for i in 0..3 {
            entry.1[i] += u64::from(p[i]);
        }
    }
    let mut out: Vec<(u32, Rgb888)> = buckets
        .into_values()
        .map(|(n, sum)| {
            let avg = |s: u64| (s / u64::from(n)) as u8;
            (n, Rgb888::new(avg(sum[0]), avg(sum[1]), avg(sum[2])))
        })
        .collect();
    out.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| luminance(a.1).total_cmp(&luminance(b.1))));
    out
}

/// Dominant saturated colour of the cover, luminance clamped to 60..=180.
pub fn dynamic_bg_color(cover: &DynamicImage) -> Rgb888 {
    let small = cover.resize_exact(64, 64, FilterType::Triangle).to_rgb8();
    let counts = histogram(&small);
    let Some(&(_, most_common)) = counts.first() else {
        return Rgb888::new(40, 40, 40);
    };

    let base = counts
        .iter()
        .enumerate()
        .filter(|(_, (_, c))| saturation(*c) >= 0.25)
        .filter(|(_, (_, c))| (30.0..=230.0).contains(&luminance(*c)))
        .map(|(rank, (n, c))| {
            // the top bucket is usually a flat border, damp it
            let score = if rank == 0 { f64::from(*n) * 0.7 } else { f64::from(*n) };
            (score, *c)
        })
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c)
        .unwrap_or(most_common);

    let lum = luminance(base);
    if lum < 60.0 {
        scale_rgb(base, 60.0 / lum.max(1.0))
    } else if lum > 180.0 {
        scale_rgb(base, 180.0 / lum)
    } else {
        base
    }
}

/// Most frequent non-bright colour of the cover, darkened if still too light.
pub fn contrasting_color(cover: &DynamicImage) -> Rgb888 {
    let small = cover.resize_exact(8, 8, FilterType::Triangle).to_rgb8();
    let mut counts: HashMap<[u8; 3], u32> = HashMap::new();
    for p in small.pixels() {
        *counts.entry(p.0).or_default() += 1;
    }
    let mut all: Vec<(u32, Rgb888)> = counts
        .into_iter()
        .map(|(rgb, n)| (n, Rgb888::new(rgb[0], rgb[1], rgb[2])))
        .collect();
    all.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| luminance(a.1).total_cmp(&luminance(b.1))));

    let color = all
        .iter()
        .find(|(_, c)| luminance(*c) < 220.0)
        .or_else(|| all.first())
        .map(|(_, c)| *c)
        .unwrap_or(Rgb888::WHITE);

    let lum = luminance(color);
    if lum > 180.0 { scale_rgb(color, 180.0 / lum) } else { color }
}

/// Black on light backgrounds, white otherwise.
pub fn contrast_text_color(background: Rgb888) -> Rgb888 {
    if luminance(background) > 127.0 { Rgb888::BLACK } else { Rgb888::WHITE }
}

fn rgb(c: [u8; 3]) -> Rgb888 {
    Rgb888::new(c[0], c[1], c[2])
}

#[derive(Debug, Clone)]
struct TextLine {
    text: String,
    width: u32,
    y: i32,
}

/// Everything needed to render a track card at any scroll tick.
#[derive(Debug, Clone)]
pub struct TrackLayout {
    canvas: u32,
    background: Rgb888,
    text_color: Rgb888,
    cover: Option<RgbImage>,
    cover_origin: (i32, i32),
    font: GlyphFont,
    artist: TextLine,
    title: TextLine,
    marquee: MarqueeSync,
}

/// Resolve colours, cover placement and text metrics for one track.
pub fn prepare_track_layout(
    cover: Option<&DynamicImage>,
    artist: &str,
    title: &str,
    cfg: &ImageConfig,
) -> TrackLayout {
    let canvas = cfg.canvas_size;
    let cover_size = cfg.cover_size.min(canvas);

    let background = match cover {
        Some(img) if cfg.use_dynamic_bg => dynamic_bg_color(img),
        _ => rgb(cfg.background_color),
    };
    let text_color = match (cfg.effective_text_color_mode(), cover) {
        (TextColorMode::Dominant, Some(img)) => contrasting_color(img),
        (TextColorMode::Contrast, _) => contrast_text_color(background),
        _ => rgb(cfg.text_color),
    };

    let cover = cover.map(|img| {
        let side = img.width().min(img.height());
        let left = (img.width() - side) / 2;
        let top = (img.height() - side) / 2;
        img.crop_imm(left, top, side, side)
            .resize_exact(cover_size, cover_size, FilterType::Triangle)
            .to_rgb8()
    });

    let glyphs = GlyphFont::from_name(&cfg.font);
    let font = glyphs.mono();
    let (artist, title) = if cfg.uppercase {
        (artist.to_uppercase(), title.to_uppercase())
    } else {
        (artist.to_string(), title.to_string())
    };

    // cover centred on top, the text band below it
    let cover_origin = ((canvas as i32 - cover_size as i32) / 2, cfg.top_margin as i32);
    let glyph_h = glyph_height(font) as i32;
    let artist_y = cover_origin.1 + cover_size as i32 + cfg.margin_image_text as i32;
    let title_y = artist_y + glyph_h + cfg.line_spacing_margin as i32;

    let artist_w = text_width(&artist, font);
    let title_w = text_width(&title, font);
    debug!("layout: artist {}px, title {}px on {}px canvas", artist_w, title_w, canvas);

    TrackLayout {
        canvas,
        background,
        text_color,
        cover,
        cover_origin,
        font: glyphs,
        artist: TextLine { text: artist, width: artist_w, y: artist_y },
        title: TextLine { text: title, width: title_w, y: title_y },
        marquee: MarqueeSync::new(artist_w, title_w, canvas),
    }
}

impl TrackLayout {
    pub fn marquee(&self) -> &MarqueeSync {
        &self.marquee
    }

    pub fn canvas_size(&self) -> u32 {
        self.canvas
    }

    pub fn background(&self) -> Rgb888 {
        self.background
    }

    pub fn text_color(&self) -> Rgb888 {
        self.text_color
    }

    /// Whether any line scrolls, i.e. more than one distinct frame exists.
    pub fn is_animated(&self) -> bool {
        self.marquee.period().is_some()
    }

    pub fn render(&self, tick: f64) -> Frame {
        let mut frame = Frame::new(self.canvas, self.background);
        if let Some(cover) = &self.cover {
            frame.blit(cover, self.cover_origin.0, self.cover_origin.1);
        }

        let style = MonoTextStyle::new(self.font.mono(), self.text_color);
        let (artist_x, title_x) = self.marquee.positions(tick);
        for (line, x) in [(&self.artist, artist_x), (&self.title, title_x)] {
            if line.text.is_empty() {
                continue;
            }
            // Frame drawing is infallible
            let _ = Text::with_baseline(&line.text, Point::new(x, line.y), style, Baseline::Top)
                .draw(&mut frame);
        }
        frame
    }
}

/// Load the placeholder image and fit it to the canvas.
pub fn load_fallback(path: &Path, canvas: u32) -> Result<Frame, DisplayError> {
    let img = image::open(path)?.to_rgb8();
    Ok(Frame::from_image(&img, canvas))
}

/// Download and decode a cover image.
pub async fn fetch_cover(client: &Client, url: &str) -> Result<DynamicImage, DisplayError> {
    let bytes = client.get(url).send().await?.error_for_status()?.bytes().await?;
    Ok(image::load_from_memory(&bytes)?)
}

/// Save the raw frame and an upscaled preview, whichever paths are set.
pub fn save_debug_frames(
    frame: &Frame,
    frame_path: Option<&Path>,
    preview_path: Option<&Path>,
    preview_scale: u32,
) -> Result<(), DisplayError> {
    let img = frame.to_image();
    if let Some(path) = frame_path {
        img.save(path)?;
        debug!("frame saved to {}", path.display());
    }
    if let Some(path) = preview_path {
        let edge = frame.size() * preview_scale.max(1);
        image::imageops::resize(&img, edge, edge, FilterType::Nearest).save(path)?;
        debug!("preview saved to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(w: u32, h: u32, c: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(c)))
    }

    #[test]
    fn test_font_lookup_and_width() {
        let f = font_for("5x8");
        assert_eq!(f.character_size.width, 5);
        assert_eq!(text_width("ABCD", f), 20 + 3 * f.character_spacing);
        assert_eq!(text_width("", f), 0);
        assert_eq!(font_for("6X10").character_size.height, 10);
        assert_eq!(font_for("comic sans").character_size.width, 4);
        assert_eq!(glyph_height(&FONT_4X6), 5);
    }

    #[test]
    fn test_contrast_text() {
        assert_eq!(contrast_text_color(Rgb888::new(250, 250, 250)), Rgb888::BLACK);
        assert_eq!(contrast_text_color(Rgb888::new(10, 20, 30)), Rgb888::WHITE);
    }

    #[test]
    fn test_dynamic_bg_prefers_saturated_and_clamps() {
        let mut img = RgbImage::from_pixel(64, 64, Rgb([128, 128, 128]));
        for y in 0..24 {
            for x in 0..64 {
                img.put_pixel(x, y, Rgb([200, 30, 30]));
            }
        }
        let c = dynamic_bg_color(&DynamicImage::ImageRgb8(img));
        assert!(c.r() > c.g() && c.r() > c.b());
        let lum = luminance(c);
        assert!((60.0..=180.5).contains(&lum), "lum {}", lum);

        let white = dynamic_bg_color(&solid(10, 10, [255, 255, 255]));
        assert!(luminance(white) <= 180.5);
    }

    #[test]
    fn test_contrasting_color_skips_bright() {
        let mut img = RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]));
        img.put_pixel(0, 0, Rgb([0, 0, 200]));
        let c = contrasting_color(&DynamicImage::ImageRgb8(img));
        assert_eq!(c, Rgb888::new(0, 0, 200));
    }

    #[test]
    fn test_render_places_cover_and_text() {
        let cfg = ImageConfig::default();
        let cover = solid(100, 80, [0, 200, 0]);
        let layout = prepare_track_layout(Some(&cover), "Band", "A Very Long Song Title Indeed", &cfg);
        assert!(layout.is_animated());
        let frame = layout.render(0.0);
        assert_eq!(frame.size(), 64);
        // cover centred horizontally at top_margin, background around it
        assert_eq!(frame.pixel(8, 1), Some(Rgb888::BLACK));
        assert_eq!(frame.pixel(9, 0), Some(Rgb888::BLACK));
        let top_left = frame.pixel(9, 1).unwrap();
        assert!(top_left.g() > 190 && top_left.r() < 10);
        let bottom_right = frame.pixel(54, 46).unwrap();
        assert!(bottom_right.g() > 190 && bottom_right.r() < 10);
        assert_eq!(frame.pixel(55, 46), Some(Rgb888::BLACK));
        // artist text sits in the band below the cover
        let band_white = (47..64)
            .flat_map(|y| (0..64).map(move |x| (x, y)))
            .filter(|&(x, y)| frame.pixel(x, y) == Some(Rgb888::WHITE))
            .count();
        assert!(band_white > 0);
    }

    #[test]
    fn test_text_never_covers_the_cover() {
        let cfg = ImageConfig::default();
        let cover = solid(100, 100, [0, 0, 255]);
        let layout = prepare_track_layout(Some(&cover), "AB", "CD", &cfg);
        let frame = layout.render(0.0);
        for y in 1..47 {
            for x in 9..55 {
                let p = frame.pixel(x, y).unwrap();
                assert!(p.b() > 240 && p.r() < 10 && p.g() < 10, "cover pixel ({}, {})", x, y);
            }
        }
        let below = (47..64)
            .flat_map(|y| (0..64).map(move |x| (x, y)))
            .filter(|&(x, y)| frame.pixel(x, y) == Some(Rgb888::WHITE))
            .count();
        assert!(below > 0);
    }

    #[test]
    fn test_default_band_fits_the_canvas() {
        let cfg = ImageConfig::default();
        let layout = prepare_track_layout(None, "AB", "CD", &cfg);
        let frame = layout.render(0.0);
        // title caps of the default font end inside a 64px canvas
        let glyph_h = glyph_height(font_for(&cfg.font));
        let title_y = 1 + 46 + 3 + glyph_h + 3;
        assert!(title_y + glyph_h <= 64);
        let title_white = (title_y..title_y + glyph_h)
            .flat_map(|y| (0..64).map(move |x| (x, y)))
            .filter(|&(x, y)| frame.pixel(x, y) == Some(Rgb888::WHITE))
            .count();
        assert!(title_white > 0);
    }

    #[test]
    fn test_text_only_without_cover() {
        let cfg = ImageConfig { background_color: [10, 10, 10], ..ImageConfig::default() };
        let layout = prepare_track_layout(None, "A", "B", &cfg);
        assert!(!layout.is_animated());
        let frame = layout.render(99.0);
        assert_eq!(frame.pixel(0, 1), Some(Rgb888::new(10, 10, 10)));
    }

    #[test]
    fn test_short_lines_are_centered() {
        let cfg = ImageConfig { font: "4x6".into(), ..ImageConfig::default() };
        let layout = prepare_track_layout(None, "abc", "de", &cfg);
        assert_eq!(layout.marquee().positions(0.0).0, ((64 - text_width("ABC", &FONT_4X6)) / 2) as i32);
    }

    #[test]
    fn test_fallback_and_debug_dumps() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("fallback.png");
        RgbImage::from_pixel(8, 8, Rgb([1, 2, 3])).save(&src).unwrap();
        let frame = load_fallback(&src, 32).unwrap();
        assert_eq!(frame.size(), 32);
        assert_eq!(frame.pixel(31, 31), Some(Rgb888::new(1, 2, 3)));

        let raw = dir.path().join("frame.png");
        let preview = dir.path().join("preview.png");
        save_debug_frames(&frame, Some(&raw), Some(&preview), 4).unwrap();
        assert_eq!(image::open(&preview).unwrap().width(), 128);
        assert!(raw.exists());

        assert!(load_fallback(&dir.path().join("missing.png"), 32).is_err());
    }
}
