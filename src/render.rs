use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::error::{CutError, Result};
use crate::geometry::{AspectRatio, Padding, Region};

/// What shows through transparent sheet pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    Transparent,
    Solid(Rgba<u8>),
}

/// Settings shared by every card cut from one sheet.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub padding: Padding,
    pub ratio: AspectRatio,
    pub output_width: u32,
    pub output_height: u32,
    pub corner_radius: u32,
    pub background: Background,
    pub filter: FilterType,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            padding: Padding::default(),
            ratio: AspectRatio::default(),
            output_width: 750,
            output_height: 1050,
            corner_radius: 0,
            background: Background::Solid(Rgba([255, 255, 255, 255])),
            filter: FilterType::CatmullRom,
        }
    }
}

impl RenderConfig {
    /// The output size must agree with the aspect ratio exactly.
    pub fn validate(&self) -> Result<()> {
        if self.output_width == 0
            || self.output_height == 0
            || !self.ratio.matches_size(self.output_width, self.output_height)
        {
            return Err(CutError::OutputSizeMismatch {
                width: self.output_width,
                height: self.output_height,
                ratio: self.ratio,
            });
        }
        Ok(())
    }
}

/// Cut one card out of the sheet and produce its final raster.
///
/// `bounds` must lie inside `src`; callers get it from `normalize_box`, and
/// `cfg` is assumed validated, so rendering itself cannot fail. Corners are
/// rounded after the background fill, so they stay transparent even on a
/// solid backdrop.
pub fn render_card(src: &RgbaImage, bounds: Region, cfg: &RenderConfig) -> RgbaImage {
    debug_assert!(
        bounds.right() <= src.width() && bounds.bottom() <= src.height(),
        "{bounds} outside {}x{}",
        src.width(),
        src.height()
    );
    let mut card =
        imageops::crop_imm(src, bounds.x, bounds.y, bounds.width, bounds.height).to_image();
    if let Background::Solid(color) = cfg.background {
        composite_over(&mut card, color);
    }
    let mut card = resize_exact(card, cfg.output_width, cfg.output_height, cfg.filter);
    if cfg.corner_radius > 0 {
        round_corners(&mut card, cfg.corner_radius);
    }
    card
}

/// Source-over compositing of every pixel onto a uniform backdrop.
fn composite_over(img: &mut RgbaImage, backdrop: Rgba<u8>) {
    let [br, bg, bb, ba] = backdrop.0;
    for px in img.pixels_mut() {
        let [r, g, b, a] = px.0;
        if a == 255 {
            continue;
        }
        let sa = a as f32 / 255.0;
        let da = ba as f32 / 255.0 * (1.0 - sa);
        let oa = sa + da;
        if oa == 0.0 {
            *px = Rgba([0, 0, 0, 0]);
            continue;
        }
        let blend = |s: u8, d: u8| ((s as f32 * sa + d as f32 * da) / oa).round() as u8;
        *px = Rgba([
            blend(r, br),
            blend(g, bg),
            blend(b, bb),
            (oa * 255.0).round() as u8,
        ]);
    }
}

/// Resize through premultiplied alpha so transparent pixels cannot bleed
/// their color channels into the result.
fn resize_exact(img: RgbaImage, width: u32, height: u32, filter: FilterType) -> RgbaImage {
    if img.width() == width && img.height() == height {
        return img;
    }
    let mut img = img;
    premultiply_alpha(&mut img);
    let mut resized = imageops::resize(&img, width, height, filter);
    unpremultiply_alpha(&mut resized);
    resized
}

fn premultiply_alpha(img: &mut RgbaImage) {
    for px in img.pixels_mut() {
        let a = px.0[3] as u16;
        for c in px.0.iter_mut().take(3) {
            *c = ((*c as u16 * a + 127) / 255) as u8;
        }
    }
}

fn unpremultiply_alpha(img: &mut RgbaImage) {
    for px in img.pixels_mut() {
        let a = px.0[3] as u16;
        if a == 0 {
            px.0 = [0, 0, 0, 0];
            continue;
        }
        for c in px.0.iter_mut().take(3) {
            let v = (*c as u16 * 255 + a / 2) / a;
            *c = v.min(255) as u8;
        }
    }
}

/// Multiply alpha by quarter-circle coverage in each corner square, with a
/// one-pixel falloff so the arc does not alias.
fn round_corners(img: &mut RgbaImage, radius: u32) {
    let (w, h) = img.dimensions();
    let r = radius.min(w / 2).min(h / 2);
    if r == 0 {
        return;
    }
    let rf = r as f32;
    let centers = [
        (rf, rf),
        (w as f32 - rf, rf),
        (rf, h as f32 - rf),
        (w as f32 - rf, h as f32 - rf),
    ];
    let squares = [(0, 0), (w - r, 0), (0, h - r), (w - r, h - r)];
    for ((cx, cy), (sx, sy)) in centers.into_iter().zip(squares) {
        for y in sy..sy + r {
            for x in sx..sx + r {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                let d = (dx * dx + dy * dy).sqrt();
                let coverage = (rf - d + 0.5).clamp(0.0, 1.0);
                if coverage < 1.0 {
                    let px = img.get_pixel_mut(x, y);
                    px.0[3] = (px.0[3] as f32 * coverage).round() as u8;
                }
            }
        }
    }
}
