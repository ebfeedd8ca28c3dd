//! Rasterizer – settles embedded images, then paints the laid-out snapshot
//! into a single RGBA bitmap at the configured oversampling factor.
//!
//! Image settling is a fan-out of independent decode operations, all racing
//! a single deadline; an image that errors or misses the deadline is hidden
//! from the output and logged, never fatal. This stage is the pipeline's
//! only wait point.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use image::RgbaImage;
use tiny_skia::{
    FillRule, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Transform,
};
use ttf_parser::OutlineBuilder;

use crate::dom::{DomNode, ElementNode, Tag};
use crate::error::{ExportError, Result};
use crate::fonts::FontManager;
use crate::layout::{ImageDims, LayoutResult, PaintOp};
use crate::style::Color;

/// The single rasterized image of the entire snapshot before slicing.
pub type Bitmap = RgbaImage;

// ---------------------------------------------------------------------------
// Image settling
// ---------------------------------------------------------------------------

/// Images that reached a decoded state before their timeout. Anything not in
/// the map is treated as hidden by layout and raster alike.
#[derive(Debug, Default)]
pub struct SettledImages {
    images: HashMap<String, RgbaImage>,
}

impl SettledImages {
    pub fn get(&self, src: &str) -> Option<&RgbaImage> {
        self.images.get(src)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Intrinsic dimensions for the layout stage.
    pub fn dims(&self) -> ImageDims {
        self.images
            .iter()
            .map(|(src, img)| (src.clone(), (img.width(), img.height())))
            .collect()
    }
}

/// Collect the distinct `src` values of every `<img>` in the snapshot.
pub fn collect_image_srcs(root: &ElementNode) -> Vec<String> {
    let mut srcs = Vec::new();
    walk_srcs(root, &mut srcs);
    srcs
}

fn walk_srcs(elem: &ElementNode, srcs: &mut Vec<String>) {
    if elem.tag == Tag::Img {
        if let Some(src) = elem.src() {
            if !src.is_empty() && !srcs.iter().any(|s| s == src) {
                srcs.push(src.to_string());
            }
        }
    }
    for child in &elem.children {
        if let DomNode::Element(e) = child {
            walk_srcs(e, srcs);
        }
    }
}

/// Wait for every embedded image to reach a loaded-or-failed state.
///
/// Each image decodes on its own thread; all of them race one shared
/// deadline of `timeout` from now, so a pile of slow images cannot stack
/// waits and the whole settle phase stays bounded. Failures are warn-logged
/// and the image is simply left out.
pub fn settle_images(
    root: &ElementNode,
    base_dir: Option<&Path>,
    timeout: Duration,
) -> SettledImages {
    let srcs = collect_image_srcs(root);
    let mut pending = Vec::with_capacity(srcs.len());

    for src in srcs {
        let (tx, rx) = mpsc::channel();
        let task_src = src.clone();
        let base = base_dir.map(PathBuf::from);
        thread::spawn(move || {
            let _ = tx.send(decode_image(&task_src, base.as_deref()));
        });
        pending.push((src, rx));
    }

    let deadline = Instant::now() + timeout;
    let mut settled = SettledImages::default();
    for (src, rx) in pending {
        match rx.recv_timeout(remaining_until(deadline)) {
            Ok(Ok(img)) => {
                settled.images.insert(src, img);
            }
            Ok(Err(e)) => log::warn!("image failed to load, hiding it: {src}: {e}"),
            Err(_) => log::warn!("image load missed the {timeout:?} deadline, hiding it: {src}"),
        }
    }
    settled
}

/// Time left until `deadline`, zero once it has passed.
fn remaining_until(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

fn decode_image(src: &str, base_dir: Option<&Path>) -> std::result::Result<RgbaImage, String> {
    let bytes = if src.starts_with("data:") {
        parse_data_uri(src)?
    } else if src.starts_with("http://") || src.starts_with("https://") {
        return Err("remote images are not fetched; inline them as data URIs".to_string());
    } else {
        let path = match base_dir {
            Some(dir) => dir.join(src),
            None => PathBuf::from(src),
        };
        std::fs::read(&path).map_err(|e| format!("read {}: {e}", path.display()))?
    };
    let img = image::load_from_memory(&bytes).map_err(|e| format!("decode error: {e}"))?;
    Ok(img.to_rgba8())
}

/// Parse a `data:<mime>;base64,<data>` URI into raw bytes.
fn parse_data_uri(src: &str) -> std::result::Result<Vec<u8>, String> {
    let rest = match src.strip_prefix("data:") {
        Some(r) => r,
        None => return Err("not a data URI".to_string()),
    };
    let comma = rest
        .find(',')
        .ok_or_else(|| "invalid data URI: missing `,` separator".to_string())?;
    let header = &rest[..comma];
    if !header.contains(";base64") {
        return Err("only base64-encoded data URIs are supported".to_string());
    }
    BASE64_STD
        .decode(rest[comma + 1..].trim())
        .map_err(|e| format!("base64 decode error: {e}"))
}

// ---------------------------------------------------------------------------
// Painting
// ---------------------------------------------------------------------------

/// Paint a laid-out snapshot into a bitmap at `scale`× oversampling.
///
/// Zero-height content yields a zero-height bitmap; the assembler still
/// emits one blank page for it.
pub fn rasterize(
    layout: &LayoutResult,
    images: &SettledImages,
    fonts: &FontManager,
    scale: f32,
) -> Result<Bitmap> {
    if scale <= 0.0 {
        return Err(ExportError::Raster(format!("invalid scale {scale}")));
    }
    let width_px = (layout.width * scale).round().max(1.0) as u32;
    let height_px = (layout.height * scale).ceil().max(0.0) as u32;

    if height_px == 0 {
        return Ok(RgbaImage::new(width_px, 0));
    }

    let mut pixmap = Pixmap::new(width_px, height_px).ok_or_else(|| {
        ExportError::Raster(format!("invalid raster size {width_px}x{height_px}"))
    })?;
    pixmap.fill(tiny_skia::Color::WHITE);

    if !fonts.has_real_fonts() {
        log::warn!("no font outlines available; text will be missing from the bitmap");
    }

    for op in &layout.ops {
        match op {
            PaintOp::Rect {
                x,
                y,
                width,
                height,
                color,
            } => {
                if let Some(rect) =
                    Rect::from_xywh(x * scale, y * scale, width * scale, height * scale)
                {
                    let mut paint = Paint::default();
                    paint.set_color(to_skia_color(*color));
                    paint.anti_alias = false;
                    let path = PathBuilder::from_rect(rect);
                    pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
                }
            }
            PaintOp::Text {
                x,
                y,
                text,
                font_size,
                variant,
                color,
                ..
            } => {
                if let Some(face_bytes) = fonts.face_bytes(*variant) {
                    let ascender = fonts.ascender_px(*font_size, *variant);
                    draw_text_run(
                        &mut pixmap,
                        face_bytes,
                        text,
                        x * scale,
                        (y + ascender) * scale,
                        font_size * scale,
                        *color,
                    );
                }
            }
            PaintOp::Image {
                x,
                y,
                width,
                height,
                src,
            } => {
                if let Some(img) = images.get(src) {
                    draw_image(
                        &mut pixmap,
                        img,
                        x * scale,
                        y * scale,
                        width * scale,
                        height * scale,
                    );
                }
            }
        }
    }

    let bitmap = RgbaImage::from_raw(width_px, height_px, demultiply(&pixmap))
        .ok_or_else(|| ExportError::Raster("pixmap conversion failed".to_string()))?;
    Ok(bitmap)
}

fn to_skia_color(c: Color) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba(
        c.r.clamp(0.0, 1.0),
        c.g.clamp(0.0, 1.0),
        c.b.clamp(0.0, 1.0),
        c.a.clamp(0.0, 1.0),
    )
    .unwrap_or(tiny_skia::Color::BLACK)
}

fn demultiply(pixmap: &Pixmap) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixmap.pixels().len() * 4);
    for p in pixmap.pixels() {
        let c = p.demultiply();
        out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    out
}

/// Fill one run of glyph outlines along a baseline, in pixmap coordinates.
fn draw_text_run(
    pixmap: &mut Pixmap,
    face_bytes: &[u8],
    text: &str,
    baseline_x: f32,
    baseline_y: f32,
    font_size: f32,
    color: Color,
) {
    let Ok(face) = ttf_parser::Face::parse(face_bytes, 0) else {
        return;
    };
    let units_per_em = face.units_per_em().max(1) as f32;
    let glyph_scale = font_size / units_per_em;

    let mut paint = Paint::default();
    paint.set_color(to_skia_color(color));
    paint.anti_alias = true;

    let mut pen_x = baseline_x;
    for ch in text.chars() {
        let Some(gid) = face.glyph_index(ch) else {
            pen_x += font_size * 0.5;
            continue;
        };
        let mut builder = GlyphPathBuilder::new(pen_x, baseline_y, glyph_scale);
        if face.outline_glyph(gid, &mut builder).is_some() {
            if let Some(path) = builder.finish() {
                pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
            }
        }
        let advance = face.glyph_hor_advance(gid).unwrap_or(0) as f32 * glyph_scale;
        pen_x += if advance > 0.0 { advance } else { font_size * 0.5 };
    }
}

fn draw_image(pixmap: &mut Pixmap, img: &RgbaImage, x: f32, y: f32, width: f32, height: f32) {
    let (iw, ih) = (img.width(), img.height());
    if iw == 0 || ih == 0 || width <= 0.0 || height <= 0.0 {
        return;
    }
    let Some(src) = rgba_to_pixmap(img) else {
        return;
    };
    let transform = Transform::from_row(width / iw as f32, 0.0, 0.0, height / ih as f32, x, y);
    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    pixmap.draw_pixmap(0, 0, src.as_ref(), &paint, transform, None);
}

fn rgba_to_pixmap(img: &RgbaImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(img.width(), img.height())?;
    for (p, src) in pixmap.pixels_mut().iter_mut().zip(img.pixels()) {
        let [r, g, b, a] = src.0;
        *p = tiny_skia::ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Some(pixmap)
}

/// Glyph outlines arrive in font units with y pointing up; this builder
/// scales them to px and flips y into pixmap coordinates around the
/// baseline.
struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, origin_y: f32, scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            origin_y,
            scale,
        }
    }

    fn point(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.origin_y - y * self.scale)
    }

    fn finish(self) -> Option<tiny_skia::Path> {
        self.builder.finish()
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (px, py) = self.point(x, y);
        self.builder.move_to(px, py);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (px, py) = self.point(x, y);
        self.builder.line_to(px, py);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (cx, cy) = self.point(x1, y1);
        let (px, py) = self.point(x, y);
        self.builder.quad_to(cx, cy, px, py);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (c1x, c1y) = self.point(x1, y1);
        let (c2x, c2y) = self.point(x2, y2);
        let (px, py) = self.point(x, y);
        self.builder.cubic_to(c1x, c1y, c2x, c2y, px, py);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}
