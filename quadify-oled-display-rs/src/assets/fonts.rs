//! Font cache and text rendering.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

use ab_glyph::{point, Font, FontArc, GlyphId, PxScale, ScaleFont};
use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    text::{Baseline, Text},
};
use image::Rgb;
use log::{error, info, warn};

use crate::config::FontSpec;
use crate::error::OledError;
use crate::raster::{Canvas, RasterImage};

/// Built-in bitmap font used whenever a font key is unknown or its file
/// could not be loaded.
pub static DEFAULT_FONT: FontHandle = FontHandle::Builtin;

// ── FontHandle ───────────────────────────────────────────────────────────

/// A loaded font resource.
#[derive(Clone)]
pub enum FontHandle {
    /// The 6×10 bitmap font compiled into the binary.
    Builtin,
    /// Scalable font parsed from a TrueType/OpenType file.
    TrueType { font: FontArc, size: f32 },
}

impl fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontHandle::Builtin => f.write_str("Builtin"),
            FontHandle::TrueType { size, .. } => {
                f.debug_struct("TrueType").field("size", size).finish()
            }
        }
    }
}

impl FontHandle {
    /// Parse a font file and bind it to a pixel size.
    ///
    /// `size` is the em square in pixels, as with FreeType.
    ///
    /// # Errors
    ///
    /// Returns [`OledError::Io`] if the file cannot be read, or
    /// [`OledError::Font`] if it is not a valid font.
    pub fn from_file(path: &Path, size: f32) -> Result<Self, OledError> {
        let bytes = fs::read(path)?;
        let font = FontArc::try_from_vec(bytes)?;
        Ok(FontHandle::TrueType { font, size })
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, FontHandle::Builtin)
    }

    /// Draw `text` with its top-left corner at `position`.
    ///
    /// Pixels outside the raster are clipped. TrueType glyphs are
    /// anti-aliased against whatever is already on the raster.
    pub fn draw_text(&self, raster: &mut RasterImage, text: &str, position: Point, fill: Rgb888) {
        match self {
            FontHandle::Builtin => {
                let style = MonoTextStyle::new(&FONT_6X10, fill);
                Text::with_baseline(text, position, style, Baseline::Top)
                    .draw(&mut Canvas::new(raster))
                    .ok();
            }
            FontHandle::TrueType { font, size } => {
                draw_outline_text(font, *size, raster, text, position, fill);
            }
        }
    }
}

fn draw_outline_text(
    font: &FontArc,
    size: f32,
    raster: &mut RasterImage,
    text: &str,
    position: Point,
    fill: Rgb888,
) {
    let scaled = font.as_scaled(em_scale(font, size));
    let baseline = position.y as f32 + scaled.ascent();
    let (width, height) = raster.dimensions();
    let ink = [fill.r() as f32, fill.g() as f32, fill.b() as f32];

    let mut caret = position.x as f32;
    let mut previous: Option<GlyphId> = None;
    for ch in text.chars() {
        if ch.is_control() {
            continue;
        }
        let id = scaled.glyph_id(ch);
        if let Some(prev) = previous {
            caret += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(scaled.scale(), point(caret, baseline));
        caret += scaled.h_advance(id);
        previous = Some(id);

        let Some(outlined) = font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outlined.px_bounds();
        outlined.draw(|gx, gy, coverage| {
            let x = bounds.min.x as i32 + gx as i32;
            let y = bounds.min.y as i32 + gy as i32;
            if x < 0 || y < 0 || x as u32 >= width || y as u32 >= height {
                return;
            }
            let c = coverage.clamp(0.0, 1.0);
            let pixel = raster.get_pixel_mut(x as u32, y as u32);
            let Rgb(bg) = *pixel;
            *pixel = Rgb([
                (bg[0] as f32 * (1.0 - c) + ink[0] * c).round() as u8,
                (bg[1] as f32 * (1.0 - c) + ink[1] * c).round() as u8,
                (bg[2] as f32 * (1.0 - c) + ink[2] * c).round() as u8,
            ]);
        });
    }
}

/// Scale at which the font's em square is `size` pixels tall.
///
/// `PxScale` measures ascent to descent, which is larger than the em for
/// most fonts.
fn em_scale(font: &FontArc, size: f32) -> PxScale {
    let height = font.height_unscaled();
    match font.units_per_em() {
        Some(em) if em > 0.0 && height > 0.0 => PxScale::from(size * height / em),
        _ => PxScale::from(size),
    }
}

// ── FontSet ──────────────────────────────────────────────────────────────

/// Immutable mapping from font key to [`FontHandle`].
///
/// Lookups never fail: unknown keys resolve to [`DEFAULT_FONT`].
#[derive(Debug, Clone, Default)]
pub struct FontSet {
    fonts: HashMap<String, FontHandle>,
}

impl FontSet {
    /// Load every configured font, substituting [`DEFAULT_FONT`] for any
    /// that is missing or fails to parse.
    pub fn load(specs: &BTreeMap<String, FontSpec>) -> Self {
        let mut fonts = HashMap::with_capacity(specs.len());
        for (key, spec) in specs {
            let handle = match &spec.path {
                Some(path) if path.is_file() => match FontHandle::from_file(path, spec.size) {
                    Ok(handle) => {
                        info!(
                            "Loaded font '{}' from '{}' with size {}.",
                            key,
                            path.display(),
                            spec.size
                        );
                        handle
                    }
                    Err(e) => {
                        error!("Error loading font '{}' from '{}': {}", key, path.display(), e);
                        DEFAULT_FONT.clone()
                    }
                },
                Some(path) => {
                    warn!(
                        "Font file not found for '{}' at '{}'. Falling back to default font.",
                        key,
                        path.display()
                    );
                    DEFAULT_FONT.clone()
                }
                None => {
                    warn!("No path configured for font '{}'. Falling back to default font.", key);
                    DEFAULT_FONT.clone()
                }
            };
            fonts.insert(key.clone(), handle);
        }

        let mut keys: Vec<&str> = fonts.keys().map(String::as_str).collect();
        keys.sort_unstable();
        info!("Available fonts after loading: {:?}", keys);

        Self { fonts }
    }

    /// The font for `key`, or [`DEFAULT_FONT`] if `key` is unknown.
    pub fn get(&self, key: &str) -> &FontHandle {
        self.fonts.get(key).unwrap_or(&DEFAULT_FONT)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fonts.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

/// Build a [`FontSet`] from the configured font table.
///
/// See [`FontSet::load`].
pub fn load_fonts(specs: &BTreeMap<String, FontSpec>) -> FontSet {
    FontSet::load(specs)
}
