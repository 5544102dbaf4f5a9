//! Raster images, native frames and the drawing canvas.
//!
//! Everything the composer builds is an RGB8 [`RasterImage`]. Right before a
//! frame reaches the hardware it is converted to the display's native
//! [`ColorMode`] as a [`Frame`]. [`Canvas`] exposes a raster as an
//! `embedded-graphics` [`DrawTarget`] for custom drawing.

use core::convert::Infallible;

use embedded_graphics::{pixelcolor::Rgb888, prelude::*};
use image::{imageops, DynamicImage, GrayImage, Rgb, RgbImage};

/// An in-memory RGB8 pixel buffer.
pub type RasterImage = RgbImage;

// ── ColorMode ────────────────────────────────────────────────────────────

/// Native pixel format of a display target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorMode {
    /// 24-bit colour, 3 bytes per pixel.
    Rgb,
    /// 8-bit greyscale, 1 byte per pixel.
    Luma,
    /// 1-bit monochrome, 1 byte per pixel holding `0x00` or `0xFF`.
    Binary,
}

impl ColorMode {
    /// Bytes used to store one pixel in a [`Frame`] of this mode.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ColorMode::Rgb => 3,
            ColorMode::Luma | ColorMode::Binary => 1,
        }
    }
}

/// Luma threshold at or above which a pixel is lit in [`ColorMode::Binary`].
pub const BINARY_THRESHOLD: u8 = 128;

/// ITU-R 601-2 luma transform.
pub fn luma(pixel: Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
}

// ── Frame ────────────────────────────────────────────────────────────────

/// A raster converted to a display's native pixel format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    mode: ColorMode,
    data: Vec<u8>,
}

impl Frame {
    /// Convert an RGB raster to `mode`.
    pub fn from_rgb(raster: &RasterImage, mode: ColorMode) -> Self {
        let data = match mode {
            ColorMode::Rgb => raster.as_raw().clone(),
            ColorMode::Luma => raster.pixels().map(|p| luma(*p)).collect(),
            ColorMode::Binary => raster
                .pixels()
                .map(|p| if luma(*p) >= BINARY_THRESHOLD { 0xFF } else { 0x00 })
                .collect(),
        };
        Self {
            width: raster.width(),
            height: raster.height(),
            mode,
            data,
        }
    }

    /// An all-black frame.
    pub fn black(width: u32, height: u32, mode: ColorMode) -> Self {
        Self {
            width,
            height,
            mode,
            data: vec![0; width as usize * height as usize * mode.bytes_per_pixel()],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    /// Packed pixel data, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Brightness of the pixel at `(x, y)`, or `None` outside the frame.
    ///
    /// For [`ColorMode::Rgb`] frames this is the pixel's luma.
    pub fn brightness(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * self.mode.bytes_per_pixel();
        Some(match self.mode {
            ColorMode::Rgb => luma(Rgb([self.data[i], self.data[i + 1], self.data[i + 2]])),
            ColorMode::Luma | ColorMode::Binary => self.data[i],
        })
    }

    /// `true` if every pixel is off.
    pub fn is_black(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }

    /// Convert back to an [`image`] buffer, e.g. to save a snapshot.
    pub fn to_image(&self) -> DynamicImage {
        let image = match self.mode {
            ColorMode::Rgb => RgbImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageRgb8),
            ColorMode::Luma | ColorMode::Binary => {
                GrayImage::from_raw(self.width, self.height, self.data.clone())
                    .map(DynamicImage::ImageLuma8)
            }
        };
        // Buffer length always matches the dimensions.
        image.unwrap_or_else(|| DynamicImage::new_luma8(self.width, self.height))
    }
}

// ── Raster helpers ───────────────────────────────────────────────────────

/// A solid black raster.
pub fn blank_canvas(width: u32, height: u32) -> RasterImage {
    RgbImage::new(width, height)
}

/// Drop any alpha channel by compositing the image over opaque black.
///
/// Images without alpha are only converted to RGB8.
pub fn flatten_alpha(image: &DynamicImage) -> RasterImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (dst, src) in out.pixels_mut().zip(rgba.pixels()) {
        let [r, g, b, a] = src.0;
        let a = a as u32;
        *dst = Rgb([
            (r as u32 * a / 255) as u8,
            (g as u32 * a / 255) as u8,
            (b as u32 * a / 255) as u8,
        ]);
    }
    out
}

/// Resize to exactly `width`×`height` with a Lanczos3 filter.
pub fn resize_exact(raster: &RasterImage, width: u32, height: u32) -> RasterImage {
    if raster.dimensions() == (width, height) {
        return raster.clone();
    }
    imageops::resize(raster, width, height, imageops::FilterType::Lanczos3)
}

/// Place `raster` at the origin of a black `width`×`height` canvas,
/// cropping whatever does not fit.
pub fn fit_canvas(raster: &RasterImage, width: u32, height: u32) -> RasterImage {
    if raster.dimensions() == (width, height) {
        return raster.clone();
    }
    let mut canvas = blank_canvas(width, height);
    imageops::replace(&mut canvas, raster, 0, 0);
    canvas
}

// ── Canvas ───────────────────────────────────────────────────────────────

/// Drawing context bound to a raster.
///
/// Implements [`DrawTarget`] with [`Rgb888`] colour so any
/// `embedded-graphics` primitive, text or image can be drawn onto it.
/// Pixels outside the raster are silently clipped.
pub struct Canvas<'a> {
    raster: &'a mut RasterImage,
}

impl<'a> Canvas<'a> {
    pub fn new(raster: &'a mut RasterImage) -> Self {
        Self { raster }
    }

    /// The underlying raster, for pixel-level work such as pasting images.
    pub fn raster_mut(&mut self) -> &mut RasterImage {
        &mut *self.raster
    }

    /// Paste `image` with its top-left corner at `offset`.
    ///
    /// Negative offsets and overflow are clipped.
    pub fn paste(&mut self, image: &RasterImage, offset: Point) {
        imageops::replace(&mut *self.raster, image, offset.x as i64, offset.y as i64);
    }
}

impl OriginDimensions for Canvas<'_> {
    fn size(&self) -> Size {
        Size::new(self.raster.width(), self.raster.height())
    }
}

impl DrawTarget for Canvas<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = self.raster.dimensions();
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x < width && y < height {
                self.raster
                    .put_pixel(x, y, Rgb([color.r(), color.g(), color.b()]));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
    use image::{Rgba, RgbaImage};

    #[test]
    fn luma_uses_itu_601_weights() {
        assert_eq!(luma(Rgb([255, 255, 255])), 255);
        assert_eq!(luma(Rgb([0, 0, 0])), 0);
        assert_eq!(luma(Rgb([255, 0, 0])), 76);
        assert_eq!(luma(Rgb([0, 255, 0])), 149);
        assert_eq!(luma(Rgb([0, 0, 255])), 29);
    }

    #[test]
    fn binary_frames_are_only_on_or_off() {
        let mut raster = blank_canvas(4, 1);
        raster.put_pixel(0, 0, Rgb([255, 255, 255]));
        raster.put_pixel(1, 0, Rgb([128, 128, 128]));
        raster.put_pixel(2, 0, Rgb([127, 127, 127]));
        let frame = Frame::from_rgb(&raster, ColorMode::Binary);
        assert_eq!(frame.data(), &[0xFF, 0xFF, 0x00, 0x00]);
    }

    #[test]
    fn luma_frame_has_one_byte_per_pixel() {
        let raster = RgbImage::from_pixel(8, 2, Rgb([255, 255, 255]));
        let frame = Frame::from_rgb(&raster, ColorMode::Luma);
        assert_eq!(frame.data().len(), 16);
        assert_eq!(frame.brightness(7, 1), Some(255));
        assert_eq!(frame.brightness(8, 1), None);
    }

    #[test]
    fn black_frame_is_black() {
        let frame = Frame::black(256, 64, ColorMode::Rgb);
        assert_eq!(frame.size(), (256, 64));
        assert_eq!(frame.data().len(), 256 * 64 * 3);
        assert!(frame.is_black());
    }

    #[test]
    fn flatten_alpha_composites_over_black() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, Rgba([200, 100, 50, 0]));
        rgba.put_pixel(1, 0, Rgba([200, 100, 50, 255]));
        let flat = flatten_alpha(&DynamicImage::ImageRgba8(rgba));
        assert_eq!(flat.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(flat.get_pixel(1, 0), &Rgb([200, 100, 50]));
    }

    #[test]
    fn fit_canvas_crops_and_pads() {
        let big = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
        let fitted = fit_canvas(&big, 4, 12);
        assert_eq!(fitted.dimensions(), (4, 12));
        assert_eq!(fitted.get_pixel(3, 9), &Rgb([255, 255, 255]));
        assert_eq!(fitted.get_pixel(3, 10), &Rgb([0, 0, 0]));
    }

    #[test]
    fn resize_exact_hits_target_size() {
        let src = RgbImage::from_pixel(100, 30, Rgb([10, 20, 30]));
        assert_eq!(resize_exact(&src, 35, 35).dimensions(), (35, 35));
    }

    #[test]
    fn canvas_clips_out_of_bounds_pixels() {
        let mut raster = blank_canvas(8, 8);
        let mut canvas = Canvas::new(&mut raster);
        Rectangle::new(Point::new(-4, -4), Size::new(6, 6))
            .into_styled(PrimitiveStyle::with_fill(Rgb888::WHITE))
            .draw(&mut canvas)
            .unwrap();
        assert_eq!(raster.get_pixel(1, 1), &Rgb([255, 255, 255]));
        assert_eq!(raster.get_pixel(2, 2), &Rgb([0, 0, 0]));
    }

    #[test]
    fn canvas_paste_accepts_negative_offsets() {
        let mut raster = blank_canvas(8, 8);
        let tile = RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]));
        Canvas::new(&mut raster).paste(&tile, Point::new(-2, 6));
        assert_eq!(raster.get_pixel(0, 6), &Rgb([255, 0, 0]));
        assert_eq!(raster.get_pixel(1, 7), &Rgb([255, 0, 0]));
        assert_eq!(raster.get_pixel(2, 6), &Rgb([0, 0, 0]));
    }
}
