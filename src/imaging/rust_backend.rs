//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader` with format sniffing |
//! | ICC profile | `image::ImageDecoder::icc_profile` |
//! | EXIF + orientation | `kamadak-exif` (`exif::Reader::read_from_container`) |
//! | Orientation | `image::imageops` rotate/flip |
//! | Resize | `image::imageops::resize`, then `crop_imm` for crop-to-fill |
//! | Composite / text | Porter-Duff "over" per pixel; glyphs from `ab_glyph` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (RGB8, alpha dropped) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (RGBA8) |
//!
//! XMP packets are not read; [`ImageMetadata::xmp`] is always `None` here.

use super::backend::{
    BackendError, Dimensions, FontCatalog, ImageBackend, ImageMetadata, SourceImage,
};
use super::calculations::crop_to_fill_rect;
use super::fonts::FontRegistry;
use super::params::{Encoding, FontSpec, RasterMode, ResampleKernel, ResizeParams};
use crate::color::Color;
use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageReader, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, trace};

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Default)]
pub struct RustBackend {
    fonts: FontRegistry,
}

impl RustBackend {
    /// A backend with no fonts; watermarks will fail with
    /// [`FontUnavailable`](crate::ThumbnailError::FontUnavailable).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fonts(fonts: FontRegistry) -> Self {
        Self { fonts }
    }

    /// A backend using the platform's installed fonts.
    pub fn with_system_fonts() -> Self {
        Self::with_fonts(FontRegistry::system())
    }

    fn font(&self, font: &FontSpec) -> Result<Arc<FontVec>, BackendError> {
        self.fonts
            .get(&font.family)
            .ok_or_else(|| BackendError::UnknownFont(font.family.clone()))
    }
}

fn filter_for(kernel: ResampleKernel) -> FilterType {
    match kernel {
        ResampleKernel::Nearest => FilterType::Nearest,
        ResampleKernel::Triangle => FilterType::Triangle,
        ResampleKernel::CatmullRom => FilterType::CatmullRom,
        ResampleKernel::Lanczos3 => FilterType::Lanczos3,
    }
}

/// Read the raw EXIF block and its Orientation tag, if present.
fn read_exif(bytes: &[u8]) -> (Option<Vec<u8>>, Option<u16>) {
    let Ok(exif) = exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) else {
        return (None, None);
    };
    let orientation = exif
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .and_then(|v| u16::try_from(v).ok());
    (Some(exif.buf().to_vec()), orientation)
}

fn decode_error(e: impl std::fmt::Display) -> BackendError {
    BackendError::Decode(e.to_string())
}

/// Porter-Duff "over": `top` scaled by `opacity`, onto `bottom`.
fn blend_pixels(bottom: Rgba<u8>, top: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let top_alpha = (top[3] as f32 / 255.0) * opacity.clamp(0.0, 1.0);
    let bottom_alpha = bottom[3] as f32 / 255.0;

    let out_alpha = top_alpha + bottom_alpha * (1.0 - top_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend = |t: u8, b: u8| -> u8 {
        let t = t as f32 / 255.0;
        let b = b as f32 / 255.0;
        let result = (t * top_alpha + b * bottom_alpha * (1.0 - top_alpha)) / out_alpha;
        (result * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend(top[0], bottom[0]),
        blend(top[1], bottom[1]),
        blend(top[2], bottom[2]),
        (out_alpha * 255.0).round() as u8,
    ])
}

/// Blend one pixel at a signed position, clipping anything off-image.
fn blend_at(image: &mut RgbaImage, x: i64, y: i64, pixel: Rgba<u8>, opacity: f32) {
    if x < 0 || y < 0 || x >= i64::from(image.width()) || y >= i64::from(image.height()) {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    let blended = blend_pixels(*image.get_pixel(x, y), pixel, opacity);
    image.put_pixel(x, y, blended);
}

/// Advance width of `text` with kerning, and the font's line height.
fn text_extent<F: Font>(font: &F, text: &str, size: f32) -> (f32, f32) {
    let scaled = font.as_scaled(PxScale::from(size));

    let mut width = 0.0f32;
    let mut prev_glyph: Option<ab_glyph::GlyphId> = None;
    for c in text.chars() {
        let glyph_id = scaled.glyph_id(c);
        if let Some(prev) = prev_glyph {
            width += scaled.kern(prev, glyph_id);
        }
        width += scaled.h_advance(glyph_id);
        prev_glyph = Some(glyph_id);
    }

    (width, scaled.height())
}

fn png_compression(level: u8) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

impl ImageBackend for RustBackend {
    type Image = RgbaImage;

    fn decode(&self, bytes: &[u8]) -> Result<SourceImage<RgbaImage>, BackendError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(BackendError::Io)?;
        let format = reader.format();
        let mut decoder = reader.into_decoder().map_err(decode_error)?;
        let icc_profile = decoder.icc_profile().ok().flatten();
        let pixels = DynamicImage::from_decoder(decoder)
            .map_err(decode_error)?
            .into_rgba8();

        let (exif, orientation) = read_exif(bytes);
        let dimensions = Dimensions::new(pixels.width(), pixels.height());
        debug!(
            ?format,
            width = dimensions.width,
            height = dimensions.height,
            ?orientation,
            "decoded image"
        );

        Ok(SourceImage {
            pixels,
            dimensions,
            metadata: ImageMetadata {
                orientation,
                exif,
                icc_profile,
                xmp: None,
            },
        })
    }

    fn apply_orientation(&self, image: RgbaImage, orientation: u16) -> RgbaImage {
        match orientation {
            2 => imageops::flip_horizontal(&image),
            3 => imageops::rotate180(&image),
            4 => imageops::flip_vertical(&image),
            5 => imageops::flip_horizontal(&imageops::rotate90(&image)),
            6 => imageops::rotate90(&image),
            7 => imageops::flip_horizontal(&imageops::rotate270(&image)),
            8 => imageops::rotate270(&image),
            _ => image,
        }
    }

    fn dimensions(&self, image: &RgbaImage) -> Dimensions {
        Dimensions::new(image.width(), image.height())
    }

    fn resize(&self, image: RgbaImage, params: &ResizeParams) -> Result<RgbaImage, BackendError> {
        let Dimensions { width, height } = params.scaled;
        if width == 0 || height == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "Cannot resize to {width}x{height}"
            )));
        }

        let resized = if (image.width(), image.height()) == (width, height) {
            image
        } else {
            imageops::resize(&image, width, height, filter_for(params.kernel))
        };

        match params.mode {
            RasterMode::MaxFit => Ok(resized),
            RasterMode::CropToFill => {
                let rect = crop_to_fill_rect(params.anchor, params.scaled, params.bounds);
                if (rect.width, rect.height) == (width, height) {
                    return Ok(resized);
                }
                trace!(?rect, "cropping to fill");
                Ok(imageops::crop_imm(&resized, rect.x, rect.y, rect.width, rect.height).to_image())
            }
        }
    }

    fn canvas(&self, size: Dimensions, fill: Color) -> RgbaImage {
        RgbaImage::from_pixel(size.width, size.height, Rgba(fill.to_array()))
    }

    fn draw_onto(&self, canvas: &mut RgbaImage, source: &RgbaImage, x: i64, y: i64, alpha: f32) {
        for (sx, sy, pixel) in source.enumerate_pixels() {
            blend_at(canvas, x + i64::from(sx), y + i64::from(sy), *pixel, alpha);
        }
    }

    fn fonts(&self) -> &dyn FontCatalog {
        &self.fonts
    }

    fn measure_text(&self, text: &str, font: &FontSpec) -> Result<(f32, f32), BackendError> {
        let face = self.font(font)?;
        Ok(text_extent(face.as_ref(), text, font.size))
    }

    fn draw_text(
        &self,
        image: &mut RgbaImage,
        text: &str,
        font: &FontSpec,
        color: Color,
        x: f32,
        y: f32,
    ) -> Result<(), BackendError> {
        let face = self.font(font)?;
        let scale = PxScale::from(font.size);
        let scaled = face.as_scaled(scale);
        let pixel = Rgba(color.to_array());

        let baseline_y = y + scaled.ascent();
        let mut cursor_x = x;
        let mut prev_glyph: Option<ab_glyph::GlyphId> = None;

        for c in text.chars() {
            let glyph_id = scaled.glyph_id(c);
            if let Some(prev) = prev_glyph {
                cursor_x += scaled.kern(prev, glyph_id);
            }

            let glyph = glyph_id.with_scale_and_position(scale, ab_glyph::point(cursor_x, baseline_y));
            if let Some(outlined) = face.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|px, py, coverage| {
                    let gx = i64::from(px) + bounds.min.x as i64;
                    let gy = i64::from(py) + bounds.min.y as i64;
                    blend_at(image, gx, gy, pixel, coverage);
                });
            }

            cursor_x += scaled.h_advance(glyph_id);
            prev_glyph = Some(glyph_id);
        }
        Ok(())
    }

    fn encode(&self, image: &RgbaImage, encoding: Encoding) -> Result<Vec<u8>, BackendError> {
        let (width, height) = image.dimensions();
        let mut buf = Vec::new();

        match encoding {
            Encoding::Jpeg { quality } => {
                let rgb = DynamicImage::ImageRgba8(image.clone()).into_rgb8();
                // Quality is clamped to 1..=100 on construction
                JpegEncoder::new_with_quality(&mut buf, quality.value() as u8)
                    .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                    .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {e}")))?;
            }
            Encoding::Png { compression } => {
                PngEncoder::new_with_quality(&mut buf, png_compression(compression), PngFilter::Adaptive)
                    .write_image(image.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(|e| BackendError::ProcessingFailed(format!("PNG encode failed: {e}")))?;
            }
        }

        debug!(width, height, ?encoding, bytes = buf.len(), "encoded image");
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Anchor;
    use crate::imaging::params::Quality;
    use image::{ImageFormat, Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        })
    }

    fn png_bytes(image: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
        let mut buf = Vec::new();
        JpegEncoder::new(&mut buf)
            .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
            .unwrap();
        buf
    }

    fn params(scaled: (u32, u32), bounds: (u32, u32), mode: RasterMode, anchor: Anchor) -> ResizeParams {
        ResizeParams {
            scaled: Dimensions::new(scaled.0, scaled.1),
            bounds: Dimensions::new(bounds.0, bounds.1),
            mode,
            anchor,
            kernel: ResampleKernel::Lanczos3,
        }
    }

    // =========================================================================
    // decode
    // =========================================================================

    #[test]
    fn decode_synthetic_png() {
        let backend = RustBackend::new();
        let source = backend.decode(&png_bytes(&gradient(200, 150))).unwrap();
        assert_eq!(source.dimensions, Dimensions::new(200, 150));
        assert_eq!(source.metadata.orientation, None);
        assert_eq!(source.metadata.xmp, None);
    }

    #[test]
    fn decode_synthetic_jpeg() {
        let backend = RustBackend::new();
        let source = backend.decode(&jpeg_bytes(64, 32)).unwrap();
        assert_eq!(source.dimensions, Dimensions::new(64, 32));
    }

    #[test]
    fn decode_garbage_is_a_decode_error() {
        let backend = RustBackend::new();
        let result = backend.decode(b"definitely not an image");
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[test]
    fn decode_empty_input_errors() {
        let backend = RustBackend::new();
        assert!(backend.decode(&[]).is_err());
    }

    #[test]
    fn decode_truncated_png_errors() {
        let backend = RustBackend::new();
        let bytes = png_bytes(&gradient(50, 50));
        assert!(backend.decode(&bytes[..bytes.len() / 2]).is_err());
    }

    // =========================================================================
    // orientation
    // =========================================================================

    #[test]
    fn orientation_swaps_axes_for_5_to_8() {
        let backend = RustBackend::new();
        for orientation in 1..=8u16 {
            let out = backend.apply_orientation(gradient(10, 20), orientation);
            let expected = if orientation >= 5 { (20, 10) } else { (10, 20) };
            assert_eq!(out.dimensions(), expected, "orientation {orientation}");
        }
    }

    #[test]
    fn orientation_6_rotates_clockwise() {
        let backend = RustBackend::new();
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));

        // Left pixel of a 2x1 row ends up on top after a quarter turn clockwise.
        let out = backend.apply_orientation(img, 6);
        assert_eq!(out.dimensions(), (1, 2));
        assert_eq!(out.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn orientation_2_mirrors() {
        let backend = RustBackend::new();
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let out = backend.apply_orientation(img, 2);
        assert_eq!(out.get_pixel(1, 0), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn unknown_orientation_is_identity() {
        let backend = RustBackend::new();
        let img = gradient(7, 3);
        assert_eq!(backend.apply_orientation(img.clone(), 0), img);
        assert_eq!(backend.apply_orientation(img.clone(), 9), img);
    }

    // =========================================================================
    // resize
    // =========================================================================

    #[test]
    fn max_fit_resizes_exactly() {
        let backend = RustBackend::new();
        let out = backend
            .resize(gradient(400, 300), &params((100, 75), (100, 100), RasterMode::MaxFit, Anchor::Center))
            .unwrap();
        assert_eq!(out.dimensions(), (100, 75));
    }

    #[test]
    fn crop_to_fill_trims_overflow() {
        let backend = RustBackend::new();
        let out = backend
            .resize(
                gradient(400, 300),
                &params((133, 100), (100, 100), RasterMode::CropToFill, Anchor::Center),
            )
            .unwrap();
        assert_eq!(out.dimensions(), (100, 100));
    }

    #[test]
    fn crop_to_fill_keeps_anchored_side() {
        let backend = RustBackend::new();
        let mut img = RgbaImage::from_pixel(4, 2, Rgba([0, 0, 255, 255]));
        for y in 0..2 {
            img.put_pixel(0, y, Rgba([255, 0, 0, 255]));
            img.put_pixel(1, y, Rgba([255, 0, 0, 255]));
        }
        let p = ResizeParams {
            kernel: ResampleKernel::Nearest,
            ..params((4, 2), (2, 2), RasterMode::CropToFill, Anchor::Left)
        };
        let out = backend.resize(img.clone(), &p).unwrap();
        assert_eq!(out.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));

        let p = ResizeParams {
            anchor: Anchor::Right,
            ..p
        };
        let out = backend.resize(img, &p).unwrap();
        assert_eq!(out.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn resize_to_zero_is_rejected() {
        let backend = RustBackend::new();
        let result = backend.resize(gradient(4, 4), &params((0, 4), (4, 4), RasterMode::MaxFit, Anchor::Center));
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
    }

    // =========================================================================
    // canvas / draw_onto
    // =========================================================================

    #[test]
    fn canvas_is_filled() {
        let backend = RustBackend::new();
        let canvas = backend.canvas(Dimensions::new(3, 2), Color::rgb(1, 2, 3));
        assert_eq!(canvas.dimensions(), (3, 2));
        assert!(canvas.pixels().all(|p| *p == Rgba([1, 2, 3, 255])));
    }

    #[test]
    fn draw_onto_places_opaque_source() {
        let backend = RustBackend::new();
        let mut canvas = backend.canvas(Dimensions::new(10, 10), Color::WHITE);
        let red = RgbaImage::from_pixel(4, 2, Rgba([255, 0, 0, 255]));

        backend.draw_onto(&mut canvas, &red, 3, 4, 1.0);

        assert_eq!(canvas.get_pixel(3, 4), &Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(6, 5), &Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(2, 4), &Rgba([255, 255, 255, 255]));
        assert_eq!(canvas.get_pixel(7, 4), &Rgba([255, 255, 255, 255]));
        assert_eq!(canvas.get_pixel(3, 6), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn draw_onto_clips_negative_offsets() {
        let backend = RustBackend::new();
        let mut canvas = backend.canvas(Dimensions::new(4, 4), Color::WHITE);
        let black = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));

        backend.draw_onto(&mut canvas, &black, -2, -2, 1.0);

        assert_eq!(canvas.get_pixel(1, 1), &Rgba([0, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(2, 2), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn blend_over_transparent_keeps_source() {
        let out = blend_pixels(Rgba([0, 0, 0, 0]), Rgba([10, 20, 30, 255]), 1.0);
        assert_eq!(out, Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn blend_half_opacity_mixes() {
        let out = blend_pixels(Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 255]), 0.5);
        assert_eq!(out[3], 255);
        assert!((126..=129).contains(&out[0]), "{out:?}");
    }

    #[test]
    fn blend_zero_opacity_is_noop() {
        let bg = Rgba([9, 8, 7, 255]);
        assert_eq!(blend_pixels(bg, Rgba([255, 0, 0, 255]), 0.0), bg);
    }

    // =========================================================================
    // text
    // =========================================================================

    #[test]
    fn text_without_fonts_is_unknown_font() {
        let backend = RustBackend::new();
        let font = FontSpec {
            family: "Arial".into(),
            size: 16.0,
        };
        assert!(matches!(
            backend.measure_text("hi", &font),
            Err(BackendError::UnknownFont(f)) if f == "Arial"
        ));
        let mut img = gradient(10, 10);
        assert!(backend
            .draw_text(&mut img, "hi", &font, Color::WHITE, 0.0, 0.0)
            .is_err());
    }

    #[test]
    #[ignore] // Requires an installed TrueType font
    fn text_with_a_system_font_draws_pixels() {
        let backend = RustBackend::with_system_fonts();
        let family = backend
            .fonts()
            .families()
            .into_iter()
            .next()
            .expect("no fonts found in the system font directories");
        let font = FontSpec { family, size: 24.0 };

        let (w, h) = backend.measure_text("Hello", &font).unwrap();
        assert!(w > 0.0 && h > 0.0);

        let mut img = backend.canvas(Dimensions::new(200, 60), Color::BLACK);
        backend
            .draw_text(&mut img, "Hello", &font, Color::WHITE, 10.0, 10.0)
            .unwrap();
        assert!(img.pixels().any(|p| p[0] > 0));
    }

    // =========================================================================
    // encode
    // =========================================================================

    #[test]
    fn encode_png_roundtrips_pixels() {
        let backend = RustBackend::new();
        let img = gradient(20, 10);
        let bytes = backend.encode(&img, Encoding::Png { compression: 9 }).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = backend.decode(&bytes).unwrap();
        assert_eq!(decoded.pixels, img);
    }

    #[test]
    fn encode_jpeg_has_soi_marker() {
        let backend = RustBackend::new();
        let bytes = backend
            .encode(&gradient(20, 10), Encoding::Jpeg { quality: Quality::new(90) })
            .unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(backend.decode(&bytes).unwrap().dimensions, Dimensions::new(20, 10));
    }

    #[test]
    fn encode_output_carries_no_exif() {
        let backend = RustBackend::new();
        let bytes = backend
            .encode(&gradient(8, 8), Encoding::Jpeg { quality: Quality::default() })
            .unwrap();
        let decoded = backend.decode(&bytes).unwrap();
        assert_eq!(decoded.metadata.exif, None);
        assert_eq!(decoded.metadata.orientation, None);
    }

    #[test]
    fn png_compression_levels() {
        assert!(matches!(png_compression(0), CompressionType::Fast));
        assert!(matches!(png_compression(6), CompressionType::Default));
        assert!(matches!(png_compression(9), CompressionType::Best));
    }
}
