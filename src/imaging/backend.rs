//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the boundary between thumbnail logic and
//! pixel work. Everything behind it (decoding, orientation transforms,
//! resampling, compositing, text rendering, encoding) is a primitive the
//! pipeline invokes in order; nothing behind it makes sizing decisions.
//!
//! | Primitive | Method |
//! |---|---|
//! | Decode bytes, read orientation + profiles | [`decode`](ImageBackend::decode) |
//! | Apply an EXIF orientation | [`apply_orientation`](ImageBackend::apply_orientation) |
//! | Resample (+ crop-to-fill) | [`resize`](ImageBackend::resize) |
//! | Allocate a filled canvas | [`canvas`](ImageBackend::canvas) |
//! | Composite one image onto another | [`draw_onto`](ImageBackend::draw_onto) |
//! | Measure / draw text | [`measure_text`](ImageBackend::measure_text), [`draw_text`](ImageBackend::draw_text) |
//! | Encode | [`encode`](ImageBackend::encode) |
//! | Font registry lookups | [`fonts`](ImageBackend::fonts) |
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`,
//! `kamadak-exif` and `ab_glyph` crates.

use crate::color::Color;
use serde::Serialize;
use thiserror::Error;

use super::params::{Encoding, FontSpec, ResizeParams};

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported or corrupt image: {0}")]
    Decode(String),
    #[error("Unknown font family: {0}")]
    UnknownFont(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Metadata carried alongside decoded pixels.
///
/// `orientation` is the EXIF Orientation tag (1–8). The raw profiles are kept
/// only so they can be dropped deliberately by the strip step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    pub orientation: Option<u16>,
    pub exif: Option<Vec<u8>>,
    pub icc_profile: Option<Vec<u8>>,
    pub xmp: Option<Vec<u8>>,
}

impl ImageMetadata {
    pub fn clear_orientation(&mut self) {
        self.orientation = None;
    }

    /// Drop EXIF, ICC and XMP. The orientation tag lives in EXIF and goes too.
    pub fn strip(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A decoded image, owned by the pipeline for the length of one call.
#[derive(Debug, Clone)]
pub struct SourceImage<I> {
    pub pixels: I,
    pub dimensions: Dimensions,
    pub metadata: ImageMetadata,
}

/// Read-only view of the fonts a backend can render with.
///
/// Lookups must be safe to run concurrently.
pub trait FontCatalog: Sync {
    /// Whether `family` can be used as-is.
    fn contains(&self, family: &str) -> bool;

    /// All known families, in a stable order.
    fn families(&self) -> Vec<String>;
}

/// Trait for image processing backends.
///
/// Every backend implements all primitives so the pipeline stays
/// backend-agnostic. See the [module docs](self) for the mapping.
pub trait ImageBackend: Sync {
    /// In-memory pixel buffer type.
    type Image;

    /// Decode encoded bytes, sniffing the format.
    fn decode(&self, bytes: &[u8]) -> Result<SourceImage<Self::Image>, BackendError>;

    /// Rotate/flip pixels so an image tagged with `orientation` becomes upright.
    fn apply_orientation(&self, image: Self::Image, orientation: u16) -> Self::Image;

    fn dimensions(&self, image: &Self::Image) -> Dimensions;

    /// Resample to `params.scaled`; for crop-to-fill, then keep the anchored
    /// part that fits in `params.bounds`.
    fn resize(&self, image: Self::Image, params: &ResizeParams) -> Result<Self::Image, BackendError>;

    /// A new image of `size` filled with `fill`.
    fn canvas(&self, size: Dimensions, fill: Color) -> Self::Image;

    /// Composite `source` onto `canvas` with its top-left corner at `(x, y)`.
    /// Parts falling outside the canvas are clipped.
    fn draw_onto(&self, canvas: &mut Self::Image, source: &Self::Image, x: i64, y: i64, alpha: f32);

    fn fonts(&self) -> &dyn FontCatalog;

    /// Size of the text's bounding box in pixels.
    fn measure_text(&self, text: &str, font: &FontSpec) -> Result<(f32, f32), BackendError>;

    /// Draw `text` with its bounding box's top-left corner at `(x, y)`.
    fn draw_text(
        &self,
        image: &mut Self::Image,
        text: &str,
        font: &FontSpec,
        color: Color,
        x: f32,
        y: f32,
    ) -> Result<(), BackendError>;

    /// Encode pixels only; no metadata is written.
    fn encode(&self, image: &Self::Image, encoding: Encoding) -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::params::{RasterMode, ResampleKernel};
    use crate::config::Anchor;
    use std::sync::Mutex;

    /// Stand-in pixel buffer: just a size.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MockImage {
        pub width: u32,
        pub height: u32,
    }

    /// Mock backend that records operations without executing them.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    #[derive(Default)]
    pub struct MockBackend {
        pub decode_result: Option<SourceImage<MockImage>>,
        pub font_families: Vec<String>,
        /// Reported by `measure_text` for any input.
        pub text_size: (f32, f32),
        pub fail_encode: bool,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Decode(usize),
        ApplyOrientation(u16),
        Resize {
            width: u32,
            height: u32,
            mode: RasterMode,
        },
        Canvas {
            width: u32,
            height: u32,
            fill: Color,
        },
        DrawOnto {
            x: i64,
            y: i64,
            alpha: f32,
        },
        MeasureText(String),
        DrawText {
            text: String,
            family: String,
            color: Color,
            x: f32,
            y: f32,
        },
        Encode {
            width: u32,
            height: u32,
            encoding: Encoding,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// A backend whose decode yields a `width`x`height` image.
        pub fn with_source(width: u32, height: u32) -> Self {
            Self::with_metadata(width, height, ImageMetadata::default())
        }

        pub fn with_metadata(width: u32, height: u32, metadata: ImageMetadata) -> Self {
            Self {
                decode_result: Some(SourceImage {
                    pixels: MockImage { width, height },
                    dimensions: Dimensions::new(width, height),
                    metadata,
                }),
                font_families: vec!["Arial".to_string()],
                text_size: (40.0, 10.0),
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        fn record(&self, op: RecordedOp) {
            self.operations.lock().unwrap().push(op);
        }
    }

    impl FontCatalog for MockBackend {
        fn contains(&self, family: &str) -> bool {
            self.font_families.iter().any(|f| f == family)
        }

        fn families(&self) -> Vec<String> {
            self.font_families.clone()
        }
    }

    impl ImageBackend for MockBackend {
        type Image = MockImage;

        fn decode(&self, bytes: &[u8]) -> Result<SourceImage<MockImage>, BackendError> {
            self.record(RecordedOp::Decode(bytes.len()));
            self.decode_result
                .clone()
                .ok_or_else(|| BackendError::Decode("No mock source".to_string()))
        }

        fn apply_orientation(&self, image: MockImage, orientation: u16) -> MockImage {
            self.record(RecordedOp::ApplyOrientation(orientation));
            if (5..=8).contains(&orientation) {
                MockImage {
                    width: image.height,
                    height: image.width,
                }
            } else {
                image
            }
        }

        fn dimensions(&self, image: &MockImage) -> Dimensions {
            Dimensions::new(image.width, image.height)
        }

        fn resize(&self, _image: MockImage, params: &ResizeParams) -> Result<MockImage, BackendError> {
            self.record(RecordedOp::Resize {
                width: params.scaled.width,
                height: params.scaled.height,
                mode: params.mode,
            });
            let (width, height) = match params.mode {
                RasterMode::MaxFit => (params.scaled.width, params.scaled.height),
                RasterMode::CropToFill => (
                    params.scaled.width.min(params.bounds.width),
                    params.scaled.height.min(params.bounds.height),
                ),
            };
            Ok(MockImage { width, height })
        }

        fn canvas(&self, size: Dimensions, fill: Color) -> MockImage {
            self.record(RecordedOp::Canvas {
                width: size.width,
                height: size.height,
                fill,
            });
            MockImage {
                width: size.width,
                height: size.height,
            }
        }

        fn draw_onto(&self, _canvas: &mut MockImage, _source: &MockImage, x: i64, y: i64, alpha: f32) {
            self.record(RecordedOp::DrawOnto { x, y, alpha });
        }

        fn fonts(&self) -> &dyn FontCatalog {
            self
        }

        fn measure_text(&self, text: &str, _font: &FontSpec) -> Result<(f32, f32), BackendError> {
            self.record(RecordedOp::MeasureText(text.to_string()));
            Ok(self.text_size)
        }

        fn draw_text(
            &self,
            _image: &mut MockImage,
            text: &str,
            font: &FontSpec,
            color: Color,
            x: f32,
            y: f32,
        ) -> Result<(), BackendError> {
            self.record(RecordedOp::DrawText {
                text: text.to_string(),
                family: font.family.clone(),
                color,
                x,
                y,
            });
            Ok(())
        }

        fn encode(&self, image: &MockImage, encoding: Encoding) -> Result<Vec<u8>, BackendError> {
            self.record(RecordedOp::Encode {
                width: image.width,
                height: image.height,
                encoding,
            });
            if self.fail_encode {
                return Err(BackendError::ProcessingFailed("mock encode failure".into()));
            }
            Ok(format!("{}x{}", image.width, image.height).into_bytes())
        }
    }

    #[test]
    fn mock_records_decode() {
        let backend = MockBackend::with_source(800, 600);

        let source = backend.decode(b"abc").unwrap();
        assert_eq!(source.dimensions, Dimensions::new(800, 600));

        let ops = backend.get_operations();
        assert_eq!(ops, vec![RecordedOp::Decode(3)]);
    }

    #[test]
    fn mock_without_source_fails_decode() {
        let backend = MockBackend::new();
        assert!(matches!(backend.decode(b""), Err(BackendError::Decode(_))));
    }

    #[test]
    fn mock_records_resize() {
        let backend = MockBackend::new();

        let out = backend
            .resize(
                MockImage {
                    width: 400,
                    height: 300,
                },
                &ResizeParams {
                    scaled: Dimensions::new(133, 100),
                    bounds: Dimensions::new(100, 100),
                    mode: RasterMode::CropToFill,
                    anchor: Anchor::Center,
                    kernel: ResampleKernel::Lanczos3,
                },
            )
            .unwrap();
        assert_eq!((out.width, out.height), (100, 100));

        let ops = backend.get_operations();
        assert!(matches!(
            &ops[0],
            RecordedOp::Resize {
                width: 133,
                height: 100,
                mode: RasterMode::CropToFill,
            }
        ));
    }

    #[test]
    fn metadata_strip_clears_everything() {
        let mut meta = ImageMetadata {
            orientation: Some(6),
            exif: Some(vec![1]),
            icc_profile: Some(vec![2]),
            xmp: Some(vec![3]),
        };
        meta.clear_orientation();
        assert_eq!(meta.orientation, None);
        assert!(!meta.is_empty());
        meta.strip();
        assert!(meta.is_empty());
    }
}
