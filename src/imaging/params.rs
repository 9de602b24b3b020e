//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`operations`](super::operations) module (which
//! decides what to do with an image) and the [`backend`](super::backend)
//! (which does the actual pixel work). This separation allows swapping
//! backends (e.g. for testing with a mock) without changing operation logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 85). Clamped on construction.
//! - [`RasterMode`]: The two mechanical resize strategies the five resize modes collapse into.
//! - [`ResampleKernel`]: Resampling filter handed to the resize primitive.
//! - [`ResizeParams`]: Everything one resize needs: scaled size, bounding box, strategy, anchor.
//! - [`Encoding`]: Resolved output codec and its quality knob.
//! - [`FontSpec`]: Resolved font family and pixel size for text primitives.

use crate::config::Anchor;
use serde::{Deserialize, Serialize};

use super::backend::Dimensions;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

/// Mechanical resize strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RasterMode {
    /// Resize to fit within the box, preserving aspect; never crops.
    MaxFit,
    /// Resize, then crop to the part of the result that lies inside the box.
    CropToFill,
}

/// Resampling filter. The pipeline always uses [`ResampleKernel::Lanczos3`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleKernel {
    Nearest,
    Triangle,
    CatmullRom,
    #[default]
    Lanczos3,
}

/// Parameters for the resize primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeParams {
    /// Size the whole source is resampled to.
    pub scaled: Dimensions,
    /// Target box. Only consulted by [`RasterMode::CropToFill`].
    pub bounds: Dimensions,
    pub mode: RasterMode,
    /// Which part of an oversized scaled image survives the crop.
    pub anchor: Anchor,
    pub kernel: ResampleKernel,
}

/// Output codec with its quality setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Jpeg { quality: Quality },
    /// Lossless; `compression` is 0 (fastest) to 9 (smallest).
    Png { compression: u8 },
}

impl Encoding {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "jpg",
            Self::Png { .. } => "png",
        }
    }
}

/// A resolved font: a family known to the font catalog, at a pixel size.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub family: String,
    pub size: f32,
}
