//! Pure calculation functions for thumbnail geometry.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! ## Scale factor by mode
//!
//! With `rw = target_width / src_width` and `rh = target_height / src_height`:
//!
//! | Mode | Scale | Raster mode |
//! |---|---|---|
//! | Fit | `min(rw, rh)` | MaxFit |
//! | Cover | `max(rw, rh)` | CropToFill |
//! | Contain | `min(1, rw, rh)` | MaxFit |
//! | Pad | `min(rw, rh)` | MaxFit |
//! | Crop | `min(rw, rh)` | CropToFill |
//!
//! `prevent_upscale` clamps the scale to 1.0 in every mode.
//!
//! ## Rounding
//!
//! Scaled dimensions are rounded half to even (`2.5 → 2`, `3.5 → 4`) and then
//! raised to at least 1 pixel. Fixtures depend on this; do not switch to
//! `f64::round`.

use crate::config::{Align, Anchor, ResizeMode, ThumbnailConfig};
use num_traits::Num;
use serde::Serialize;
use tracing::trace;

use super::backend::Dimensions;
use super::params::{RasterMode, ResampleKernel, ResizeParams};

/// Scale factor applied to both source axes.
///
/// Source dimensions must be positive.
pub fn compute_scale(src_w: u32, src_h: u32, config: &ThumbnailConfig) -> f64 {
    let rw = config.target_width as f64 / src_w as f64;
    let rh = config.target_height as f64 / src_h as f64;

    let scale = match config.mode {
        ResizeMode::Fit | ResizeMode::Pad | ResizeMode::Crop => rw.min(rh),
        ResizeMode::Cover => rw.max(rh),
        ResizeMode::Contain => rw.min(rh).min(1.0),
    };

    if config.prevent_upscale {
        scale.min(1.0)
    } else {
        scale
    }
}

/// Destination size of the resampled source.
///
/// Both returned dimensions are at least 1, even when the scale collapses
/// towards zero.
///
/// # Examples
/// ```
/// # use thumbforge::config::{ResizeMode, ThumbnailConfig};
/// # use thumbforge::imaging::compute_target_size;
/// let fit = ThumbnailConfig::new(100, 100);
/// assert_eq!(compute_target_size(400, 300, &fit), (100, 75));
///
/// let cover = ThumbnailConfig { mode: ResizeMode::Cover, ..fit };
/// assert_eq!(compute_target_size(400, 300, &cover), (133, 100));
/// ```
pub fn compute_target_size(src_w: u32, src_h: u32, config: &ThumbnailConfig) -> (u32, u32) {
    let scale = compute_scale(src_w, src_h, config);
    let size = (scale_dimension(src_w, scale), scale_dimension(src_h, scale));
    trace!(
        src_w,
        src_h,
        scale,
        dest_w = size.0,
        dest_h = size.1,
        mode = %config.mode,
        "computed target size"
    );
    size
}

fn scale_dimension(len: u32, scale: f64) -> u32 {
    ((len as f64 * scale).round_ties_even() as u32).max(1)
}

/// Collapse the five resize modes into the two raster strategies.
pub fn resolve_raster_mode(mode: ResizeMode) -> RasterMode {
    match mode {
        ResizeMode::Fit | ResizeMode::Contain | ResizeMode::Pad => RasterMode::MaxFit,
        ResizeMode::Cover | ResizeMode::Crop => RasterMode::CropToFill,
    }
}

/// Offset of an inner rectangle placed inside an outer one at `anchor`.
///
/// Shared by pad compositing (integer types, truncating division), crop
/// rectangles, and watermark placement (`f32`). If the inner rectangle is
/// larger than the outer one on an axis, the offset on that axis is negative
/// and is returned as-is.
///
/// # Examples
/// ```
/// # use thumbforge::config::Anchor;
/// # use thumbforge::imaging::resolve_anchor_offset;
/// assert_eq!(resolve_anchor_offset(Anchor::Center, 100, 100, 40, 40), (30, 30));
/// assert_eq!(resolve_anchor_offset(Anchor::BottomRight, 100, 100, 40, 40), (60, 60));
/// assert_eq!(resolve_anchor_offset(Anchor::Top, 10.0, 10.0, 5.0, 5.0), (2.5, 0.0));
/// ```
pub fn resolve_anchor_offset<T>(anchor: Anchor, outer_w: T, outer_h: T, inner_w: T, inner_h: T) -> (T, T)
where
    T: Num + Copy,
{
    (
        align_offset(anchor.horizontal(), outer_w, inner_w),
        align_offset(anchor.vertical(), outer_h, inner_h),
    )
}

fn align_offset<T: Num + Copy>(align: Align, outer: T, inner: T) -> T {
    match align {
        Align::Start => T::zero(),
        Align::Center => (outer - inner) / (T::one() + T::one()),
        Align::End => outer - inner,
    }
}

/// A rectangle inside an image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The part of a scaled image kept by [`RasterMode::CropToFill`].
///
/// Each axis is cut down to the box where it overflows and left alone where
/// it already fits; the anchor decides which part survives.
pub fn crop_to_fill_rect(anchor: Anchor, scaled: Dimensions, bounds: Dimensions) -> CropRect {
    let width = scaled.width.min(bounds.width);
    let height = scaled.height.min(bounds.height);
    let (x, y) = resolve_anchor_offset(
        anchor,
        i64::from(scaled.width),
        i64::from(scaled.height),
        i64::from(width),
        i64::from(height),
    );
    // inner <= outer on both axes, so the offsets are never negative
    CropRect {
        x: x as u32,
        y: y as u32,
        width,
        height,
    }
}

/// Where a resized image lands on a target-sized canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CanvasPlacement {
    pub size: Dimensions,
    pub x: i64,
    pub y: i64,
}

/// Offset of `content` centered (or anchored) on a canvas of `canvas` size.
pub fn canvas_placement(anchor: Anchor, canvas: Dimensions, content: Dimensions) -> CanvasPlacement {
    let (x, y) = resolve_anchor_offset(
        anchor,
        i64::from(canvas.width),
        i64::from(canvas.height),
        i64::from(content.width),
        i64::from(content.height),
    );
    CanvasPlacement { size: canvas, x, y }
}

/// Every geometric decision for one thumbnail, without touching pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResizePlan {
    pub source: Dimensions,
    pub scale: f64,
    /// Size the source is resampled to.
    pub scaled: Dimensions,
    pub raster_mode: RasterMode,
    /// Present for crop-to-fill when the scaled image overflows the box.
    pub crop: Option<CropRect>,
    /// Size after the resize primitive (scaled, then cropped).
    pub resized: Dimensions,
    /// Present when the result is composited onto a canvas.
    pub canvas: Option<CanvasPlacement>,
}

impl ResizePlan {
    /// Final encoded size.
    pub fn output(&self) -> Dimensions {
        self.canvas.map(|c| c.size).unwrap_or(self.resized)
    }

    pub fn resize_params(&self, bounds: Dimensions, anchor: Anchor) -> ResizeParams {
        ResizeParams {
            scaled: self.scaled,
            bounds,
            mode: self.raster_mode,
            anchor,
            kernel: ResampleKernel::Lanczos3,
        }
    }
}

/// Plan a thumbnail without executing it.
pub fn plan_resize(source: Dimensions, config: &ThumbnailConfig) -> ResizePlan {
    let scale = compute_scale(source.width, source.height, config);
    let (dest_w, dest_h) = compute_target_size(source.width, source.height, config);
    let scaled = Dimensions::new(dest_w, dest_h);
    let bounds = Dimensions::new(config.target_width, config.target_height);
    let raster_mode = resolve_raster_mode(config.mode);

    let crop = match raster_mode {
        RasterMode::CropToFill => Some(crop_to_fill_rect(config.anchor, scaled, bounds))
            .filter(|rect| rect.width != scaled.width || rect.height != scaled.height),
        RasterMode::MaxFit => None,
    };
    let resized = crop
        .map(|rect| Dimensions::new(rect.width, rect.height))
        .unwrap_or(scaled);
    let canvas = config
        .uses_canvas()
        .then(|| canvas_placement(config.anchor, bounds, resized));

    ResizePlan {
        source,
        scale,
        scaled,
        raster_mode,
        crop,
        resized,
        canvas,
    }
}
