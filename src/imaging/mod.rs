//! Thumbnail imaging: geometry plus a backend-driven pixel pipeline.
//!
//! | Step | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (format sniffed) |
//! | **Orient** | EXIF tag via `kamadak-exif`, `imageops` rotate/flip |
//! | **Resize** | Lanczos3 + anchored crop-to-fill |
//! | **Canvas** | filled `RgbaImage` + "over" compositing |
//! | **Watermark** | `ab_glyph` outlines, fonts from [`FontRegistry`] |
//! | **Encode** | JPEG / PNG, no metadata written |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Watermark**: Placement and font fallback
//! - **Operations**: The pipeline, combining calculations + backend

pub mod backend;
mod calculations;
pub mod fonts;
pub mod operations;
mod params;
pub mod rust_backend;
pub mod watermark;

pub use backend::{
    BackendError, Dimensions, FontCatalog, ImageBackend, ImageMetadata, SourceImage,
};
pub use calculations::{
    CanvasPlacement, CropRect, ResizePlan, canvas_placement, compute_scale, compute_target_size,
    crop_to_fill_rect, plan_resize, resolve_anchor_offset, resolve_raster_mode,
};
pub use fonts::FontRegistry;
pub use operations::{
    CancellationToken, make_thumbnail, make_thumbnail_with_cancel, make_thumbnails,
    plan_thumbnail, write_thumbnail,
};
pub use params::{Encoding, FontSpec, Quality, RasterMode, ResampleKernel, ResizeParams};
pub use rust_backend::RustBackend;
pub use watermark::{FALLBACK_FAMILIES, place_watermark, resolve_font_family};
