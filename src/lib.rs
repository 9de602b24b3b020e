//! # Thumbforge
//!
//! Thumbnail geometry and a small, backend-agnostic pipeline that turns
//! encoded image bytes into an encoded preview:
//!
//! ```text
//! decode → orient → strip metadata → resize (+crop) → canvas / watermark → encode
//! ```
//!
//! The library has no filesystem or network surface of its own: callers hand
//! in bytes and get bytes (or a filled `Write` sink) back.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `ThumbnailConfig`, resize modes, anchors, watermark and output settings, TOML loading |
//! | [`color`] | `RRGGBB` / `AARRGGBB` colour literals |
//! | [`imaging`] | Scale/offset math, the [`ImageBackend`] trait, [`RustBackend`], the pipeline |
//! | [`error`] | [`ThumbnailError`], the pipeline's error taxonomy |
//!
//! # Resize Modes
//!
//! | Mode | Scale | Result |
//! |------|-------|--------|
//! | `fit` | `min(rw, rh)` | Inside the box, aspect kept |
//! | `cover` | `max(rw, rh)` | Box filled, overflow cropped at the anchor |
//! | `contain` | `min(1, rw, rh)` | Like `fit`, never enlarged |
//! | `pad` | `min(rw, rh)` | Exactly the box; letterboxed on a background |
//! | `crop` | `min(rw, rh)` | Like `fit`, cropped at the anchor if it overflows |
//!
//! # Design Decisions
//!
//! ## Geometry Is Pure
//!
//! Every sizing and placement decision lives in
//! [`imaging::plan_resize`] and friends, which never touch pixels. The
//! backend executes primitives and decides nothing, so the whole pipeline can
//! be tested against a recording mock.
//!
//! ## Canvas Output Skips the Watermark
//!
//! When the result is composited onto a canvas (`pad` mode, or any mode with
//! a background), the watermark is not drawn unless
//! [`ThumbnailConfig::watermark_canvas`] is set.
//!
//! # Example
//!
//! ```no_run
//! use thumbforge::{RustBackend, ThumbnailConfig, config::ResizeMode, make_thumbnail};
//!
//! let input = std::fs::read("photo.jpg")?;
//! let config = ThumbnailConfig {
//!     mode: ResizeMode::Cover,
//!     ..ThumbnailConfig::new(320, 240)
//! };
//! let jpeg = make_thumbnail(&RustBackend::with_system_fonts(), &input, &config)?;
//! std::fs::write("photo-thumb.jpg", jpeg)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod color;
pub mod config;
pub mod error;
pub mod imaging;

pub use color::Color;
pub use config::ThumbnailConfig;
pub use error::{Result, ThumbnailError};
pub use imaging::{
    CancellationToken, ImageBackend, RustBackend, make_thumbnail, make_thumbnails, write_thumbnail,
};
