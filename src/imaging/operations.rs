//! High-level thumbnail operations.
//!
//! These functions combine calculations with backend execution. They take
//! configuration, compute a [`ResizePlan`], and drive the backend through
//! decode → orient → strip → resize → canvas/watermark → encode.
//!
//! Output bytes are only produced once every step succeeded; any failure or
//! cancellation drops the intermediate buffers and returns an error.

use super::backend::{BackendError, Dimensions, ImageBackend, SourceImage};
use super::calculations::{ResizePlan, canvas_placement, plan_resize};
use super::watermark::apply_watermark;
use crate::color::Color;
use crate::config::ThumbnailConfig;
use crate::error::{Result, ThumbnailError};
use rayon::prelude::*;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Cooperative cancellation flag shared between a caller and running
/// pipelines. Checked between pipeline steps, never inside a primitive.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once [`cancel`](Self::cancel) has been called.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ThumbnailError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Plan a thumbnail for a source of known size without touching pixels.
///
/// Useful for inspecting what [`make_thumbnail`] will do.
pub fn plan_thumbnail(source: Dimensions, config: &ThumbnailConfig) -> Result<ResizePlan> {
    config.validate()?;
    Ok(plan_resize(source, config))
}

/// Produce an encoded thumbnail from encoded source bytes.
pub fn make_thumbnail<B: ImageBackend>(
    backend: &B,
    input: &[u8],
    config: &ThumbnailConfig,
) -> Result<Vec<u8>> {
    make_thumbnail_with_cancel(backend, input, config, &CancellationToken::new())
}

/// [`make_thumbnail`] with a cancellation token checked between steps.
pub fn make_thumbnail_with_cancel<B: ImageBackend>(
    backend: &B,
    input: &[u8],
    config: &ThumbnailConfig,
    cancel: &CancellationToken,
) -> Result<Vec<u8>> {
    config.validate()?;
    cancel.check()?;

    let SourceImage {
        mut pixels,
        dimensions,
        mut metadata,
    } = backend.decode(input).map_err(|e| match e {
        BackendError::Decode(msg) => ThumbnailError::Decode(msg),
        other => ThumbnailError::Decode(other.to_string()),
    })?;
    debug!(
        width = dimensions.width,
        height = dimensions.height,
        orientation = ?metadata.orientation,
        "decoded source"
    );
    cancel.check()?;

    if config.auto_orient {
        if let Some(orientation) = metadata.orientation {
            pixels = backend.apply_orientation(pixels, orientation);
            metadata.clear_orientation();
            debug!(orientation, "applied orientation");
        }
    }
    cancel.check()?;

    if config.strip_metadata {
        metadata.strip();
    }

    let plan = plan_resize(backend.dimensions(&pixels), config);
    debug!(?plan, "planned resize");
    cancel.check()?;

    let bounds = Dimensions::new(config.target_width, config.target_height);
    let resized = backend.resize(pixels, &plan.resize_params(bounds, config.anchor))?;
    cancel.check()?;

    let output = match plan.canvas {
        Some(planned) => {
            // Place by what the backend actually produced.
            let placement = canvas_placement(config.anchor, planned.size, backend.dimensions(&resized));
            let fill = config.background.unwrap_or(Color::WHITE);
            let mut canvas = backend.canvas(placement.size, fill);
            backend.draw_onto(&mut canvas, &resized, placement.x, placement.y, 1.0);
            drop(resized);
            cancel.check()?;

            if config.watermark_canvas {
                apply_watermark(backend, &mut canvas, &config.watermark)?;
            } else if !config.watermark.is_inert() {
                debug!("canvas output, watermark skipped");
            }
            canvas
        }
        None => {
            let mut image = resized;
            apply_watermark(backend, &mut image, &config.watermark)?;
            image
        }
    };
    cancel.check()?;

    let encoding = config.output.encoding();
    let bytes = backend.encode(&output, encoding)?;
    cancel.check()?;

    let out = backend.dimensions(&output);
    debug!(
        width = out.width,
        height = out.height,
        format = encoding.extension(),
        bytes = bytes.len(),
        "thumbnail ready"
    );
    Ok(bytes)
}

/// Produce a thumbnail and write it to `sink`. Nothing is written unless the
/// whole pipeline succeeded. Returns the number of bytes written.
pub fn write_thumbnail<B: ImageBackend>(
    backend: &B,
    input: &[u8],
    config: &ThumbnailConfig,
    sink: &mut impl Write,
) -> Result<usize> {
    let bytes = make_thumbnail(backend, input, config)?;
    sink.write_all(&bytes)?;
    Ok(bytes.len())
}

/// Thumbnail many sources in parallel with one shared config.
///
/// Results are returned in input order; one failure does not affect the
/// others. Cancelling the token stops every pipeline at its next step.
pub fn make_thumbnails<B, T>(
    backend: &B,
    inputs: &[T],
    config: &ThumbnailConfig,
    cancel: &CancellationToken,
) -> Vec<Result<Vec<u8>>>
where
    B: ImageBackend,
    T: AsRef<[u8]> + Sync,
{
    inputs
        .par_iter()
        .map(|input| make_thumbnail_with_cancel(backend, input.as_ref(), config, cancel))
        .collect()
}
