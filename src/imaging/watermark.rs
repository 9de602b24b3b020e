//! Text watermark placement and font resolution.
//!
//! Placement reuses [`resolve_anchor_offset`] with `f32` coordinates, then
//! pulls the text inward by `margin_px` on every edge the anchor touches:
//!
//! ```text
//! TopLeft     → (+m, +m)      Top     → (0, +m)     TopRight     → (-m, +m)
//! Left        → (+m,  0)      Center  → (0,  0)     Right        → (-m,  0)
//! BottomLeft  → (+m, -m)      Bottom  → (0, -m)     BottomRight  → (-m, -m)
//! ```

use crate::config::{Align, WatermarkSpec};
use crate::error::{Result, ThumbnailError};
use tracing::{debug, warn};

use super::backend::{Dimensions, FontCatalog, ImageBackend};
use super::calculations::resolve_anchor_offset;
use super::params::FontSpec;

/// Families tried, in order, when the requested one is missing.
pub const FALLBACK_FAMILIES: [&str; 2] = ["DejaVu Sans", "Liberation Sans"];

/// Top-left corner of the watermark text box.
pub fn place_watermark(spec: &WatermarkSpec, image: Dimensions, text_size: (f32, f32)) -> (f32, f32) {
    let (x, y) = resolve_anchor_offset(
        spec.anchor,
        image.width as f32,
        image.height as f32,
        text_size.0,
        text_size.1,
    );
    let margin = spec.margin_px as f32;
    (
        x + inward(spec.anchor.horizontal(), margin),
        y + inward(spec.anchor.vertical(), margin),
    )
}

fn inward(align: Align, margin: f32) -> f32 {
    match align {
        Align::Start => margin,
        Align::Center => 0.0,
        Align::End => -margin,
    }
}

/// Pick the family to render with: the requested one, then each fallback,
/// then whatever the catalog has first.
pub fn resolve_font_family(fonts: &dyn FontCatalog, requested: &str) -> Result<String> {
    if fonts.contains(requested) {
        return Ok(requested.to_string());
    }

    let resolved = FALLBACK_FAMILIES
        .iter()
        .find(|family| fonts.contains(family))
        .map(|family| family.to_string())
        .or_else(|| fonts.families().into_iter().next())
        .ok_or_else(|| ThumbnailError::FontUnavailable {
            requested: requested.to_string(),
        })?;

    warn!(requested, resolved = %resolved, "watermark font not found, using fallback");
    Ok(resolved)
}

/// Draw `spec` onto `image`. Inert watermarks return immediately without
/// touching the backend.
pub fn apply_watermark<B: ImageBackend>(
    backend: &B,
    image: &mut B::Image,
    spec: &WatermarkSpec,
) -> Result<()> {
    if spec.is_inert() {
        return Ok(());
    }

    let font = FontSpec {
        family: resolve_font_family(backend.fonts(), &spec.font_family)?,
        size: spec.font_size,
    };
    let text_size = backend.measure_text(&spec.text, &font)?;
    let dims = backend.dimensions(image);
    let (x, y) = place_watermark(spec, dims, text_size);

    debug!(
        text = %spec.text,
        family = %font.family,
        x,
        y,
        "drawing watermark"
    );
    backend.draw_text(image, &spec.text, &font, spec.draw_color(), x, y)?;
    Ok(())
}
