//! Thumbnail configuration.
//!
//! A [`ThumbnailConfig`] is built once per request, either in code or from a
//! TOML file. Only `width` and `height` are required; every other key has a
//! default.
//!
//! ## Configuration Options
//!
//! ```toml
//! width = 320                 # Target box width (required, > 0)
//! height = 240                # Target box height (required, > 0)
//! mode = "fit"                # fit | cover | contain | pad | crop
//! anchor = "center"           # center, top-left, top, top-right, left, right,
//!                             # bottom-left, bottom, bottom-right
//! auto_orient = true          # Apply and clear the EXIF orientation tag
//! strip_metadata = true       # Drop EXIF / ICC / XMP before encoding
//! prevent_upscale = false     # Never enlarge, whatever the mode
//! # background = "#FFFFFF"    # RRGGBB, AARRGGBB or [r, g, b, a]
//! watermark_canvas = false    # Also watermark images composited on a canvas
//!
//! [output]
//! kind = "jpeg"               # jpeg | png (anything else encodes as JPEG)
//! quality = 85                # JPEG quality, 1-100
//! compression_level = 6       # PNG compression, 0-9
//!
//! [watermark]
//! text = ""                   # Empty text disables the watermark
//! font_size = 16.0
//! opacity = 0.35              # 0.0-1.0, 0 disables the watermark
//! anchor = "bottom-right"
//! margin_px = 8
//! font_family = "Arial"
//! color = "#FFFFFF"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::color::Color;
use crate::error::ThumbnailError;
use crate::imaging::{Encoding, Quality};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Invalid(#[from] ThumbnailError),
    #[error("unknown {kind} '{value}'")]
    UnknownValue { kind: &'static str, value: String },
}

/// How the source aspect ratio relates to the target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    /// Scale to fit inside the box, enlarging if needed.
    #[default]
    Fit,
    /// Scale to cover the box, then crop the overflow.
    Cover,
    /// Like `Fit`, but never enlarge.
    Contain,
    /// Fit inside the box, then pad to exactly the box size.
    Pad,
    /// Fit inside the box using the crop-to-fill raster strategy.
    Crop,
}

impl ResizeMode {
    pub const ALL: [ResizeMode; 5] = [
        ResizeMode::Fit,
        ResizeMode::Cover,
        ResizeMode::Contain,
        ResizeMode::Pad,
        ResizeMode::Crop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fit => "fit",
            Self::Cover => "cover",
            Self::Contain => "contain",
            Self::Pad => "pad",
            Self::Crop => "crop",
        }
    }
}

impl FromStr for ResizeMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownValue {
                kind: "resize mode",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for ResizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alignment along a single axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    /// Left or top edge.
    Start,
    Center,
    /// Right or bottom edge.
    End,
}

/// One of nine reference points, used for crop, pad and watermark placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    #[default]
    Center,
    TopLeft,
    Top,
    TopRight,
    Left,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl Anchor {
    pub const ALL: [Anchor; 9] = [
        Anchor::Center,
        Anchor::TopLeft,
        Anchor::Top,
        Anchor::TopRight,
        Anchor::Left,
        Anchor::Right,
        Anchor::BottomLeft,
        Anchor::Bottom,
        Anchor::BottomRight,
    ];

    pub fn horizontal(self) -> Align {
        match self {
            Self::TopLeft | Self::Left | Self::BottomLeft => Align::Start,
            Self::Top | Self::Center | Self::Bottom => Align::Center,
            Self::TopRight | Self::Right | Self::BottomRight => Align::End,
        }
    }

    pub fn vertical(self) -> Align {
        match self {
            Self::TopLeft | Self::Top | Self::TopRight => Align::Start,
            Self::Left | Self::Center | Self::Right => Align::Center,
            Self::BottomLeft | Self::Bottom | Self::BottomRight => Align::End,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::TopLeft => "top-left",
            Self::Top => "top",
            Self::TopRight => "top-right",
            Self::Left => "left",
            Self::Right => "right",
            Self::BottomLeft => "bottom-left",
            Self::Bottom => "bottom",
            Self::BottomRight => "bottom-right",
        }
    }
}

/// Accepts `top-left`, `top_left`, `TopLeft` and `top left` alike.
impl FromStr for Anchor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = squash(s);
        Self::ALL
            .into_iter()
            .find(|a| squash(a.as_str()) == wanted)
            .ok_or_else(|| ConfigError::UnknownValue {
                kind: "anchor",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Requested output encoding.
///
/// `kind` is matched leniently: `"png"` (any case) selects PNG and every other
/// value, recognized or not, falls back to JPEG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputFormat {
    pub kind: String,
    /// JPEG quality, 1-100.
    pub quality: Quality,
    /// PNG compression level, 0 (fastest) to 9 (smallest).
    pub compression_level: u8,
}

impl OutputFormat {
    pub fn jpeg(quality: u32) -> Self {
        Self {
            kind: "jpeg".to_string(),
            quality: Quality::new(quality),
            ..Self::default()
        }
    }

    pub fn png(compression_level: u8) -> Self {
        Self {
            kind: "png".to_string(),
            compression_level,
            ..Self::default()
        }
    }

    pub fn encoding(&self) -> Encoding {
        if self.kind.trim().eq_ignore_ascii_case("png") {
            Encoding::Png {
                compression: self.compression_level.min(9),
            }
        } else {
            Encoding::Jpeg {
                quality: self.quality,
            }
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self {
            kind: "jpeg".to_string(),
            quality: Quality::new(85),
            compression_level: 6,
        }
    }
}

/// Text watermark settings.
///
/// A watermark with empty `text` or `opacity <= 0` is inert: it is skipped
/// without error. Opacity is folded into the drawing color's alpha channel
/// (see [`WatermarkSpec::draw_color`]); there is no separate draw-time blend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatermarkSpec {
    pub text: String,
    /// Font size in pixels.
    pub font_size: f32,
    /// 0.0 (invisible) to 1.0 (opaque).
    pub opacity: f32,
    pub anchor: Anchor,
    /// Inset from every edge the anchor touches.
    pub margin_px: i32,
    pub font_family: String,
    pub color: Color,
}

impl WatermarkSpec {
    /// A watermark with the given text and default styling.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Set the opacity. Values outside `0.0..=1.0` (or NaN) are rejected.
    pub fn with_opacity(mut self, opacity: f32) -> Result<Self, ThumbnailError> {
        check_opacity(opacity)?;
        self.opacity = opacity;
        Ok(self)
    }

    pub fn is_inert(&self) -> bool {
        self.text.is_empty() || self.opacity <= 0.0
    }

    /// The color handed to the text primitive: `color` with opacity baked
    /// into alpha.
    pub fn draw_color(&self) -> Color {
        self.color.with_opacity(self.opacity)
    }

    pub fn validate(&self) -> Result<(), ThumbnailError> {
        check_opacity(self.opacity)?;
        if !self.is_inert() && !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(ThumbnailError::WatermarkConfig(format!(
                "font_size must be a positive number, got {}",
                self.font_size
            )));
        }
        Ok(())
    }
}

fn check_opacity(opacity: f32) -> Result<(), ThumbnailError> {
    if (0.0..=1.0).contains(&opacity) {
        Ok(())
    } else {
        Err(ThumbnailError::WatermarkConfig(format!(
            "opacity must be within 0.0-1.0, got {opacity}"
        )))
    }
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_size: 16.0,
            opacity: 0.35,
            anchor: Anchor::BottomRight,
            margin_px: 8,
            font_family: "Arial".to_string(),
            color: Color::WHITE,
        }
    }
}

/// Everything one thumbnail request needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThumbnailConfig {
    #[serde(rename = "width")]
    pub target_width: u32,
    #[serde(rename = "height")]
    pub target_height: u32,
    #[serde(default)]
    pub mode: ResizeMode,
    #[serde(default)]
    pub anchor: Anchor,
    #[serde(default = "default_true")]
    pub auto_orient: bool,
    #[serde(default = "default_true")]
    pub strip_metadata: bool,
    /// Canvas fill. Setting it forces canvas compositing in every mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Color>,
    #[serde(default)]
    pub output: OutputFormat,
    #[serde(default)]
    pub watermark: WatermarkSpec,
    #[serde(default)]
    pub prevent_upscale: bool,
    /// Draw the watermark on canvas-composited output too. When false, the
    /// canvas branch leaves images unwatermarked.
    #[serde(default)]
    pub watermark_canvas: bool,
}

fn default_true() -> bool {
    true
}

impl ThumbnailConfig {
    /// A config for the given target box with every other option defaulted.
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
            mode: ResizeMode::default(),
            anchor: Anchor::default(),
            auto_orient: true,
            strip_metadata: true,
            background: None,
            output: OutputFormat::default(),
            watermark: WatermarkSpec::default(),
            prevent_upscale: false,
            watermark_canvas: false,
        }
    }

    /// Check the target box only. Cheap; runs before any decode work.
    pub fn validate_dimensions(&self) -> Result<(), ThumbnailError> {
        if self.target_width == 0 || self.target_height == 0 {
            return Err(ThumbnailError::InvalidDimension {
                width: self.target_width,
                height: self.target_height,
            });
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ThumbnailError> {
        self.validate_dimensions()?;
        self.watermark.validate()
    }

    /// Whether the resized image is composited onto a target-sized canvas.
    pub fn uses_canvas(&self) -> bool {
        self.mode == ResizeMode::Pad || self.background.is_some()
    }
}

// =============================================================================
// Config loading and merging
// =============================================================================

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ThumbnailConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ThumbnailConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<ThumbnailConfig, ConfigError> {
    resolve_config(load_raw_config(path)?, None)
}

/// Returns a fully-commented `thumbnail.toml` template with every key.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Thumbnail configuration
# =======================
# Only width and height are required. Values shown below are the defaults.
# Unknown keys will cause an error.

# Target box, in pixels. Both must be greater than zero.
width = 320
height = 240

# How the source aspect ratio relates to the target box:
#   fit      scale to fit inside the box (may enlarge)
#   cover    scale to cover the box, crop the overflow
#   contain  like fit, but never enlarge
#   pad      fit inside, then pad to exactly width x height
#   crop     fit inside using the crop-to-fill raster strategy
mode = "fit"

# Reference point for cropping and padding:
# center, top-left, top, top-right, left, right,
# bottom-left, bottom, bottom-right
anchor = "center"

# Rotate/flip according to the EXIF orientation tag, then clear the tag.
auto_orient = true

# Drop EXIF, ICC and XMP metadata from the in-memory image.
strip_metadata = true

# Never enlarge the source, whatever the mode.
prevent_upscale = false

# Canvas color (RRGGBB, AARRGGBB or [r, g, b, a]). Setting it composites
# the result onto a width x height canvas in every mode. Pad mode uses
# opaque white when unset.
# background = "#FFFFFF"

# Draw the watermark on canvas-composited results too.
watermark_canvas = false

# ---------------------------------------------------------------------------
# Output encoding
# ---------------------------------------------------------------------------
[output]
# "png" for lossless output; any other value encodes JPEG.
kind = "jpeg"
# JPEG quality (1 = worst, 100 = best).
quality = 85
# PNG compression level (0 = fastest, 9 = smallest).
compression_level = 6

# ---------------------------------------------------------------------------
# Text watermark (disabled while text is empty or opacity is 0)
# ---------------------------------------------------------------------------
[watermark]
text = ""
font_size = 16.0
opacity = 0.35
anchor = "bottom-right"
margin_px = 8
font_family = "Arial"
color = "#FFFFFF"
"##
}
