//! RGBA color value with hex parsing.
//!
//! Accepted literals:
//! - `RRGGBB` / `#RRGGBB`: alpha defaults to `0xFF`
//! - `AARRGGBB` / `#AARRGGBB`: alpha first
//!
//! Hex digits are case-insensitive. Any other length, or any non-hex
//! character, is a [`ColorParseError`]. Shorthand forms (`#RGB`) are not
//! accepted.
//!
//! In config files a color may also be written as an `[r, g, b, a]` array.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColorParseError {
    #[error("color must be RRGGBB or AARRGGBB, got {0} hex digits")]
    InvalidLength(usize),
    #[error("invalid hex digit in color '{0}'")]
    InvalidDigit(String),
}

/// An 8-bit-per-channel RGBA color. Equality compares all four channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ColorRepr", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse a `RRGGBB` or `AARRGGBB` hex string, with or without `#`.
    pub fn from_hex(s: &str) -> Result<Self, ColorParseError> {
        let hex = s.strip_prefix('#').unwrap_or(s);

        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ColorParseError::InvalidDigit(s.to_string()));
        }

        match hex.len() {
            6 => Ok(Self::rgb(
                parse_byte(&hex[0..2]),
                parse_byte(&hex[2..4]),
                parse_byte(&hex[4..6]),
            )),
            8 => Ok(Self::rgba(
                parse_byte(&hex[2..4]),
                parse_byte(&hex[4..6]),
                parse_byte(&hex[6..8]),
                parse_byte(&hex[0..2]),
            )),
            n => Err(ColorParseError::InvalidLength(n)),
        }
    }

    /// Hex form without `#`: `RRGGBB` when opaque, `AARRGGBB` otherwise.
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("{:02X}{:02X}{:02X}{:02X}", self.a, self.r, self.g, self.b)
        }
    }

    /// Same color with its alpha scaled by `factor` (clamped to 0..=1).
    pub fn with_opacity(self, factor: f32) -> Self {
        let a = (self.a as f32 * factor.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

// Callers validate all bytes are hex digits first.
fn parse_byte(s: &str) -> u8 {
    u8::from_str_radix(s, 16).unwrap_or_default()
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// Wire forms accepted when deserializing a [`Color`].
#[derive(Deserialize)]
#[serde(untagged)]
enum ColorRepr {
    Hex(String),
    Rgba([u8; 4]),
}

impl TryFrom<ColorRepr> for Color {
    type Error = ColorParseError;

    fn try_from(repr: ColorRepr) -> Result<Self, Self::Error> {
        match repr {
            ColorRepr::Hex(s) => Self::from_hex(&s),
            ColorRepr::Rgba([r, g, b, a]) => Ok(Self::rgba(r, g, b, a)),
        }
    }
}
