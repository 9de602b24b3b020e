//! Pipeline error taxonomy.
//!
//! Every failure surfaces synchronously to the caller of the failing
//! operation and nothing is retried: the pipeline is pure and local, so there
//! are no transient failure classes. On any error no output bytes are
//! produced.

use crate::color::ColorParseError;
use crate::imaging::BackendError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ThumbnailError>;

#[derive(Error, Debug)]
pub enum ThumbnailError {
    /// Target width or height is zero. Raised before any decode work.
    #[error("invalid target dimensions {width}x{height}: both must be greater than zero")]
    InvalidDimension { width: u32, height: u32 },
    /// Input bytes are corrupt or in an unsupported format.
    #[error("failed to decode source image: {0}")]
    Decode(String),
    #[error("invalid color: {0}")]
    ColorParse(#[from] ColorParseError),
    #[error("invalid watermark configuration: {0}")]
    WatermarkConfig(String),
    /// No font could be resolved, including all fallbacks.
    #[error("no usable font found for family '{requested}' (fallbacks exhausted)")]
    FontUnavailable { requested: String },
    /// A raster or codec primitive failed after a successful decode.
    #[error("image processing failed: {0}")]
    Backend(#[from] BackendError),
    #[error("failed to write thumbnail: {0}")]
    Io(#[from] std::io::Error),
    #[error("thumbnail generation was cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_dimension_names_both_sides() {
        let err = ThumbnailError::InvalidDimension {
            width: 0,
            height: 100,
        };
        assert_eq!(
            err.to_string(),
            "invalid target dimensions 0x100: both must be greater than zero"
        );
    }

    #[test]
    fn color_parse_errors_convert() {
        let err: ThumbnailError = ColorParseError::InvalidLength(5).into();
        assert!(matches!(err, ThumbnailError::ColorParse(_)));
        assert!(err.to_string().contains("5 hex digits"));
    }

    #[test]
    fn backend_errors_convert() {
        let err: ThumbnailError = BackendError::ProcessingFailed("boom".into()).into();
        assert!(matches!(err, ThumbnailError::Backend(_)));
    }
}
