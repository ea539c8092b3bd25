//! Error types for datmo-core operations.
//!
//! The [`Error`] enum covers the failures that can be detected before any
//! tone-mapping work starts:
//! - Malformed plane dimensions or buffer lengths
//! - Planes of one frame that disagree in size
//! - Out-of-range configuration values
//!
//! # Usage
//!
//! ```rust
//! use datmo_core::{Error, Result};
//!
//! fn check(width: u32, height: u32) -> Result<()> {
//!     if width == 0 || height == 0 {
//!         return Err(Error::invalid_dimensions(width, height, "zero-sized plane"));
//!     }
//!     Ok(())
//! }
//! assert!(check(0, 4).is_err());
//! ```
//!
//! # Used By
//!
//! - [`crate::image::Plane`] - Construction checks
//! - `datmo-ops` - Wrapped into its `TmoError`

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by core buffer and configuration checks.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid plane dimensions.
    ///
    /// Returned when width or height is zero, or when the buffer length does
    /// not equal `width * height`.
    #[error("invalid dimensions: {width}x{height} ({reason})")]
    InvalidDimensions {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
        /// Reason why dimensions are invalid
        reason: String,
    },

    /// Planes of one frame have different sizes.
    #[error("dimension mismatch: {a_width}x{a_height} vs {b_width}x{b_height}")]
    DimensionMismatch {
        /// First plane width
        a_width: u32,
        /// First plane height
        a_height: u32,
        /// Second plane width
        b_width: u32,
        /// Second plane height
        b_height: u32,
    },

    /// A configuration value is outside its accepted range.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name as exposed to users
        name: &'static str,
        /// What is wrong with the value
        reason: String,
    },

    /// I/O error while writing or reading auxiliary data.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates an [`Error::InvalidDimensions`] error.
    #[inline]
    pub fn invalid_dimensions(width: u32, height: u32, reason: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            width,
            height,
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::DimensionMismatch`] error.
    #[inline]
    pub fn dimension_mismatch(a: (u32, u32), b: (u32, u32)) -> Self {
        Self::DimensionMismatch {
            a_width: a.0,
            a_height: a.1,
            b_width: b.0,
            b_height: b.1,
        }
    }

    /// Creates an [`Error::InvalidParameter`] error.
    #[inline]
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_dimensions() {
        let err = Error::invalid_dimensions(0, 50, "zero width");
        let msg = err.to_string();
        assert!(msg.contains("0x50"));
        assert!(msg.contains("zero width"));
        assert!(matches!(err, Error::InvalidDimensions { width: 0, height: 50, .. }));
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = Error::dimension_mismatch((100, 100), (200, 200));
        let msg = err.to_string();
        assert!(msg.contains("100x100"));
        assert!(msg.contains("200x200"));
    }

    #[test]
    fn test_invalid_parameter() {
        let err = Error::invalid_parameter("saturation", "must be >= 0, got -1");
        assert!(matches!(err, Error::InvalidParameter { name: "saturation", .. }));
        assert!(err.to_string().contains("saturation"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
