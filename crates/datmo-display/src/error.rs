//! Error types for display models.

use thiserror::Error;

/// Error type for display construction and parsing.
#[derive(Error, Debug)]
pub enum DisplayError {
    /// A display parameter is out of range.
    #[error("invalid display parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Description of the problem
        reason: String,
    },

    /// Tabulated display response is malformed.
    #[error("invalid display LUT at line {line}: {reason}")]
    InvalidLut {
        /// 1-based line number, 0 for whole-table problems
        line: usize,
        /// Description of the problem
        reason: String,
    },

    /// Viewing geometry cannot produce a positive pixel density.
    #[error("invalid viewing geometry: {0}")]
    InvalidGeometry(String),
}

impl DisplayError {
    pub(crate) fn param(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Result type for display operations.
pub type DisplayResult<T> = Result<T, DisplayError>;
