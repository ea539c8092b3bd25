//! Error types for tone-mapping operations.

use datmo_display::DisplayError;
use thiserror::Error;

/// Error type for tone-mapping operations.
#[derive(Error, Debug)]
pub enum TmoError {
    /// Malformed input or configuration detected by `datmo-core`.
    #[error(transparent)]
    Core(#[from] datmo_core::Error),

    /// Display or viewing configuration is invalid.
    #[error(transparent)]
    Display(#[from] DisplayError),

    /// The quadratic program has no feasible point.
    #[error("tone curve optimization infeasible: {0}")]
    Infeasible(String),

    /// The progress sink asked to stop.
    #[error("aborted by progress callback at {percent}%")]
    Aborted {
        /// Last reported percentage
        percent: u8,
    },

    /// Writing or reading a curve dump failed.
    #[error("curve dump I/O: {0}")]
    Io(#[from] std::io::Error),

    /// A curve dump could not be parsed.
    #[error("malformed curve dump at line {line}: {reason}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// Description of the problem
        reason: String,
    },
}

/// Result type for tone-mapping operations.
pub type TmoResult<T> = Result<T, TmoError>;
