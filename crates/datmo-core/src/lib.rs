//! # datmo-core
//!
//! Core types for display-adaptive tone mapping.
//!
//! This crate provides the foundational types used throughout datmo:
//!
//! - [`Plane`] - Single-channel float buffer (luminance field)
//! - [`RgbFrame`] - Three linear-light planes of one frame
//! - [`LogLuminanceScale`] - The fixed log10 luminance grid shared by every
//!   per-frame structure
//! - [`ProgressSink`] - Percentage callback with a continue/abort answer
//! - [`Error`] - Error type for dimension and parameter failures
//!
//! ## Crate Structure
//!
//! ```text
//! datmo-core (this crate)
//!    ^
//!    |
//!    +-- datmo-display (display models, viewing geometry)
//!    +-- datmo-ops (density, visual model, optimizer, temporal filter)
//!    +-- datmo-cli
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod image;
pub mod progress;
pub mod scale;

pub use error::*;
pub use image::{luminance_rec709, Plane, RgbFrame, REC709_LUMA};
pub use progress::{NoProgress, ProgressSink};
pub use scale::{LogLuminanceScale, LOG_LUM_STEP, MAX_LOG_LUM, MIN_LOG_LUM};

/// Prelude module for convenient imports.
///
/// ```
/// use datmo_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::image::{Plane, RgbFrame};
    pub use crate::progress::{NoProgress, ProgressSink};
    pub use crate::scale::LogLuminanceScale;
}
