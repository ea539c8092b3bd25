//! # datmo-ops
//!
//! Display-adaptive tone mapping.
//!
//! Given an HDR frame and a description of the target display, this crate
//! computes the tone curve that best preserves the visible contrasts of
//! the scene within the display's dynamic range, applies it, and keeps it
//! stable across video frames.
//!
//! # Modules
//!
//! - [`pyramid`] - Non-decimated Gaussian pyramid
//! - [`density`] - Contrast statistics conditioned on background luminance
//! - [`visual`] - Contrast sensitivity and contrast transducer
//! - [`qp`] - Active-set solver for the curve's quadratic program
//! - [`optimizer`] - Iterative tone curve optimisation
//! - [`apply`] - Per-pixel application with saturation correction
//! - [`temporal`] - Butterworth smoothing of curves over time
//! - [`tonemap`] - Session object tying the stages together
//! - [`dump`] - CSV dump of per-frame curves
//!
//! # Pipeline
//!
//! ```text
//! luminance -> density -> optimizer (visual model, display) -> temporal -> apply -> code values
//! ```
//!
//! # Example
//!
//! ```rust
//! use datmo_core::{NoProgress, Plane, RgbFrame};
//! use datmo_display::DisplayConfig;
//! use datmo_ops::{TonemapConfig, ToneMapper};
//!
//! let lum = Plane::from_fn(16, 16, |x, y| 0.1 * 10f32.powf((x + y) as f32 / 8.0)).unwrap();
//! let frame = RgbFrame::new(lum.clone(), lum.clone(), lum).unwrap();
//!
//! let config = TonemapConfig {
//!     display: DisplayConfig::Crt,
//!     ..Default::default()
//! };
//! let mut mapper = ToneMapper::new(config).unwrap();
//! let (out, _curve) = mapper.tonemap_frame(&frame, &mut NoProgress).unwrap();
//! let png_bytes = out.to_rgb8();
//! assert_eq!(png_bytes.len(), 16 * 16 * 3);
//! ```
//!
//! # Feature Flags
//!
//! - `parallel` (default) - Row-parallel filtering and application with rayon

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
mod rows;

pub mod apply;
pub mod config;
pub mod curve;
pub mod density;
pub mod dump;
pub mod optimizer;
pub mod pyramid;
pub mod qp;
pub mod temporal;
pub mod tonemap;
pub mod visual;

pub use apply::{apply_tone_curve, DisplayFrame};
pub use config::{SceneAdaptation, TonemapConfig};
pub use curve::ToneCurve;
pub use density::ConditionalDensity;
pub use dump::{read_curves, read_curves_file, CurveDump};
pub use error::{TmoError, TmoResult};
pub use optimizer::{OptimizerReport, OptimizerState, SceneSensitivity, ToneCurveOptimizer};
pub use temporal::{FrameRate, TemporalFilter};
pub use tonemap::ToneMapper;
pub use visual::{VisualModel, VisualModelFlags, VisualModelLut};
