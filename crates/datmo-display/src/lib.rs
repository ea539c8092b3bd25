//! # datmo-display
//!
//! Display models for display-adaptive tone mapping.
//!
//! A display model maps a normalized code value `v` in [0, 1] to the
//! luminance the display emits (including light reflected from the screen)
//! and back. The tone-curve optimizer only needs the achievable luminance
//! range; the applicator needs the inverse to produce code values.
//!
//! # Supported Displays
//!
//! | Preset | Gamma | Peak | Black | Ambient | Reflectivity |
//! |--------|-------|------|-------|---------|--------------|
//! | `lcd_office` | 2.2 | 100 | 0.8 | 400 lux | 0.01 |
//! | `lcd` | 2.2 | 200 | 0.8 | 60 lux | 0.01 |
//! | `lcd_bright` | 2.6 | 500 | 0.5 | 10 lux | 0.01 |
//! | `crt` | 2.2 | 80 | 1.0 | 60 lux | 0.02 |
//! | `plasma` | 2.2 | 150 | 0.1 | 60 lux | 0.01 |
//!
//! Custom gamma-gain-black-ambient parameters and tabulated (LUT) responses
//! are available through [`DisplayConfig`].
//!
//! # Usage
//!
//! ```rust
//! use datmo_display::{DisplayConfig, DisplayFunction, DisplayModel};
//!
//! let display = DisplayModel::from_config(&DisplayConfig::Lcd).unwrap();
//! let nits = display.display(0.5);
//! let v = display.inverse_display(nits);
//! assert!((v - 0.5).abs() < 1e-4);
//! assert!(display.dynamic_range() > 2.0);
//! ```
//!
//! # Used By
//!
//! - `datmo-ops` - Optimizer range, applicator inverse, temporal clamp

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod ggba;
pub mod lut;
pub mod model;
pub mod viewing;

pub use error::{DisplayError, DisplayResult};
pub use ggba::GgbaDisplay;
pub use lut::LutDisplay;
pub use model::{DisplayConfig, DisplayFunction, DisplayModel};
pub use viewing::ViewingGeometry;
