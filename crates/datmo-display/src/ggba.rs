//! Gamma-gain-black-ambient display model.
//!
//! ```text
//! L(v) = (peak - black) * v^gamma + black + reflectivity / PI * ambient
//! ```
//!
//! `ambient` is the illuminance falling on the screen in lux; the reflected
//! term raises the effective black level and shrinks the dynamic range.

use crate::{DisplayError, DisplayFunction, DisplayResult};
use std::f32::consts::PI;

/// Parametric display response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GgbaDisplay {
    gamma: f32,
    peak: f32,
    black: f32,
    reflected: f32,
}

impl GgbaDisplay {
    /// Creates a display from its physical description.
    ///
    /// # Arguments
    ///
    /// * `gamma` - Exponent of the power response (> 0)
    /// * `peak` - Peak luminance in cd/m²
    /// * `black` - Black level in cd/m² (emitted, without reflections)
    /// * `ambient` - Ambient illuminance in lux
    /// * `reflectivity` - Screen reflectivity (0..1)
    ///
    /// # Errors
    ///
    /// [`DisplayError::InvalidParameter`] when a value is out of range or the
    /// effective black level is zero (infinite dynamic range).
    pub fn new(gamma: f32, peak: f32, black: f32, ambient: f32, reflectivity: f32) -> DisplayResult<Self> {
        if !(gamma.is_finite() && gamma > 0.0) {
            return Err(DisplayError::param("gamma", format!("must be > 0, got {gamma}")));
        }
        if !(black.is_finite() && black >= 0.0) {
            return Err(DisplayError::param("black_level", format!("must be >= 0, got {black}")));
        }
        if !(peak.is_finite() && peak > black) {
            return Err(DisplayError::param(
                "peak_luminance",
                format!("must exceed black level {black}, got {peak}"),
            ));
        }
        if !(ambient.is_finite() && ambient >= 0.0) {
            return Err(DisplayError::param("ambient", format!("must be >= 0, got {ambient}")));
        }
        if !(reflectivity.is_finite() && (0.0..=1.0).contains(&reflectivity)) {
            return Err(DisplayError::param(
                "reflectivity",
                format!("must be in [0, 1], got {reflectivity}"),
            ));
        }
        let reflected = reflectivity / PI * ambient;
        if black + reflected <= 0.0 {
            return Err(DisplayError::param(
                "black_level",
                "black level plus reflections must be > 0",
            ));
        }
        Ok(Self {
            gamma,
            peak,
            black,
            reflected,
        })
    }

    /// Response exponent.
    #[inline]
    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    #[inline]
    fn floor(&self) -> f64 {
        self.black as f64 + self.reflected as f64
    }

    /// Luminance reflected off the screen (cd/m²).
    #[inline]
    pub fn reflected(&self) -> f32 {
        self.reflected
    }
}

impl DisplayFunction for GgbaDisplay {
    #[inline]
    fn display(&self, v: f32) -> f32 {
        let v = v.clamp(0.0, 1.0) as f64;
        let gain = (self.peak - self.black) as f64;
        (gain * v.powf(self.gamma as f64) + self.floor()) as f32
    }

    #[inline]
    fn inverse_display(&self, luminance: f32) -> f32 {
        let l = luminance as f64 - self.floor();
        if l <= 0.0 {
            return 0.0;
        }
        let gain = (self.peak - self.black) as f64;
        ((l / gain).powf(1.0 / self.gamma as f64) as f32).min(1.0)
    }

    #[inline]
    fn min_luminance(&self) -> f32 {
        self.black + self.reflected
    }

    #[inline]
    fn max_luminance(&self) -> f32 {
        self.peak + self.reflected
    }
}
