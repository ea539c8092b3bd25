//! Human visual system model: contrast sensitivity and contrast transducer.
//!
//! # Contrast Sensitivity
//!
//! [`VisualModel::csf`] is Daly's CSF. The sensitivity at spatial frequency
//! `rho` (cycles/degree) and adaptation luminance `L` (cd/m²) is
//!
//! ```text
//! S = P * min(S1(rho / (r_a * r_e * r_theta)), S1(rho))
//! S1(rho) = ((3.23 (rho² i²)^-0.3)^5 + 1)^-0.2 * A_l eps rho e^(-B_l eps rho) sqrt(1 + 0.06 e^(B_l eps rho))
//! A_l = 0.801 (1 + 0.7 / L)^-0.2
//! B_l = 0.3 (1 + 100 / L)^0.15
//! ```
//!
//! with the oblique-effect term `r_theta = 0.11 cos(4 theta) + 0.89`.
//!
//! # Contrast Transducer
//!
//! With contrast masking the response to a log10 contrast `c` seen with
//! sensitivity `S` is
//!
//! ```text
//! u = S * (10^|c| - 1)
//! T(u) = A ((1 + u^3)^(1/3) - 1) / (k (B + u)^E)
//! A = 3.291, B = 3.433, E = 0.8, k = 0.2599
//! ```
//!
//! `T(1) ~ 1`, so responses are in units of just-noticeable differences.
//! Without masking the response is simply `c * S`.

use datmo_core::LogLuminanceScale;
use serde::{Deserialize, Serialize};

/// Peak absolute sensitivity of the CSF.
const CSF_PEAK: f64 = 250.0;
/// Adaptation luminance used when luminance masking is disabled (cd/m²).
pub const REFERENCE_ADAPTATION: f32 = 1000.0;
/// Frequency used when the CSF is disabled (cycles/degree).
pub const REFERENCE_FREQUENCY: f32 = 4.0;

const TRANSDUCER_A: f64 = 3.291;
const TRANSDUCER_B: f64 = 3.433;
const TRANSDUCER_E: f64 = 0.8;
const TRANSDUCER_K: f64 = 0.2599;

/// Switches for the three parts of the visual model.
///
/// All components are on by default; turning one off ablates that part
/// of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualModelFlags {
    /// Sensitivity depends on adaptation luminance.
    pub luminance_masking: bool,
    /// Saturating contrast transducer instead of a linear one.
    pub contrast_masking: bool,
    /// Sensitivity depends on spatial frequency.
    pub csf: bool,
}

impl VisualModelFlags {
    /// Full model.
    pub const ALL: Self = Self {
        luminance_masking: true,
        contrast_masking: true,
        csf: true,
    };

    /// Every component disabled.
    pub const NONE: Self = Self {
        luminance_masking: false,
        contrast_masking: false,
        csf: false,
    };
}

impl Default for VisualModelFlags {
    fn default() -> Self {
        Self::ALL
    }
}

/// Parametrised visual model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualModel {
    /// Enabled components.
    pub flags: VisualModelFlags,
    /// Viewing distance in metres (CSF `d`).
    pub viewing_distance: f32,
    /// Image area in square degrees (CSF `i²`).
    pub image_area: f32,
    /// Stimulus orientation in radians (oblique effect).
    pub orientation: f32,
}

impl Default for VisualModel {
    fn default() -> Self {
        Self::new(VisualModelFlags::ALL)
    }
}

impl VisualModel {
    /// Model with Daly's standard viewing conditions.
    pub fn new(flags: VisualModelFlags) -> Self {
        Self {
            flags,
            viewing_distance: 0.5,
            image_area: 1.0,
            orientation: 0.0,
        }
    }

    /// Contrast sensitivity at `frequency` (cycles/degree) and adaptation
    /// luminance (cd/m²).
    ///
    /// Zero only for a zero frequency; otherwise strictly positive.
    pub fn csf(&self, frequency: f32, adaptation_luminance: f32) -> f32 {
        let rho = if self.flags.csf {
            frequency
        } else {
            REFERENCE_FREQUENCY
        } as f64;
        if rho <= 0.0 {
            return 0.0;
        }
        let lum = if self.flags.luminance_masking {
            adaptation_luminance.max(1e-5)
        } else {
            REFERENCE_ADAPTATION
        } as f64;

        let a_l = 0.801 * (1.0 + 0.7 / lum).powf(-0.2);
        let b_l = 0.3 * (1.0 + 100.0 / lum).powf(0.15);
        let i2 = self.image_area as f64;
        let eps = 0.9;

        let s1 = |rho: f64| {
            let b1 = b_l * eps * rho;
            ((3.23 * (rho * rho * i2).powf(-0.3)).powi(5) + 1.0).powf(-0.2)
                * a_l
                * eps
                * rho
                * (-b1).exp()
                * (1.0 + 0.06 * b1.exp()).sqrt()
        };

        let r_a = 0.856 * (self.viewing_distance as f64).powf(0.14);
        let r_e = 1.0; // foveal vision, eccentricity 0
        let r_theta = 0.11 * (4.0 * self.orientation as f64).cos() + 0.89;

        let s = CSF_PEAK * s1(rho / (r_a * r_e * r_theta)).min(s1(rho));
        (s as f32).max(f32::MIN_POSITIVE)
    }

    /// Perceptual response to log10 contrast `contrast` at `sensitivity`.
    ///
    /// Odd in `contrast`; strictly increasing in `|contrast|`.
    pub fn contrast_transducer(&self, contrast: f32, sensitivity: f32) -> f32 {
        contrast_transducer(contrast, sensitivity, self.flags.contrast_masking)
    }

    /// Magnitude of log10 contrast producing `response` at `sensitivity`.
    pub fn inverse_transducer(&self, response: f32, sensitivity: f32) -> f32 {
        inverse_transducer(response, sensitivity, self.flags.contrast_masking)
    }
}

/// Masking nonlinearity applied to the sensitivity-scaled stimulus `u`.
#[inline]
fn masking(u: f64) -> f64 {
    TRANSDUCER_A * ((1.0 + u * u * u).cbrt() - 1.0) / (TRANSDUCER_K * (TRANSDUCER_B + u).powf(TRANSDUCER_E))
}

/// Stimulus magnitude `u` for which `masking(u) == response`.
fn inverse_masking(response: f64) -> f64 {
    if response <= 0.0 {
        return 0.0;
    }
    let mut hi = 1.0f64;
    while masking(hi) < response && hi < 1e30 {
        hi *= 4.0;
    }
    let mut lo = 0.0f64;
    for _ in 0..80 {
        let mid = 0.5 * (lo + hi);
        if masking(mid) < response {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Perceptual response to log10 contrast.
///
/// With `masking` off the response is linear, `contrast * sensitivity`.
/// With masking on, the response is a function of the stimulus
/// `u = sensitivity * (10^|contrast| - 1)`: expansive below `u ≈ 1.5`
/// and concave above it, so the marginal response per unit of Weber
/// contrast falls as contrast grows.
///
/// ```rust
/// use datmo_ops::visual::contrast_transducer;
///
/// let linear = contrast_transducer(0.2, 100.0, false);
/// assert!((linear - 20.0).abs() < 1e-4);
/// let masked = contrast_transducer(-0.2, 100.0, true);
/// assert!(masked < 0.0);
/// ```
pub fn contrast_transducer(contrast: f32, sensitivity: f32, masking_enabled: bool) -> f32 {
    let c = contrast as f64;
    let s = sensitivity as f64;
    let r = if masking_enabled {
        masking(s * (10f64.powf(c.abs()) - 1.0))
    } else {
        s * c.abs()
    };
    (r as f32).copysign(contrast)
}

/// Magnitude of log10 contrast whose response equals `response`.
pub fn inverse_transducer(response: f32, sensitivity: f32, masking_enabled: bool) -> f32 {
    let r = (response as f64).abs();
    let s = (sensitivity as f64).max(1e-12);
    let c = if masking_enabled {
        (1.0 + inverse_masking(r) / s).log10()
    } else {
        r / s
    };
    c as f32
}

/// Stimulus `u` needed for `response` under masking; the optimizer caches
/// it because it does not depend on the display-side sensitivity.
pub(crate) fn masked_stimulus(response: f32) -> f64 {
    inverse_masking(response as f64)
}

/// Per-band sensitivity table indexed by log-luminance node.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualModelLut {
    /// Band frequency in cycles/degree.
    pub frequency: f32,
    values: Vec<f32>,
}

impl VisualModelLut {
    /// Samples `model.csf(frequency, 10^x)` at every scale node.
    pub fn build(model: &VisualModel, scale: &LogLuminanceScale, frequency: f32) -> Self {
        let values = (0..scale.len())
            .map(|i| model.csf(frequency, 10f32.powf(scale.node(i))))
            .collect();
        Self { frequency, values }
    }

    /// Sensitivity at node `i`.
    #[inline]
    pub fn get(&self, i: usize) -> f32 {
        self.values[i]
    }

    /// All sampled sensitivities.
    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }
}
