//! Applying a tone curve to an RGB frame.
//!
//! Luminance goes through the curve; colour is carried by the ratios of
//! each channel to luminance. Compressing contrast flattens colours, so
//! the ratios are raised to a saturation exponent that depends on the
//! local slope `s` of the curve:
//!
//! ```text
//! sat   = clamp((1 + k1) s^k2 / (1 + k1 s^k2), 0, 1) * saturation
//! C_out = (C / L)^sat * L_out
//! ```
//!
//! with `k1 = 1.6774`, `k2 = 0.9925`. The result is converted to code
//! values with the display's inverse response.

use crate::curve::{slope_at, ToneCurve};
use crate::density::LUMINANCE_EPSILON;
use crate::rows::for_each_row;
use crate::TmoResult;
use datmo_core::{Error, Plane, RgbFrame};
use datmo_display::DisplayFunction;
#[allow(unused_imports)]
use tracing::{debug, trace};

/// Saturation model gain.
pub const SATURATION_K1: f32 = 1.6774;
/// Saturation model exponent.
pub const SATURATION_K2: f32 = 0.9925;

/// Colour exponent for a curve slope, scaled by the user saturation.
///
/// ```rust
/// use datmo_ops::apply::saturation_factor;
///
/// assert!((saturation_factor(1.0, 1.0) - 1.0).abs() < 1e-6);
/// assert!(saturation_factor(0.3, 1.0) < 1.0);
/// assert_eq!(saturation_factor(0.0, 1.0), 0.0);
/// ```
pub fn saturation_factor(slope: f32, saturation: f32) -> f32 {
    let sk = slope.max(0.0).powf(SATURATION_K2);
    let base = ((1.0 + SATURATION_K1) * sk / (1.0 + SATURATION_K1 * sk)).clamp(0.0, 1.0);
    base * saturation
}

/// Display-referred frame: interleaved RGB code values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayFrame {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl DisplayFrame {
    /// Frame width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Interleaved code values, row-major.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Code values of pixel `(x, y)`.
    pub fn get(&self, x: u32, y: u32) -> [f32; 3] {
        let i = 3 * (y as usize * self.width as usize + x as usize);
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Quantises to 8 bits per channel.
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.data
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect()
    }

    /// Quantises to 16 bits per channel.
    pub fn to_rgb16(&self) -> Vec<u16> {
        self.data
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 65535.0).round() as u16)
            .collect()
    }

    /// Splits into planar form.
    pub fn into_frame(self) -> TmoResult<RgbFrame> {
        Ok(RgbFrame::from_interleaved(self.width, self.height, &self.data)?)
    }
}

/// Applies `curve` to one frame.
///
/// `luminance` must match the frame size; pass `rgb.luminance()` when no
/// separate luminance channel exists.
pub fn apply_tone_curve<D>(
    curve: &ToneCurve,
    luminance: &Plane,
    rgb: &RgbFrame,
    display: &D,
    saturation: f32,
) -> TmoResult<DisplayFrame>
where
    D: DisplayFunction + Sync + ?Sized,
{
    let (w, h) = luminance.dims();
    if (rgb.width(), rgb.height()) != (w, h) {
        return Err(Error::dimension_mismatch((w, h), (rgb.width(), rgb.height())).into());
    }
    trace!(width = w, height = h, saturation, "apply tone curve");

    let black = display.min_luminance();
    let slopes = curve.node_slopes();
    let width = w as usize;
    let lum = luminance.data();
    let (r, g, b) = (rgb.r.data(), rgb.g.data(), rgb.b.data());

    let mut data = vec![0.0f32; 3 * width * h as usize];
    for_each_row(&mut data, 3 * width, |y, row| {
        let base = y * width;
        for (x, px) in row.chunks_exact_mut(3).enumerate() {
            let i = base + x;
            let l_in = lum[i].max(LUMINANCE_EPSILON);
            let log_l = l_in.log10();
            let l_out = black * 10f32.powf(curve.lookup(log_l));
            let sat = saturation_factor(slope_at(curve, &slopes, log_l), saturation);
            for (out, c) in px.iter_mut().zip([r[i], g[i], b[i]]) {
                let ratio = c.max(0.0) / l_in;
                *out = display.inverse_display(ratio.powf(sat) * l_out);
            }
        }
    });

    Ok(DisplayFrame {
        width: w,
        height: h,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use datmo_core::LogLuminanceScale;
    use datmo_display::{DisplayConfig, DisplayModel};

    fn grey_frame(values: &[f32]) -> (Plane, RgbFrame) {
        let w = values.len() as u32;
        let p = Plane::new(w, 1, values.to_vec()).unwrap();
        let frame = RgbFrame::new(p.clone(), p.clone(), p.clone()).unwrap();
        (p, frame)
    }

    #[test]
    fn test_saturation_factor_bounds() {
        assert_relative_eq!(saturation_factor(1.0, 1.0), 1.0, epsilon = 1e-6);
        assert_relative_eq!(saturation_factor(100.0, 1.0), 1.0);
        assert_relative_eq!(saturation_factor(1.0, 0.5), 0.5, epsilon = 1e-6);
        let lo = saturation_factor(0.2, 1.0);
        let hi = saturation_factor(0.6, 1.0);
        assert!(lo > 0.0 && lo < hi && hi < 1.0);
    }

    #[test]
    fn test_grey_maps_through_curve() {
        let display = DisplayModel::from_config(&DisplayConfig::Lcd).unwrap();
        let scale = LogLuminanceScale::standard();
        let curve = ToneCurve::linear(&scale, display.dynamic_range());
        let (lum, frame) = grey_frame(&[1e-8, 1.0, 1e8]);
        let out = apply_tone_curve(&curve, &lum, &frame, &display, 1.0).unwrap();

        // Bottom of the curve is display black, top is display peak.
        assert_relative_eq!(out.get(0, 0)[0], 0.0, epsilon = 1e-4);
        assert_relative_eq!(out.get(2, 0)[1], 1.0, epsilon = 1e-3);
        // Mid-scale: y = d_dr / 2, so L_out = sqrt(min * max)
        let mid = (display.min_luminance() * display.max_luminance()).sqrt();
        assert_relative_eq!(out.get(1, 0)[2], display.inverse_display(mid), epsilon = 1e-4);
    }

    #[test]
    fn test_zero_saturation_gives_grey() {
        let display = DisplayModel::from_config(&DisplayConfig::Crt).unwrap();
        let curve = ToneCurve::linear(&LogLuminanceScale::standard(), display.dynamic_range());
        let r = Plane::new(1, 1, vec![50.0]).unwrap();
        let g = Plane::new(1, 1, vec![10.0]).unwrap();
        let b = Plane::new(1, 1, vec![2.0]).unwrap();
        let frame = RgbFrame::new(r, g, b).unwrap();
        let out = apply_tone_curve(&curve, &frame.luminance(), &frame, &display, 0.0).unwrap();
        let [r, g, b] = out.get(0, 0);
        assert_relative_eq!(r, g, epsilon = 1e-6);
        assert_relative_eq!(g, b, epsilon = 1e-6);
    }

    #[test]
    fn test_dimension_mismatch() {
        let display = DisplayModel::from_config(&DisplayConfig::Lcd).unwrap();
        let curve = ToneCurve::flat(&LogLuminanceScale::standard());
        let (_, frame) = grey_frame(&[1.0, 2.0]);
        let lum = Plane::filled(3, 1, 1.0).unwrap();
        assert!(apply_tone_curve(&curve, &lum, &frame, &display, 1.0).is_err());
    }

    #[test]
    fn test_quantisation() {
        let f = DisplayFrame {
            width: 1,
            height: 1,
            data: vec![0.0, 0.5, 1.2],
        };
        assert_eq!(f.to_rgb8(), vec![0, 128, 255]);
        assert_eq!(f.to_rgb16()[2], 65535);
        let planes = f.into_frame().unwrap();
        assert_eq!(planes.g.data(), &[0.5]);
    }
}
