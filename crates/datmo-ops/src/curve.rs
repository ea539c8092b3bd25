//! Piecewise-linear tone curve.
//!
//! A [`ToneCurve`] maps scene log10 luminance (`x`) to a display log10
//! luminance factor (`y`) measured from the display black level, so
//! `y = 0` is the darkest and `y = d_dr` the brightest reproducible value.
//! Between nodes the curve is linear; outside them it is held constant.

use crate::{TmoError, TmoResult};
use datmo_core::LogLuminanceScale;

/// Monotonic mapping from scene log-luminance to display log-luminance factor.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneCurve {
    x: Vec<f32>,
    y: Vec<f32>,
}

impl ToneCurve {
    /// Builds a curve from node positions and values.
    ///
    /// `x` must be strictly increasing and both arrays finite, of equal
    /// length and at least two entries long.
    pub fn new(x: Vec<f32>, y: Vec<f32>) -> TmoResult<Self> {
        if x.len() != y.len() || x.len() < 2 {
            return Err(datmo_core::Error::invalid_parameter(
                "tone_curve",
                format!("need >= 2 matching nodes, got {} x and {} y", x.len(), y.len()),
            )
            .into());
        }
        if x.iter().chain(&y).any(|v| !v.is_finite()) {
            return Err(datmo_core::Error::invalid_parameter("tone_curve", "non-finite node").into());
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(datmo_core::Error::invalid_parameter(
                "tone_curve",
                "node positions must be strictly increasing",
            )
            .into());
        }
        Ok(Self { x, y })
    }

    /// Curve on `scale` with every value zero.
    pub fn flat(scale: &LogLuminanceScale) -> Self {
        Self {
            x: scale.nodes(),
            y: vec![0.0; scale.len()],
        }
    }

    /// Uniformly spaced curve on `scale` rising from 0 to `range`.
    ///
    /// ```rust
    /// use datmo_core::LogLuminanceScale;
    /// use datmo_ops::ToneCurve;
    ///
    /// let c = ToneCurve::linear(&LogLuminanceScale::standard(), 2.0);
    /// assert!((c.span() - 2.0).abs() < 1e-5);
    /// assert!(c.is_monotonic());
    /// ```
    pub fn linear(scale: &LogLuminanceScale, range: f32) -> Self {
        let last = (scale.len() - 1).max(1) as f32;
        Self {
            x: scale.nodes(),
            y: (0..scale.len()).map(|i| range * i as f32 / last).collect(),
        }
    }

    pub(crate) fn from_parts(x: Vec<f32>, y: Vec<f32>) -> Self {
        debug_assert_eq!(x.len(), y.len());
        Self { x, y }
    }

    /// Node positions (log10 cd/m²).
    #[inline]
    pub fn x(&self) -> &[f32] {
        &self.x
    }

    /// Node values (log10 factor above display black).
    #[inline]
    pub fn y(&self) -> &[f32] {
        &self.y
    }

    pub(crate) fn y_mut(&mut self) -> &mut [f32] {
        &mut self.y
    }

    /// Number of nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// `true` when the curve has no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Difference between the last and first node value.
    pub fn span(&self) -> f32 {
        match (self.y.first(), self.y.last()) {
            (Some(a), Some(b)) => b - a,
            _ => 0.0,
        }
    }

    /// `true` when `y` never decreases.
    pub fn is_monotonic(&self) -> bool {
        self.y.windows(2).all(|w| w[1] >= w[0])
    }

    /// Segment containing `x` and the fractional position inside it.
    #[inline]
    fn locate(&self, x: f32) -> Option<(usize, f32)> {
        let n = self.x.len();
        if n < 2 || x.is_nan() || x <= self.x[0] || x >= self.x[n - 1] {
            return None;
        }
        let hi = self.x.partition_point(|&v| v <= x).clamp(1, n - 1);
        let lo = hi - 1;
        let t = (x - self.x[lo]) / (self.x[hi] - self.x[lo]);
        Some((lo, t))
    }

    /// Curve value at scene log-luminance `x`, clamped at both ends.
    pub fn lookup(&self, x: f32) -> f32 {
        match self.locate(x) {
            Some((i, t)) => self.y[i] + t * (self.y[i + 1] - self.y[i]),
            None if x.is_nan() || x <= self.x[0] => self.y[0],
            None => self.y[self.y.len() - 1],
        }
    }

    /// Central-difference slope `dy/dx` at every node.
    pub fn node_slopes(&self) -> Vec<f32> {
        let n = self.x.len();
        (0..n)
            .map(|i| {
                let lo = i.saturating_sub(1);
                let hi = (i + 1).min(n - 1);
                if hi == lo {
                    0.0
                } else {
                    (self.y[hi] - self.y[lo]) / (self.x[hi] - self.x[lo])
                }
            })
            .collect()
    }

    /// Local slope at `x`, interpolated from [`node_slopes`](Self::node_slopes).
    ///
    /// Outside the node range the slope of the nearest end node is used.
    pub fn slope(&self, x: f32) -> f32 {
        slope_at(self, &self.node_slopes(), x)
    }
}

/// Interpolates precomputed node slopes of `curve` at `x`.
pub(crate) fn slope_at(curve: &ToneCurve, slopes: &[f32], x: f32) -> f32 {
    match curve.locate(x) {
        Some((i, t)) => slopes[i] + t * (slopes[i + 1] - slopes[i]),
        None if x.is_nan() || x <= curve.x[0] => slopes[0],
        None => slopes[slopes.len() - 1],
    }
}

impl TryFrom<(Vec<f32>, Vec<f32>)> for ToneCurve {
    type Error = TmoError;

    fn try_from((x, y): (Vec<f32>, Vec<f32>)) -> TmoResult<Self> {
        Self::new(x, y)
    }
}
