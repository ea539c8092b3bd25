//! Non-decimated Gaussian pyramid and its band-pass levels.
//!
//! Every level keeps the full input resolution. Instead of subsampling,
//! the 5-tap kernel is dilated: level `l` places its taps `2^l` samples
//! apart ("a trous" filtering). Differences of successive low-pass levels
//! give band-pass images free of resampling artifacts.
//!
//! # Kernel
//!
//! ```text
//! [1/4 - a/2, 1/4, a, 1/4, 1/4 - a/2],  a = 0.4
//! ```
//!
//! Boundaries are handled by mirror reflection (the edge sample is not
//! repeated).
//!
//! # Example
//!
//! ```rust
//! use datmo_ops::pyramid::GaussianPyramid;
//!
//! let src = vec![1.0f32; 16 * 16];
//! let mut pyr = GaussianPyramid::new(src, 16, 16);
//! let band = pyr.next_band();
//! assert_eq!(band.level, 0);
//! assert!(band.bandpass.iter().all(|v| v.abs() < 1e-6));
//! ```

use crate::rows::for_each_row;
#[allow(unused_imports)]
use tracing::{debug, trace};

/// Shape parameter of the generating kernel.
pub const KERNEL_SHAPE: f32 = 0.4;

/// Separable, symmetric 5-tap low-pass kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kernel5 {
    /// Tap weights, centre at index 2.
    pub weights: [f32; 5],
}

impl Kernel5 {
    /// Burt-Adelson generating kernel with shape parameter `a`.
    ///
    /// ```rust
    /// use datmo_ops::pyramid::Kernel5;
    ///
    /// let k = Kernel5::new(0.4);
    /// assert!((k.weights.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    /// ```
    pub fn new(a: f32) -> Self {
        let edge = 0.25 - a / 2.0;
        Self {
            weights: [edge, 0.25, a, 0.25, edge],
        }
    }
}

impl Default for Kernel5 {
    fn default() -> Self {
        Self::new(KERNEL_SHAPE)
    }
}

/// Mirror-reflects index `i` into `0..n`.
#[inline]
fn reflect(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let m = i.rem_euclid(period);
    if m >= n as isize {
        (period - m) as usize
    } else {
        m as usize
    }
}

/// One low-pass step with taps `spacing` samples apart.
pub fn lowpass(src: &[f32], width: usize, height: usize, spacing: usize, kernel: &Kernel5) -> Vec<f32> {
    trace!(width, height, spacing, "lowpass");
    let w = kernel.weights;
    let s = spacing as isize;

    let mut tmp = vec![0.0f32; width * height];
    for_each_row(&mut tmp, width, |y, row| {
        let line = &src[y * width..(y + 1) * width];
        for (x, out) in row.iter_mut().enumerate() {
            let xi = x as isize;
            let mut acc = 0.0f32;
            for (k, wk) in w.iter().enumerate() {
                acc += wk * line[reflect(xi + (k as isize - 2) * s, width)];
            }
            *out = acc;
        }
    });

    let mut dst = vec![0.0f32; width * height];
    for_each_row(&mut dst, width, |y, row| {
        let yi = y as isize;
        let rows: [usize; 5] = std::array::from_fn(|k| reflect(yi + (k as isize - 2) * s, height));
        for (x, out) in row.iter_mut().enumerate() {
            let mut acc = 0.0f32;
            for (k, wk) in w.iter().enumerate() {
                acc += wk * tmp[rows[k] * width + x];
            }
            *out = acc;
        }
    });
    dst
}

/// Band-pass level together with its background (low-pass) image.
#[derive(Debug, Clone)]
pub struct Band {
    /// Pyramid level, 0 = finest.
    pub level: u32,
    /// Low-pass image below this band (local background).
    pub lowpass: Vec<f32>,
    /// Previous low-pass minus `lowpass` (local contrast at this scale).
    pub bandpass: Vec<f32>,
}

/// Lazily evaluated non-decimated pyramid.
///
/// Each call to [`next_band`](Self::next_band) filters the current
/// low-pass image once more, so a caller that stops early never pays for
/// the coarser levels.
pub struct GaussianPyramid {
    current: Vec<f32>,
    width: usize,
    height: usize,
    level: u32,
    kernel: Kernel5,
}

impl GaussianPyramid {
    /// Starts a pyramid over `src` (row-major `width * height`).
    pub fn new(src: Vec<f32>, width: usize, height: usize) -> Self {
        debug_assert_eq!(src.len(), width * height);
        Self {
            current: src,
            width,
            height,
            level: 0,
            kernel: Kernel5::default(),
        }
    }

    /// Level the next band will have.
    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Computes the next (coarser) band.
    pub fn next_band(&mut self) -> Band {
        let spacing = 1usize << self.level;
        let low = lowpass(&self.current, self.width, self.height, spacing, &self.kernel);
        let bandpass: Vec<f32> = self
            .current
            .iter()
            .zip(&low)
            .map(|(hi, lo)| hi - lo)
            .collect();
        let band = Band {
            level: self.level,
            lowpass: low.clone(),
            bandpass,
        };
        debug!(level = self.level, spacing, "pyramid band");
        self.current = low;
        self.level += 1;
        band
    }
}
