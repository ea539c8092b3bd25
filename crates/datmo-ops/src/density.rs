//! Conditional density of local contrast given background luminance.
//!
//! For each frequency band of a non-decimated Gaussian pyramid of
//! `log10(L)`, every pixel contributes one observed transition: from its
//! background node (low-pass value) to the node reached by adding its
//! band-pass contrast. The resulting table, indexed by
//! `(band, luminance bin, contrast bin)`, tells the optimizer which
//! luminance differences occur in the image and how often.
//!
//! # Binning
//!
//! - Luminance and contrast bins share the step of [`LogLuminanceScale`].
//! - Contrast bins are symmetric around zero and span ±0.7 log10 units.
//! - A contrast smaller than half a bin but above the detection threshold
//!   (0.0043 log10) is snapped to the first non-zero bin of its sign, so
//!   faint texture does not collapse into the zero-contrast bin.
//! - A luminance bin whose only mass is at zero contrast receives one
//!   synthetic step up and one step down, so every occurring luminance
//!   takes part in at least one transition.

use crate::pyramid::GaussianPyramid;
use crate::{TmoError, TmoResult};
use datmo_core::{LogLuminanceScale, Plane, ProgressSink};
#[allow(unused_imports)]
use tracing::{debug, trace, warn};

/// Largest represented contrast magnitude (log10 units).
pub const CONTRAST_RANGE: f32 = 0.7;
/// Smallest contrast treated as visible (log10 units).
pub const DETECTION_THRESHOLD: f32 = 0.0043;
/// Bands are generated while their frequency stays above this (cycles/degree).
pub const MIN_BAND_FREQUENCY: f32 = 3.0;
/// Floor applied to luminance before taking the logarithm.
pub const LUMINANCE_EPSILON: f32 = 1e-5;
/// Fraction of out-of-range samples above which a warning is logged.
const OUT_OF_RANGE_WARN_FRACTION: f64 = 1e-3;

/// Frequencies (cycles/degree) of the bands analysed for a viewing setup.
///
/// Starts at half the pixels-per-degree and halves per level while the
/// frequency is above [`MIN_BAND_FREQUENCY`]. At least one band is always
/// returned.
///
/// ```rust
/// use datmo_ops::density::band_frequencies;
///
/// assert_eq!(band_frequencies(30.0), vec![15.0, 7.5, 3.75]);
/// assert_eq!(band_frequencies(4.0), vec![2.0]);
/// ```
pub fn band_frequencies(pixels_per_degree: f32) -> Vec<f32> {
    let mut out = Vec::new();
    let mut f = pixels_per_degree / 2.0;
    while f > MIN_BAND_FREQUENCY {
        out.push(f);
        f /= 2.0;
    }
    if out.is_empty() {
        out.push(pixels_per_degree / 2.0);
    }
    out
}

/// Histogram of transitions per band, background node and contrast bin.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalDensity {
    scale: LogLuminanceScale,
    frequencies: Vec<f32>,
    g_count: usize,
    counts: Vec<f32>,
    total: f64,
    out_of_range: usize,
}

impl ConditionalDensity {
    /// Empty table for the given band frequencies.
    pub fn new(scale: LogLuminanceScale, frequencies: Vec<f32>) -> Self {
        let g_half = (CONTRAST_RANGE / scale.step()).round() as usize;
        let g_count = 2 * g_half + 1;
        let counts = vec![0.0; frequencies.len() * scale.len() * g_count];
        Self {
            scale,
            frequencies,
            g_count,
            counts,
            total: 0.0,
            out_of_range: 0,
        }
    }

    /// Luminance axis.
    #[inline]
    pub fn scale(&self) -> &LogLuminanceScale {
        &self.scale
    }

    /// Number of luminance bins.
    #[inline]
    pub fn x_count(&self) -> usize {
        self.scale.len()
    }

    /// Number of contrast bins (odd).
    #[inline]
    pub fn g_count(&self) -> usize {
        self.g_count
    }

    /// Index of the zero-contrast bin.
    #[inline]
    pub fn g_center(&self) -> usize {
        self.g_count / 2
    }

    /// Number of frequency bands.
    #[inline]
    pub fn band_count(&self) -> usize {
        self.frequencies.len()
    }

    /// Band frequencies in cycles/degree, finest first.
    #[inline]
    pub fn frequencies(&self) -> &[f32] {
        &self.frequencies
    }

    /// Sum of all off-centre counts, set by [`finish`](Self::finish).
    #[inline]
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Samples skipped or clamped because they fell outside the scale.
    #[inline]
    pub fn out_of_range(&self) -> usize {
        self.out_of_range
    }

    #[inline]
    fn index(&self, band: usize, x: usize, g: usize) -> usize {
        (band * self.scale.len() + x) * self.g_count + g
    }

    /// Count stored for `(band, x, g)`.
    #[inline]
    pub fn get(&self, band: usize, x: usize, g: usize) -> f32 {
        self.counts[self.index(band, x, g)]
    }

    /// Adds `count` observations of a step of `offset` bins away from node
    /// `x` in `band`.
    ///
    /// Offsets are clamped to the contrast range. Returns `false` (and
    /// records nothing) when the destination node is off the scale.
    pub fn record(&mut self, band: usize, x: usize, offset: isize, count: f32) -> bool {
        let half = self.g_center() as isize;
        let offset = offset.clamp(-half, half);
        let dest = x as isize + offset;
        if x >= self.scale.len() || dest < 0 || dest >= self.scale.len() as isize {
            return false;
        }
        let idx = self.index(band, x, (offset + half) as usize);
        self.counts[idx] += count;
        true
    }

    /// Injects synthetic steps for flat luminance bins and computes
    /// [`total`](Self::total).
    pub fn finish(&mut self) {
        let center = self.g_center();
        let mut injected = 0usize;
        for band in 0..self.band_count() {
            for x in 0..self.x_count() {
                if self.get(band, x, center) <= 0.0 {
                    continue;
                }
                let flat = (0..self.g_count).all(|g| g == center || self.get(band, x, g) == 0.0);
                if flat {
                    self.record(band, x, 1, 1.0);
                    self.record(band, x, -1, 1.0);
                    injected += 1;
                }
            }
        }
        self.total = (0..self.band_count())
            .flat_map(|band| (0..self.x_count()).map(move |x| (band, x)))
            .map(|(band, x)| {
                (0..self.g_count)
                    .filter(|&g| g != center)
                    .map(|g| self.get(band, x, g) as f64)
                    .sum::<f64>()
            })
            .sum();
        debug!(injected, total = self.total, "density finished");
    }

    /// Iterates `(band, x, offset, count)` over every non-empty off-centre
    /// cell.
    pub fn transitions(&self) -> impl Iterator<Item = (usize, usize, isize, f32)> + '_ {
        let center = self.g_center();
        (0..self.band_count()).flat_map(move |band| {
            (0..self.x_count()).flat_map(move |x| {
                (0..self.g_count).filter_map(move |g| {
                    let c = self.get(band, x, g);
                    (g != center && c > 0.0).then_some((band, x, g as isize - center as isize, c))
                })
            })
        })
    }
}

/// Builds the conditional density of `luminance` (cd/m², positive).
///
/// Progress runs from 0 to 50 percent; the sink is polled after each band
/// and a `false` answer aborts with [`TmoError::Aborted`].
pub fn estimate(
    luminance: &Plane,
    pixels_per_degree: f32,
    progress: &mut dyn ProgressSink,
) -> TmoResult<ConditionalDensity> {
    let scale = LogLuminanceScale::standard();
    let frequencies = band_frequencies(pixels_per_degree);
    let (width, height) = (luminance.width() as usize, luminance.height() as usize);
    let mut density = ConditionalDensity::new(scale, frequencies);

    if !progress.report(0) {
        return Err(TmoError::Aborted { percent: 0 });
    }

    let mut out_of_range = 0usize;
    let log_lum: Vec<f32> = luminance
        .data()
        .iter()
        .map(|&l| {
            let x = l.max(LUMINANCE_EPSILON).log10();
            if x.is_nan() || x < scale.min() || x > scale.max() {
                out_of_range += 1;
            }
            if x.is_nan() { scale.min() } else { scale.clamp(x) }
        })
        .collect();

    let step = scale.step();
    let half_bins = density.g_center() as isize;
    let band_count = density.band_count();
    let mut pyramid = GaussianPyramid::new(log_lum, width, height);

    for band_idx in 0..band_count {
        let band = pyramid.next_band();
        for (&bg, &g) in band.lowpass.iter().zip(&band.bandpass) {
            let Some(x) = scale.try_index(bg) else {
                out_of_range += 1;
                continue;
            };
            let mut offset = (g / step).round() as isize;
            if offset == 0 && g.abs() > DETECTION_THRESHOLD {
                offset = if g > 0.0 { 1 } else { -1 };
            }
            let offset = offset.clamp(-half_bins, half_bins);
            if !density.record(band_idx, x, offset, 1.0) {
                out_of_range += 1;
            }
        }
        trace!(band = band_idx, frequency = density.frequencies()[band_idx], "band binned");

        let percent = (50 * (band_idx + 1) / band_count) as u8;
        if !progress.report(percent) {
            return Err(TmoError::Aborted { percent });
        }
    }

    density.out_of_range = out_of_range;
    let samples = (width * height * (band_count + 1)) as f64;
    if out_of_range as f64 > samples * OUT_OF_RANGE_WARN_FRACTION {
        warn!(
            out_of_range,
            "luminance outside the supported 16-decade range; values were clamped or skipped"
        );
    } else if out_of_range > 0 {
        debug!(out_of_range, "few samples outside the luminance range");
    }

    density.finish();
    Ok(density)
}
