//! Temporal smoothing of tone curves across video frames.
//!
//! Every curve node is passed through the same third-order Butterworth
//! low-pass (cut-off 0.5 Hz) designed for the stream's frame rate:
//!
//! ```text
//! y[n] = Σ_{k=0..3} b_k x[n-k] - Σ_{k=1..3} a_k y[n-k]
//! ```
//!
//! The numerator is rescaled so that `Σ b = Σ a`, making the DC gain
//! exactly one: a static scene converges to its unfiltered curve. Before
//! four frames have been seen the missing history repeats the first
//! frame, so a constant stream is passed through unchanged from the start.
//!
//! Output values are clamped to the display range and made non-decreasing
//! after filtering; the IIR history keeps the unclamped values.

use crate::curve::ToneCurve;
use crate::{TmoError, TmoResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
#[allow(unused_imports)]
use tracing::{debug, trace};

/// Number of filter taps (order + 1).
pub const TAPS: usize = 4;

/// Supported stream frame rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum FrameRate {
    /// 25 frames per second.
    #[default]
    Fps25,
    /// 30 frames per second.
    Fps30,
    /// 60 frames per second.
    Fps60,
}

impl FrameRate {
    /// Frames per second.
    pub fn fps(self) -> u32 {
        match self {
            Self::Fps25 => 25,
            Self::Fps30 => 30,
            Self::Fps60 => 60,
        }
    }

    /// Butterworth `(b, a)` coefficients, `a[0] = 1`.
    fn coefficients(self) -> ([f64; TAPS], [f64; TAPS]) {
        match self {
            Self::Fps25 => (
                [0.000219606211225, 0.000658818633676, 0.000658818633676, 0.000219606211225],
                [1.0, -2.74883580921, 2.52823121914, -0.777638560238],
            ),
            Self::Fps30 => (
                [0.000129624539595, 0.000388873618786, 0.000388873618786, 0.000129624539595],
                [1.0, -2.79065530528, 2.60265317351, -0.810960871907],
            ),
            Self::Fps60 => (
                [1.70396779801e-05, 5.11190339402e-05, 5.11190339402e-05, 1.70396779801e-05],
                [1.0, -2.89529217788, 2.79599458428, -0.900566088982],
            ),
        }
    }
}

impl TryFrom<u32> for FrameRate {
    type Error = TmoError;

    fn try_from(fps: u32) -> TmoResult<Self> {
        match fps {
            25 => Ok(Self::Fps25),
            30 => Ok(Self::Fps30),
            60 => Ok(Self::Fps60),
            other => Err(datmo_core::Error::invalid_parameter(
                "frame_rate",
                format!("unsupported frame rate {other}, expected 25, 30 or 60"),
            )
            .into()),
        }
    }
}

impl From<FrameRate> for u32 {
    fn from(rate: FrameRate) -> u32 {
        rate.fps()
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fps", self.fps())
    }
}

/// Per-session IIR filter over tone-curve node values.
#[derive(Debug, Clone)]
pub struct TemporalFilter {
    b: [f64; TAPS],
    a: [f64; TAPS],
    range: f32,
    /// Raw curves, newest first.
    inputs: VecDeque<Vec<f64>>,
    /// Unclamped filtered curves, newest first.
    outputs: VecDeque<Vec<f64>>,
    frames: usize,
}

impl TemporalFilter {
    /// Filter for `rate`, clamping output to `[0, range]`.
    pub fn new(rate: FrameRate, range: f32) -> Self {
        let (mut b, a) = rate.coefficients();
        let gain = a.iter().sum::<f64>() / b.iter().sum::<f64>();
        for v in &mut b {
            *v *= gain;
        }
        Self {
            b,
            a,
            range,
            inputs: VecDeque::with_capacity(TAPS),
            outputs: VecDeque::with_capacity(TAPS),
            frames: 0,
        }
    }

    /// Frames filtered since creation or the last reset.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Forgets all history.
    pub fn reset(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
        self.frames = 0;
    }

    /// Filters one frame's curve and returns the smoothed curve.
    pub fn filter(&mut self, curve: &ToneCurve) -> ToneCurve {
        let x: Vec<f64> = curve.y().iter().map(|&v| v as f64).collect();
        if self.inputs.front().is_some_and(|prev| prev.len() != x.len()) {
            debug!(nodes = x.len(), "curve size changed; restarting temporal filter");
            self.reset();
        }
        if self.inputs.is_empty() {
            // Pad the history with the first frame
            for _ in 0..TAPS - 1 {
                self.inputs.push_front(x.clone());
                self.outputs.push_front(x.clone());
            }
        }

        self.inputs.push_front(x);
        self.inputs.truncate(TAPS);

        let n = curve.len();
        let mut y = vec![0.0f64; n];
        for (k, input) in self.inputs.iter().enumerate() {
            let bk = self.b[k];
            for (acc, v) in y.iter_mut().zip(input) {
                *acc += bk * v;
            }
        }
        for (k, output) in self.outputs.iter().take(TAPS - 1).enumerate() {
            let ak = self.a[k + 1];
            for (acc, v) in y.iter_mut().zip(output) {
                *acc -= ak * v;
            }
        }

        let mut clamped = Vec::with_capacity(n);
        let mut floor = 0.0f32;
        for &v in &y {
            let c = (v as f32).clamp(floor, self.range.max(floor));
            clamped.push(c);
            floor = c;
        }

        self.outputs.push_front(y);
        self.outputs.truncate(TAPS - 1);
        self.frames += 1;
        trace!(frame = self.frames, "temporal filter");

        let mut out = curve.clone();
        out.y_mut().copy_from_slice(&clamped);
        out
    }
}
