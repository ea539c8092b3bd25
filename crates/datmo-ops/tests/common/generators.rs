//! Deterministic luminance fields for tone-mapping tests.
//!
//! Random content comes from an LCG so every platform sees the same input.

use datmo_core::{Plane, RgbFrame};

// ============================================================================
// LCG PRNG
// ============================================================================

/// LCG pseudo-random number generator (deterministic)
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    /// Uniform in [0, 1)
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.next_f32()
    }
}

// ============================================================================
// Luminance Fields
// ============================================================================

/// Constant luminance
pub fn gen_flat(width: u32, height: u32, lum: f32) -> Plane {
    Plane::filled(width, height, lum).unwrap()
}

/// Horizontal ramp, linear in luminance from `lo` to `hi`
pub fn gen_ramp(width: u32, height: u32, lo: f32, hi: f32) -> Plane {
    Plane::from_fn(width, height, |x, _| {
        lo + (hi - lo) * x as f32 / (width - 1).max(1) as f32
    })
    .unwrap()
}

/// Independent pixels, log-uniform between 10^lo and 10^hi
pub fn gen_noise(width: u32, height: u32, lo: f32, hi: f32, rng: &mut Lcg) -> Plane {
    let data = (0..width * height)
        .map(|_| 10f32.powf(rng.range(lo, hi)))
        .collect();
    Plane::new(width, height, data).unwrap()
}

/// Blocky scene: random log-luminance per `block`-sized tile plus fine noise
pub fn gen_blocks(width: u32, height: u32, block: u32, rng: &mut Lcg) -> Plane {
    let bw = width.div_ceil(block);
    let bh = height.div_ceil(block);
    let tiles: Vec<f32> = (0..bw * bh).map(|_| rng.range(-1.0, 4.0)).collect();
    let data = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| {
            let base = tiles[((y / block) * bw + x / block) as usize];
            10f32.powf(base + rng.range(-0.05, 0.05))
        })
        .collect();
    Plane::new(width, height, data).unwrap()
}

/// Grey frame from a luminance field
pub fn grey(lum: &Plane) -> RgbFrame {
    RgbFrame::new(lum.clone(), lum.clone(), lum.clone()).unwrap()
}

/// Coloured frame with fixed chromaticity ratios
pub fn tinted(lum: &Plane, ratios: [f32; 3]) -> RgbFrame {
    let scale = |k: f32| {
        Plane::new(lum.width(), lum.height(), lum.data().iter().map(|v| v * k).collect()).unwrap()
    };
    RgbFrame::new(scale(ratios[0]), scale(ratios[1]), scale(ratios[2])).unwrap()
}
