//! Common test utilities for datmo-ops integration tests.

#![allow(dead_code)]

pub mod generators;

use datmo_display::{DisplayConfig, DisplayModel};

/// Parametric display with zero ambient light and exactly `range` decades.
pub fn display_with_range(peak: f32, range: f32) -> DisplayModel {
    DisplayModel::from_config(&DisplayConfig::Custom {
        gamma: 2.2,
        peak_luminance: peak,
        black_level: peak / 10f32.powf(range),
        ambient: 0.0,
        reflectivity: 0.0,
    })
    .expect("valid display")
}

/// Asserts that `y` never decreases, reporting the first violation.
#[track_caller]
pub fn assert_monotonic(y: &[f32]) {
    if let Some(i) = y.windows(2).position(|w| w[1] < w[0]) {
        panic!("curve decreases at node {i}: {} -> {}", y[i], y[i + 1]);
    }
}
